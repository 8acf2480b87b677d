use std::io::Write;

use skillflow_core::config::AppConfig;
use skillflow_core::error::SkillflowError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[engine]
max_steps = 500
strict_outputs = true
eager_resolution = true

[plugins]
dirs = ["/opt/skillflow/plugins", "./plugins"]
builtins = false

[recovery]
max_attempts = 3
retry_on = ["skill_execution", "contract_violation"]
backoff_ms = 250
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.engine.max_steps, Some(500));
    assert!(config.engine.strict_outputs);
    assert!(config.engine.eager_resolution);
    assert_eq!(
        config.plugins.dirs,
        vec!["/opt/skillflow/plugins".to_string(), "./plugins".to_string()]
    );
    assert!(!config.plugins.builtins);
    assert_eq!(config.recovery.max_attempts, 3);
    assert_eq!(config.recovery.retry_on.len(), 2);
    assert_eq!(config.recovery.backoff_ms, 250);
}

#[test]
fn test_empty_config_uses_defaults() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"").expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.engine.max_steps, None);
    assert!(!config.engine.strict_outputs);
    assert!(!config.engine.eager_resolution);
    assert_eq!(config.plugins.dirs, vec!["~/.skillflow/plugins".to_string()]);
    assert!(config.plugins.builtins);
    assert_eq!(config.recovery.max_attempts, 1);
    assert_eq!(config.recovery.retry_on, vec!["skill_execution".to_string()]);
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("SKILLFLOW_TEST_PLUGIN_DIR", "/srv/plugins");

    let toml_content = r#"
[plugins]
dirs = ["${SKILLFLOW_TEST_PLUGIN_DIR}"]
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.plugins.dirs, vec!["/srv/plugins".to_string()]);

    std::env::remove_var("SKILLFLOW_TEST_PLUGIN_DIR");
}

#[test]
fn test_missing_config_file() {
    let result = AppConfig::load(std::path::Path::new("/nonexistent/skillflow.toml"));
    assert!(matches!(result, Err(SkillflowError::ConfigNotFound(_))));
}

#[test]
fn test_invalid_config_is_config_error() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[engine]\nmax_steps = \"many\"\n").expect("write toml");

    let result = AppConfig::load(tmp.path());
    assert!(matches!(result, Err(SkillflowError::Config(_))));
}
