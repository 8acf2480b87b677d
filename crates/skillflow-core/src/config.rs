use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillflowError};

/// Top-level Skillflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
}

/// Execution loop settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on steps per run. Unbounded when absent.
    #[serde(default)]
    pub max_steps: Option<usize>,
    /// Check every declared output against the node table at construction.
    #[serde(default)]
    pub strict_outputs: bool,
    /// Resolve all skills when the executor is built instead of on first run.
    #[serde(default)]
    pub eager_resolution: bool,
}

/// Plugin discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Directories scanned for `<name>/plugin.toml`.
    #[serde(default = "default_plugin_dirs")]
    pub dirs: Vec<String>,
    /// Register the built-in skills.
    #[serde(default = "default_builtins")]
    pub builtins: bool,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            dirs: default_plugin_dirs(),
            builtins: default_builtins(),
        }
    }
}

/// Retry policy applied by the caller around whole runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Total attempts per run, including the first (1 = no retry).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Error codes that may be retried.
    #[serde(default = "default_retry_on")]
    pub retry_on: Vec<String>,
    /// Base delay between attempts, doubled each time.
    #[serde(default)]
    pub backoff_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_on: default_retry_on(),
            backoff_ms: 0,
        }
    }
}

fn default_plugin_dirs() -> Vec<String> { vec!["~/.skillflow/plugins".to_string()] }
fn default_builtins() -> bool { true }
fn default_max_attempts() -> u32 { 1 }
fn default_retry_on() -> Vec<String> { vec!["skill_execution".to_string()] }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| SkillflowError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| SkillflowError::Config(e.to_string()))
    }

    /// Plugin directories with `~` expanded.
    pub fn plugin_dirs(&self) -> Vec<PathBuf> {
        self.plugins.dirs.iter().map(|d| expand_home(d)).collect()
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Unset variables stay as written
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}

pub fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
