pub mod builtin;
pub mod command;
pub mod manifest;
pub mod registry;

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use skillflow_core::error::SkillflowError;

use command::CommandSkill;
use manifest::{PluginManifest, Prerequisites};

pub use registry::{SkillFactory, SkillRegistry};

/// File name of a plugin manifest inside its plugin directory.
pub const MANIFEST_FILE: &str = "plugin.toml";

/// A plugin found by a discovery pass.
#[derive(Debug, Clone)]
pub struct DiscoveredPlugin {
    pub manifest: PluginManifest,
    pub dir: PathBuf,
}

/// Load plugins from a directory and register them into the skill registry.
///
/// Scans `dir` for subdirectories containing `plugin.toml`, parses each
/// manifest, and registers a `CommandSkill` factory under the manifest name.
/// Returns the number of plugins registered.
pub fn load_and_register_plugins(dir: &Path, registry: &mut SkillRegistry) -> usize {
    let plugins = load_plugins(dir);
    let count = plugins.len();
    for plugin in plugins {
        info!(name = %plugin.manifest.name, path = %plugin.dir.display(), "Registered plugin");
        register_plugin(plugin, registry);
    }
    count
}

/// Register a single discovered plugin.
///
/// A manifest without a usable command still claims its name: resolving it
/// fails with `PluginContract` instead of `PluginNotFound`.
pub fn register_plugin(plugin: DiscoveredPlugin, registry: &mut SkillRegistry) {
    let DiscoveredPlugin { manifest, dir } = plugin;
    let name = manifest.name.clone();

    if manifest.entry().is_none() {
        warn!(plugin = %name, "Plugin declares no command");
        registry.register(name.clone(), move |_node| {
            Err(SkillflowError::PluginContract {
                plugin: name.clone(),
                message: "manifest declares no command".to_string(),
            })
        });
        return;
    }

    registry.register_skill(name, move |node| CommandSkill::new(&manifest, dir.clone(), node));
}

/// Discover plugins in a directory.
pub fn load_plugins(dir: &Path) -> Vec<DiscoveredPlugin> {
    let mut plugins = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            debug!(path = %dir.display(), error = %e, "Cannot read plugin directory");
            return plugins;
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    for plugin_dir in dirs {
        let manifest_path = plugin_dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            debug!(path = %plugin_dir.display(), "No plugin.toml, skipping");
            continue;
        }

        let content = match std::fs::read_to_string(&manifest_path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %manifest_path.display(), error = %e, "Failed to read plugin manifest");
                continue;
            }
        };

        let manifest: PluginManifest = match toml::from_str(&content) {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %manifest_path.display(), error = %e, "Failed to parse plugin manifest");
                continue;
            }
        };

        if let Err(reason) = check_prerequisites(&manifest.prerequisites) {
            warn!(
                plugin = %manifest.name,
                reason = %reason,
                "Skipping plugin: prerequisites not met"
            );
            continue;
        }

        plugins.push(DiscoveredPlugin {
            manifest,
            dir: plugin_dir,
        });
    }

    plugins
}

/// Check that a plugin's prerequisites are met.
/// Returns Ok(()) if all checks pass, or Err with a description of what failed.
fn check_prerequisites(prereqs: &Prerequisites) -> std::result::Result<(), String> {
    for bin in &prereqs.required_binaries {
        if which(bin).is_none() {
            return Err(format!("required binary '{}' not found on PATH", bin));
        }
    }

    for var in &prereqs.required_env {
        if std::env::var(var).is_err() {
            return Err(format!("required env var '{}' is not set", var));
        }
    }

    if let Some(ref required_os) = prereqs.required_os {
        let current_os = std::env::consts::OS;
        let matches = match required_os.as_str() {
            "linux" => current_os == "linux",
            "macos" | "darwin" => current_os == "macos",
            "windows" => current_os == "windows",
            other => {
                return Err(format!("unknown required_os value: '{}'", other));
            }
        };
        if !matches {
            return Err(format!(
                "requires OS '{}', but running on '{}'",
                required_os, current_os
            ));
        }
    }

    Ok(())
}

/// Search PATH for a binary.
fn which(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use skillflow_core::node::NodeDef;
    use skillflow_core::traits::SkillResolver;

    fn write_plugin(root: &Path, name: &str, manifest: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
    }

    #[test]
    fn load_from_temp_dir() {
        let tmp = tempfile::tempdir().unwrap();
        write_plugin(
            tmp.path(),
            "echo",
            r#"
name = "echo"
description = "Echo"
command = "cat"
"#,
        );

        let mut registry = SkillRegistry::new();
        let count = load_and_register_plugins(tmp.path(), &mut registry);
        assert_eq!(count, 1);
        assert!(registry.contains("echo"));
    }

    #[test]
    fn skip_invalid_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        write_plugin(tmp.path(), "bad", "not valid toml {{{");

        assert!(load_plugins(tmp.path()).is_empty());
    }

    #[test]
    fn skip_dir_without_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("empty")).unwrap();

        assert!(load_plugins(tmp.path()).is_empty());
    }

    #[test]
    fn skip_missing_dir() {
        assert!(load_plugins(Path::new("/nonexistent/path/to/plugins")).is_empty());
    }

    #[test]
    fn skip_plugin_with_missing_binary() {
        let tmp = tempfile::tempdir().unwrap();
        write_plugin(
            tmp.path(),
            "needs_nonexistent",
            r#"
name = "needs_nonexistent"
command = "echo"

[prerequisites]
required_binaries = ["_skillflow_nonexistent_binary_xyz"]
"#,
        );

        assert!(
            load_plugins(tmp.path()).is_empty(),
            "Plugin with missing binary should be skipped"
        );
    }

    #[test]
    fn plugin_without_command_breaks_contract() {
        let tmp = tempfile::tempdir().unwrap();
        write_plugin(tmp.path(), "hollow", r#"name = "hollow""#);

        let mut registry = SkillRegistry::new();
        assert_eq!(load_and_register_plugins(tmp.path(), &mut registry), 1);

        let node = NodeDef::new(1, "hollow").with_outputs(vec![None]);
        assert!(matches!(
            registry.resolve("hollow", &node),
            Err(SkillflowError::PluginContract { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn discovered_plugin_resolves_to_command_skill() {
        let tmp = tempfile::tempdir().unwrap();
        write_plugin(
            tmp.path(),
            "finish",
            r#"
name = "finish"
command = "cat > /dev/null; echo '{\"next\": null}'"
"#,
        );

        let mut registry = SkillRegistry::new();
        load_and_register_plugins(tmp.path(), &mut registry);

        let node = NodeDef::new(1, "finish").with_outputs(vec![None]);
        let mut skill = registry.resolve("finish", &node).unwrap();
        let next = skill
            .execute(&mut skillflow_core::context::ExecutionContext::new())
            .unwrap();
        assert!(next.is_null());
    }
}
