use serde::Deserialize;

/// Environment prerequisites for a plugin.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Prerequisites {
    /// Required binaries that must be on PATH (e.g., ["python3", "jq"]).
    #[serde(default)]
    pub required_binaries: Vec<String>,
    /// Required environment variables (e.g., ["OPENAI_API_KEY"]).
    #[serde(default)]
    pub required_env: Vec<String>,
    /// Required OS: "linux", "macos", or "windows".
    #[serde(default)]
    pub required_os: Option<String>,
}

/// TOML manifest for a drop-in skill plugin.
///
/// Lives at `<plugin dir>/<name>/plugin.toml`. The `name` is the node type
/// workflows use to select the plugin.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginManifest {
    /// Node type name (e.g., "llm_api_note").
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Shell command implementing the skill. `$SKILL_DIR` is substituted
    /// with the plugin's directory path at runtime.
    #[serde(default)]
    pub command: Option<String>,

    /// Seconds before a running command is killed. No deadline when absent.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Environment prerequisites (optional).
    #[serde(default)]
    pub prerequisites: Prerequisites,
}

impl PluginManifest {
    /// The command entry point, if one is declared and non-blank.
    pub fn entry(&self) -> Option<&str> {
        self.command.as_deref().filter(|c| !c.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_manifest() {
        let toml_str = r#"
name = "llm_api_note"
description = "Call a chat completion endpoint"
command = "python3 $SKILL_DIR/main.py"
timeout_secs = 15

[prerequisites]
required_binaries = ["python3"]
required_env = ["OPENAI_API_KEY"]
"#;
        let manifest: PluginManifest = toml::from_str(toml_str).unwrap();
        assert_eq!(manifest.name, "llm_api_note");
        assert_eq!(manifest.entry(), Some("python3 $SKILL_DIR/main.py"));
        assert_eq!(manifest.timeout_secs, Some(15));
        assert_eq!(manifest.prerequisites.required_binaries, vec!["python3"]);
        assert_eq!(manifest.prerequisites.required_env, vec!["OPENAI_API_KEY"]);
        assert!(manifest.prerequisites.required_os.is_none());
    }

    #[test]
    fn parse_manifest_without_command() {
        let manifest: PluginManifest = toml::from_str(r#"name = "broken""#).unwrap();
        assert!(manifest.entry().is_none());
        assert!(manifest.description.is_empty());
        assert!(manifest.timeout_secs.is_none());
    }

    #[test]
    fn blank_command_is_no_entry() {
        let manifest: PluginManifest = toml::from_str(
            r#"
name = "blank"
command = "   "
"#,
        )
        .unwrap();
        assert!(manifest.entry().is_none());
    }
}
