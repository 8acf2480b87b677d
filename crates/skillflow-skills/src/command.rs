use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tracing::{debug, warn};

use skillflow_core::context::ExecutionContext;
use skillflow_core::error::{Result, SkillflowError};
use skillflow_core::node::NodeDef;
use skillflow_core::traits::{Skill, SkillBase};

use crate::manifest::PluginManifest;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A skill backed by a shell command from a plugin manifest.
///
/// The command receives `{"node": .., "context": ..}` on stdin and must print
/// `{"next": <id or null>, "updates": {..}}` on stdout. `updates` is merged
/// into the context; `next` is handed back to the executor as-is.
pub struct CommandSkill {
    base: SkillBase,
    command: String,
    plugin_dir: PathBuf,
    timeout: Option<Duration>,
}

impl CommandSkill {
    pub fn new(manifest: &PluginManifest, plugin_dir: PathBuf, node: &NodeDef) -> Result<Self> {
        let entry = manifest
            .entry()
            .ok_or_else(|| SkillflowError::PluginContract {
                plugin: manifest.name.clone(),
                message: "manifest declares no command".to_string(),
            })?;

        let command = entry.replace("$SKILL_DIR", &plugin_dir.display().to_string());
        Ok(Self {
            base: SkillBase::new(node)?,
            command,
            plugin_dir,
            timeout: manifest.timeout_secs.map(Duration::from_secs),
        })
    }

    fn failure(&self, message: impl Into<String>) -> SkillflowError {
        SkillflowError::SkillExecution {
            node: self.base.node_id(),
            message: message.into(),
        }
    }

    /// Wait for the child, killing it once the deadline passes.
    fn wait(&self, child: &mut Child) -> Result<ExitStatus> {
        let timeout = match self.timeout {
            Some(t) => t,
            None => return child.wait().map_err(|e| self.failure(e.to_string())),
        };

        let deadline = Instant::now() + timeout;
        loop {
            match child.try_wait().map_err(|e| self.failure(e.to_string()))? {
                Some(status) => return Ok(status),
                None if Instant::now() >= deadline => {
                    if let Err(e) = child.kill().and_then(|_| child.wait()) {
                        warn!(
                            node_id = self.base.node_id(),
                            error = %e,
                            "Failed to reap timed out plugin"
                        );
                    }
                    return Err(self.failure(format!("timed out after {}s", timeout.as_secs())));
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        }
    }

    fn collect(&self, reader: Option<JoinHandle<io::Result<Vec<u8>>>>) -> Result<Vec<u8>> {
        match reader {
            None => Ok(Vec::new()),
            Some(handle) => handle
                .join()
                .map_err(|_| self.failure("plugin output reader panicked"))?
                .map_err(|e| self.failure(format!("failed to read plugin output: {}", e))),
        }
    }
}

fn read_all(mut pipe: impl Read) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf)?;
    Ok(buf)
}

impl Skill for CommandSkill {
    fn base(&self) -> &SkillBase {
        &self.base
    }

    fn execute(&mut self, context: &mut ExecutionContext) -> Result<Value> {
        debug!(node_id = self.base.node_id(), command = %self.command, "Executing plugin command");

        let input = serde_json::to_vec(&json!({
            "node": self.base.node(),
            "context": context,
        }))?;

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.command);
            c
        };
        let mut child = cmd
            .current_dir(&self.plugin_dir)
            .env("SKILL_DIR", &self.plugin_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.failure(format!("failed to spawn '{}': {}", self.command, e)))?;

        // Pipes are serviced on their own threads so a plugin that streams
        // output before draining its input cannot stall on a full buffer.
        let writer = child
            .stdin
            .take()
            .map(|mut stdin| thread::spawn(move || stdin.write_all(&input)));
        let stdout = child.stdout.take().map(|out| thread::spawn(move || read_all(out)));
        let stderr = child.stderr.take().map(|err| thread::spawn(move || read_all(err)));

        let status = self.wait(&mut child)?;
        let stdout = self.collect(stdout)?;
        let stderr = self.collect(stderr)?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(self.failure(format!(
                "exit code {}\n{}",
                status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                // The child may exit without reading its input
                Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => {
                    return Err(self.failure(format!("failed to write plugin input: {}", e)))
                }
                Err(_) => return Err(self.failure("plugin input writer panicked")),
            }
        }

        let response: Value = serde_json::from_slice(&stdout)
            .map_err(|e| self.failure(format!("unreadable plugin output: {}", e)))?;
        let obj = response
            .as_object()
            .ok_or_else(|| self.failure("plugin output is not a JSON object"))?;

        if let Some(updates) = obj.get("updates") {
            let updates = updates
                .as_object()
                .ok_or_else(|| self.failure("'updates' is not a JSON object"))?;
            context.merge_object(updates);
        }

        obj.get("next")
            .cloned()
            .ok_or_else(|| self.failure("plugin output has no 'next' field"))
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;

    fn manifest(command: &str) -> PluginManifest {
        PluginManifest {
            name: "cmd".into(),
            description: String::new(),
            command: Some(command.into()),
            timeout_secs: None,
            prerequisites: Default::default(),
        }
    }

    fn node() -> NodeDef {
        NodeDef::new(1, "cmd").with_outputs(vec![Some(2), None])
    }

    #[test]
    fn command_updates_context_and_routes() {
        let m = manifest(r#"cat > /dev/null; echo '{"next": 2, "updates": {"greeting": "hi"}}'"#);
        let mut skill = CommandSkill::new(&m, std::env::temp_dir(), &node()).unwrap();

        let mut ctx = ExecutionContext::new();
        let next = skill.execute(&mut ctx).unwrap();
        assert_eq!(next, json!(2));
        assert_eq!(ctx.get_str("greeting"), Some("hi"));
    }

    #[test]
    fn command_sees_node_and_context() {
        let m = manifest(
            r#"if grep -q '"target":2'; then echo '{"next": 2}'; else echo '{"next": null}'; fi"#,
        );
        let mut skill = CommandSkill::new(&m, std::env::temp_dir(), &node()).unwrap();

        let mut ctx = ExecutionContext::new();
        ctx.set("target", json!(2));
        assert_eq!(skill.execute(&mut ctx).unwrap(), json!(2));
    }

    #[test]
    fn raw_next_is_passed_through() {
        let m = manifest(r#"echo '{"next": "somewhere"}'"#);
        let mut skill = CommandSkill::new(&m, std::env::temp_dir(), &node()).unwrap();
        let next = skill.execute(&mut ExecutionContext::new()).unwrap();
        assert_eq!(next, json!("somewhere"));
    }

    #[test]
    fn nonzero_exit_is_execution_failure() {
        let m = manifest("exit 42");
        let mut skill = CommandSkill::new(&m, std::env::temp_dir(), &node()).unwrap();
        match skill.execute(&mut ExecutionContext::new()) {
            Err(SkillflowError::SkillExecution { node, message }) => {
                assert_eq!(node, 1);
                assert!(message.contains("exit code 42"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_next_is_execution_failure() {
        let m = manifest(r#"echo '{"updates": {}}'"#);
        let mut skill = CommandSkill::new(&m, std::env::temp_dir(), &node()).unwrap();
        assert!(matches!(
            skill.execute(&mut ExecutionContext::new()),
            Err(SkillflowError::SkillExecution { .. })
        ));
    }

    #[test]
    fn large_context_streams_through_filter_plugin() {
        // Echoes its whole input back while still reading it
        let m = manifest(r#"echo '{"next": 2, "updates": {"echo": '; cat; echo '}}'"#);
        let mut skill = CommandSkill::new(&m, std::env::temp_dir(), &node()).unwrap();

        let blob = "x".repeat(1 << 20);
        let mut ctx = ExecutionContext::new();
        ctx.set("blob", json!(blob));

        assert_eq!(skill.execute(&mut ctx).unwrap(), json!(2));
        let echoed = ctx.get("echo").and_then(|e| e["context"]["blob"].as_str());
        assert_eq!(echoed.map(str::len), Some(1 << 20));
    }

    #[test]
    fn unread_input_is_not_an_error() {
        let m = manifest(r#"echo '{"next": null}'"#);
        let mut skill = CommandSkill::new(&m, std::env::temp_dir(), &node()).unwrap();

        let mut ctx = ExecutionContext::new();
        ctx.set("blob", json!("y".repeat(1 << 20)));
        assert_eq!(skill.execute(&mut ctx).unwrap(), Value::Null);
    }

    #[test]
    fn slow_command_is_killed_after_timeout() {
        let mut m = manifest("sleep 30");
        m.timeout_secs = Some(1);
        let mut skill = CommandSkill::new(&m, std::env::temp_dir(), &node()).unwrap();

        let start = Instant::now();
        match skill.execute(&mut ExecutionContext::new()) {
            Err(SkillflowError::SkillExecution { message, .. }) => {
                assert!(message.contains("timed out after 1s"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(start.elapsed() < Duration::from_secs(20));
    }

    #[test]
    fn manifest_without_command_breaks_contract() {
        let m: PluginManifest = toml::from_str(r#"name = "cmd""#).unwrap();
        assert!(matches!(
            CommandSkill::new(&m, std::env::temp_dir(), &node()),
            Err(SkillflowError::PluginContract { .. })
        ));
    }
}
