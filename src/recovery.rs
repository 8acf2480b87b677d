use std::time::Duration;

use tracing::warn;

use skillflow_core::config::RecoveryConfig;
use skillflow_core::context::ExecutionContext;
use skillflow_core::error::{Result, SkillflowError};
use skillflow_engine::{ExecutionResult, GraphExecutor};

/// Re-invokes failed runs according to the `[recovery]` config section.
///
/// Every attempt starts from a fresh copy of the initial context. Errors
/// raised while building the workflow or its skills are never retried.
#[derive(Debug, Clone)]
pub struct RecoveryPolicy {
    max_attempts: u32,
    retry_on: Vec<String>,
    backoff_ms: u64,
}

impl RecoveryPolicy {
    pub fn from_config(config: &RecoveryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_on: config.retry_on.clone(),
            backoff_ms: config.backoff_ms,
        }
    }

    /// Whether a failure on zero-based `attempt` earns another try.
    pub fn should_retry(&self, error: &SkillflowError, attempt: u32) -> bool {
        !error.is_construction()
            && attempt + 1 < self.max_attempts
            && self.retry_on.iter().any(|code| code == error.code())
    }

    /// Delay before the attempt following `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }

    /// Run until success, a non-retryable error, or the attempt budget runs out.
    ///
    /// Returns the result with the context the successful attempt produced.
    pub fn run(
        &self,
        executor: &mut GraphExecutor,
        initial: &ExecutionContext,
    ) -> Result<(ExecutionResult, ExecutionContext)> {
        let mut attempt = 0;
        loop {
            let mut context = initial.clone();
            match executor.run(&mut context) {
                Ok(result) => return Ok((result, context)),
                Err(e) if self.should_retry(&e, attempt) => {
                    let backoff = self.backoff(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        code = e.code(),
                        error = %e,
                        "Retrying workflow run"
                    );
                    if !backoff.is_zero() {
                        std::thread::sleep(backoff);
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::{json, Value};
    use skillflow_core::config::EngineConfig;
    use skillflow_core::node::NodeDef;
    use skillflow_core::traits::{Skill, SkillBase};
    use skillflow_engine::Workflow;
    use skillflow_test_utils::{scripted_registry, WorkflowBuilder};

    /// Fails its first `params.failures` calls, then terminates.
    struct Flaky {
        base: SkillBase,
        failures: u64,
        calls: u64,
    }

    impl Flaky {
        fn new(node: &NodeDef) -> Result<Self> {
            let failures = node.params.get("failures").and_then(Value::as_u64).unwrap_or(0);
            Ok(Self {
                base: SkillBase::new(node)?,
                failures,
                calls: 0,
            })
        }
    }

    impl Skill for Flaky {
        fn base(&self) -> &SkillBase {
            &self.base
        }

        fn execute(&mut self, context: &mut ExecutionContext) -> Result<Value> {
            self.calls += 1;
            if self.calls <= self.failures {
                context.set("failed_at", json!(self.calls));
                return Err(SkillflowError::SkillExecution {
                    node: self.base.node_id(),
                    message: format!("call {} failed", self.calls),
                });
            }
            Ok(Value::Null)
        }
    }

    fn policy(max_attempts: u32, retry_on: &[&str]) -> RecoveryPolicy {
        RecoveryPolicy::from_config(&RecoveryConfig {
            max_attempts,
            retry_on: retry_on.iter().map(|s| s.to_string()).collect(),
            backoff_ms: 0,
        })
    }

    fn flaky_executor(failures: u64) -> GraphExecutor {
        let mut registry = scripted_registry();
        registry.register_skill("flaky", Flaky::new);
        let doc = WorkflowBuilder::new("flaky")
            .node(1, "flaky", json!([null]), json!({ "failures": failures }))
            .build();
        let workflow = Arc::new(Workflow::from_value(&doc).unwrap());
        GraphExecutor::new(workflow, Arc::new(registry), EngineConfig::default()).unwrap()
    }

    #[test]
    fn retries_until_success_with_fresh_context() {
        let mut executor = flaky_executor(2);
        let mut initial = ExecutionContext::new();
        initial.set("seed", json!(1));

        let (result, context) = policy(3, &["skill_execution"])
            .run(&mut executor, &initial)
            .unwrap();
        assert_eq!(result.path(), vec![1]);
        assert_eq!(context.get("seed"), Some(&json!(1)));
        assert!(context.get("failed_at").is_none());
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut executor = flaky_executor(5);
        let err = policy(3, &["skill_execution"])
            .run(&mut executor, &ExecutionContext::new())
            .unwrap_err();
        match err {
            SkillflowError::SkillExecution { message, .. } => assert_eq!(message, "call 3 failed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn default_config_never_retries() {
        let mut executor = flaky_executor(1);
        let policy = RecoveryPolicy::from_config(&RecoveryConfig::default());
        assert!(policy.run(&mut executor, &ExecutionContext::new()).is_err());
    }

    #[test]
    fn unlisted_codes_are_not_retried() {
        let p = policy(5, &["skill_execution"]);
        let err = SkillflowError::ContractViolation {
            node: 1,
            returned: "\"x\"".into(),
        };
        assert!(!p.should_retry(&err, 0));
    }

    #[test]
    fn construction_errors_are_never_retried() {
        let p = policy(5, &["plugin_not_found", "duplicate_node_id"]);
        assert!(!p.should_retry(&SkillflowError::PluginNotFound("x".into()), 0));
        assert!(!p.should_retry(&SkillflowError::DuplicateNodeId(1), 0));
    }

    #[test]
    fn backoff_doubles() {
        let p = RecoveryPolicy::from_config(&RecoveryConfig {
            max_attempts: 4,
            retry_on: vec![],
            backoff_ms: 100,
        });
        assert_eq!(p.backoff(0), Duration::from_millis(100));
        assert_eq!(p.backoff(1), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(800));
    }
}
