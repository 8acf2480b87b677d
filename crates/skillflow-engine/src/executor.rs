use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use skillflow_core::config::EngineConfig;
use skillflow_core::context::ExecutionContext;
use skillflow_core::error::{Result, SkillflowError};
use skillflow_core::node::{NodeId, Transition};
use skillflow_core::traits::SkillResolver;

use crate::workflow::{SkillMap, Workflow};

/// One executed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    /// Which node was executed.
    pub node_id: NodeId,
    /// Where the node sent control next.
    pub transition: Option<NodeId>,
    /// Execution time in milliseconds.
    pub elapsed_ms: u64,
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub run_id: Uuid,
    pub workflow_id: String,
    /// Per-step records in execution order.
    pub steps: Vec<StepRecord>,
    /// Total execution time in milliseconds.
    pub total_elapsed_ms: u64,
}

impl ExecutionResult {
    /// Node ids in the order they ran.
    pub fn path(&self) -> Vec<NodeId> {
        self.steps.iter().map(|s| s.node_id).collect()
    }

    /// The node whose skill returned null.
    pub fn last_node(&self) -> Option<NodeId> {
        self.steps.last().map(|s| s.node_id)
    }
}

enum RunState {
    Running(NodeId),
    Terminated,
}

/// Runs a workflow one node at a time.
///
/// Starting from the entry node, each step executes the node's skill, decodes
/// the returned value into a transition, and checks it against the node's
/// declared outputs. A null transition ends the run.
pub struct GraphExecutor {
    workflow: Arc<Workflow>,
    resolver: Arc<dyn SkillResolver>,
    config: EngineConfig,
    skills: Option<SkillMap>,
}

impl GraphExecutor {
    /// Create an executor for a validated workflow.
    ///
    /// With `strict_outputs`, every output target is checked here. With
    /// `eager_resolution`, skills are resolved here instead of on the first run.
    pub fn new(
        workflow: Arc<Workflow>,
        resolver: Arc<dyn SkillResolver>,
        config: EngineConfig,
    ) -> Result<Self> {
        if config.strict_outputs {
            workflow.validate_outputs()?;
        }

        let mut executor = Self {
            workflow,
            resolver,
            config,
            skills: None,
        };
        if executor.config.eager_resolution {
            executor.skill_map()?;
        }
        Ok(executor)
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether the skill map has been built.
    pub fn is_resolved(&self) -> bool {
        self.skills.is_some()
    }

    /// Build the skill map once and hand it back on every later call.
    fn skill_map(&mut self) -> Result<&mut SkillMap> {
        let skills = match self.skills.take() {
            Some(skills) => skills,
            None => {
                let skills = self.workflow.resolve_skills(self.resolver.as_ref())?;
                debug!(
                    workflow_id = %self.workflow.workflow_id(),
                    count = skills.len(),
                    "Resolved workflow skills"
                );
                skills
            }
        };
        Ok(self.skills.insert(skills))
    }

    /// Run the workflow from its entry node until a skill returns null.
    ///
    /// On failure the first error is returned and `context` keeps whatever
    /// the executed skills wrote before it.
    pub fn run(&mut self, context: &mut ExecutionContext) -> Result<ExecutionResult> {
        let start = Instant::now();
        let run_id = Uuid::new_v4();
        let workflow = Arc::clone(&self.workflow);
        let max_steps = self.config.max_steps;
        let skills = self.skill_map()?;

        info!(
            run_id = %run_id,
            workflow_id = %workflow.workflow_id(),
            entry = workflow.entry(),
            "Starting workflow run"
        );

        let mut steps = Vec::new();
        let mut state = RunState::Running(workflow.entry());

        while let RunState::Running(current) = state {
            if let Some(limit) = max_steps {
                if steps.len() >= limit {
                    return Err(SkillflowError::StepLimitExceeded(limit));
                }
            }

            let skill = skills
                .get_mut(&current)
                .ok_or(SkillflowError::UnknownNode(current))?;

            let step_start = Instant::now();
            let returned = skill.execute(context)?;
            let transition = Transition::from_value(&returned).ok_or_else(|| {
                SkillflowError::ContractViolation {
                    node: current,
                    returned: returned.to_string(),
                }
            })?;
            workflow.validate_transition(current, transition)?;

            let elapsed_ms = step_start.elapsed().as_millis() as u64;
            debug!(
                node_id = current,
                next = ?transition.target(),
                elapsed_ms,
                "Executed node"
            );
            steps.push(StepRecord {
                node_id: current,
                transition: transition.target(),
                elapsed_ms,
            });

            state = match transition {
                Transition::Next(next) => RunState::Running(next),
                Transition::Terminate => RunState::Terminated,
            };
        }

        let total_elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            run_id = %run_id,
            steps = steps.len(),
            elapsed_ms = total_elapsed_ms,
            "Workflow run finished"
        );

        Ok(ExecutionResult {
            run_id,
            workflow_id: workflow.workflow_id().to_string(),
            steps,
            total_elapsed_ms,
        })
    }
}
