pub mod executor;
pub mod workflow;

pub use executor::{ExecutionResult, GraphExecutor, StepRecord};
pub use workflow::{SkillMap, Workflow};
