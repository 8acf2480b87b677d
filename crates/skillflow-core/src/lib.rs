pub mod config;
pub mod context;
pub mod error;
pub mod node;
pub mod traits;

pub use config::{AppConfig, EngineConfig};
pub use context::ExecutionContext;
pub use error::{Result, SkillflowError};
pub use node::{NodeDef, NodeId, Transition};
pub use traits::{Skill, SkillBase, SkillResolver};
