use thiserror::Error;

use crate::node::NodeId;

#[derive(Debug, Error)]
pub enum SkillflowError {
    // Description errors
    #[error("Malformed {context}: missing required field '{field}'")]
    MalformedNode { context: String, field: String },

    #[error("Type mismatch: {field} must be {expected}")]
    TypeMismatch { field: String, expected: String },

    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(NodeId),

    #[error("Entry {0} does not reference a declared node")]
    UnknownEntry(NodeId),

    #[error("Node {node} declares output {target}, which is not a declared node")]
    UnknownOutputTarget { node: NodeId, target: NodeId },

    // Plugin errors
    #[error("Plugin not found for skill type: {0}")]
    PluginNotFound(String),

    #[error("Plugin '{plugin}' violates the skill contract: {message}")]
    PluginContract { plugin: String, message: String },

    // Execution errors
    #[error("Unknown node id: {0}")]
    UnknownNode(NodeId),

    #[error("Skill at node {node} returned {returned}, expected an integer node id or null")]
    ContractViolation { node: NodeId, returned: String },

    #[error("Invalid transition from node {from} to {}", display_target(.to))]
    InvalidTransition { from: NodeId, to: Option<NodeId> },

    #[error("Run exceeded max steps ({0})")]
    StepLimitExceeded(usize),

    #[error("Skill execution failed at node {node}: {message}")]
    SkillExecution { node: NodeId, message: String },

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn display_target(to: &Option<NodeId>) -> String {
    match to {
        Some(id) => id.to_string(),
        None => "termination".to_string(),
    }
}

impl SkillflowError {
    pub fn malformed(context: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MalformedNode {
            context: context.into(),
            field: field.into(),
        }
    }

    pub fn mismatch(field: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
        }
    }

    /// Stable snake_case identifier for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedNode { .. } => "malformed_node",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::DuplicateNodeId(_) => "duplicate_node_id",
            Self::UnknownEntry(_) => "unknown_entry",
            Self::UnknownOutputTarget { .. } => "unknown_output_target",
            Self::PluginNotFound(_) => "plugin_not_found",
            Self::PluginContract { .. } => "plugin_contract",
            Self::UnknownNode(_) => "unknown_node",
            Self::ContractViolation { .. } => "contract_violation",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::StepLimitExceeded(_) => "step_limit_exceeded",
            Self::SkillExecution { .. } => "skill_execution",
            Self::Config(_) => "config",
            Self::ConfigNotFound(_) => "config_not_found",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }

    /// Whether this error was raised while building a workflow, before any
    /// skill ran.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::MalformedNode { .. }
                | Self::TypeMismatch { .. }
                | Self::DuplicateNodeId(_)
                | Self::UnknownEntry(_)
                | Self::UnknownOutputTarget { .. }
                | Self::PluginNotFound(_)
                | Self::PluginContract { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SkillflowError>;
