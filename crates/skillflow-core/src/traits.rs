use serde_json::{Map, Value};

use crate::context::ExecutionContext;
use crate::error::{Result, SkillflowError};
use crate::node::{NodeDef, NodeId, CONFIG_OPTIONS_PARAM, CONTEXT_SLOT_PARAM};

/// Read-only view of the node a skill was built from.
///
/// Every skill embeds one. Construction checks the reserved params on top of
/// the shape guarantees `NodeDef` already carries.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillBase {
    node: NodeDef,
}

impl SkillBase {
    pub fn new(node: &NodeDef) -> Result<Self> {
        if let Some(slot) = node.params.get(CONTEXT_SLOT_PARAM) {
            if !slot.is_string() {
                return Err(SkillflowError::mismatch(
                    format!("node {} context_slot", node.id),
                    "a string",
                ));
            }
        }
        if let Some(options) = node.params.get(CONFIG_OPTIONS_PARAM) {
            if !options.is_array() {
                return Err(SkillflowError::mismatch(
                    format!("node {} config_options", node.id),
                    "a list",
                ));
            }
        }
        Ok(Self { node: node.clone() })
    }

    pub fn node_id(&self) -> NodeId {
        self.node.id
    }

    pub fn node_type(&self) -> &str {
        &self.node.node_type
    }

    pub fn inputs(&self) -> &[NodeId] {
        &self.node.inputs
    }

    pub fn outputs(&self) -> &[Option<NodeId>] {
        &self.node.outputs
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.node.params
    }

    pub fn context_slot(&self) -> Option<&str> {
        self.node.context_slot()
    }

    pub fn config_options(&self) -> Option<&[Value]> {
        self.node.config_options()
    }

    /// The node definition this base was built from.
    pub fn node(&self) -> &NodeDef {
        &self.node
    }
}

/// The executable behind a node type.
pub trait Skill: Send + 'static {
    /// The node this skill instance was constructed for.
    fn base(&self) -> &SkillBase;

    /// Run one step against the shared context.
    ///
    /// The returned value is the routing decision: an integer names the next
    /// node, `null` terminates. Any other value is a contract violation and is
    /// rejected by the executor.
    fn execute(&mut self, context: &mut ExecutionContext) -> Result<Value>;

    fn node_type(&self) -> &str {
        self.base().node_type()
    }

    fn inputs(&self) -> &[NodeId] {
        self.base().inputs()
    }

    fn outputs(&self) -> &[Option<NodeId>] {
        self.base().outputs()
    }

    fn params(&self) -> &Map<String, Value> {
        self.base().params()
    }

    fn context_slot(&self) -> Option<&str> {
        self.base().context_slot()
    }

    fn config_options(&self) -> Option<&[Value]> {
        self.base().config_options()
    }
}

/// Maps a node type name to a constructed skill.
///
/// Implementations do no caching; callers own the returned instance.
pub trait SkillResolver: Send + Sync {
    fn resolve(&self, type_name: &str, node: &NodeDef) -> Result<Box<dyn Skill>>;
}
