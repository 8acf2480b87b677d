//! Test helpers shared across the workspace.
//!
//! - `ScriptedSkill` replays `params.script` and records every visit.
//! - `WorkflowBuilder` assembles untyped workflow descriptions.

use serde_json::{json, Map, Value};

use skillflow_core::context::ExecutionContext;
use skillflow_core::error::{Result, SkillflowError};
use skillflow_core::node::{NodeDef, NodeId};
use skillflow_core::traits::{Skill, SkillBase};
use skillflow_skills::SkillRegistry;

/// Node type name `ScriptedSkill` registers under.
pub const SCRIPTED: &str = "scripted";

/// Context key listing the node ids visited, in order.
pub const VISITS: &str = "visits";

/// A skill that returns the values of `params.script` in a cycle.
///
/// Each call appends the node id to `context["visits"]`, so tests can check
/// the exact path a run took.
pub struct ScriptedSkill {
    base: SkillBase,
    script: Vec<Value>,
    calls: usize,
}

impl ScriptedSkill {
    pub fn new(node: &NodeDef) -> Result<Self> {
        let base = SkillBase::new(node)?;
        let context = format!("scripted node {}", node.id);
        let script = base
            .params()
            .get("script")
            .ok_or_else(|| SkillflowError::malformed(&context, "script"))?
            .as_array()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SkillflowError::mismatch(format!("{context} script"), "a non-empty list"))?
            .clone();
        Ok(Self {
            base,
            script,
            calls: 0,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Skill for ScriptedSkill {
    fn base(&self) -> &SkillBase {
        &self.base
    }

    fn execute(&mut self, context: &mut ExecutionContext) -> Result<Value> {
        let id = self.base.node_id();
        match context.get_mut(VISITS).and_then(|v| v.as_array_mut()) {
            Some(visits) => visits.push(json!(id)),
            None => {
                context.set(VISITS, json!([id]));
            }
        }

        let next = self.script[self.calls % self.script.len()].clone();
        self.calls += 1;
        Ok(next)
    }
}

/// A registry with the built-ins plus `scripted`.
pub fn scripted_registry() -> SkillRegistry {
    let mut registry = SkillRegistry::with_builtins();
    registry.register_skill(SCRIPTED, ScriptedSkill::new);
    registry
}

/// Node ids visited so far, read back from the context.
pub fn visits(context: &ExecutionContext) -> Vec<NodeId> {
    context
        .get(VISITS)
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_i64()).collect())
        .unwrap_or_default()
}

/// Builder for untyped workflow descriptions.
pub struct WorkflowBuilder {
    workflow_id: String,
    entry: Value,
    nodes: Vec<Value>,
    meta: Option<Value>,
}

impl WorkflowBuilder {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            entry: json!(1),
            nodes: vec![],
            meta: None,
        }
    }

    /// Set the entry node id.
    pub fn entry(mut self, entry: NodeId) -> Self {
        self.entry = json!(entry);
        self
    }

    /// Append a raw node document.
    pub fn raw_node(mut self, node: Value) -> Self {
        self.nodes.push(node);
        self
    }

    /// Append a node with no inputs.
    pub fn node(self, id: NodeId, node_type: &str, outputs: Value, params: Value) -> Self {
        self.raw_node(json!({
            "id": id,
            "type": node_type,
            "inputs": [],
            "outputs": outputs,
            "params": params,
        }))
    }

    /// Append a `scripted` node replaying `script`.
    pub fn scripted(self, id: NodeId, outputs: Value, script: Value) -> Self {
        self.node(id, SCRIPTED, outputs, json!({ "script": script }))
    }

    pub fn meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn build(self) -> Value {
        let mut doc = Map::new();
        doc.insert("workflow_id".into(), json!(self.workflow_id));
        doc.insert("entry".into(), self.entry);
        doc.insert("nodes".into(), Value::Array(self.nodes));
        if let Some(meta) = self.meta {
            doc.insert("meta".into(), meta);
        }
        Value::Object(doc)
    }
}
