use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SkillflowError};

/// Node identifier, unique within a workflow.
///
/// Ids are signed 64-bit. JSON integers outside that range are rejected as a
/// type mismatch like any other non-id value.
pub type NodeId = i64;

/// Reserved param naming the context slot a node reads and writes.
pub const CONTEXT_SLOT_PARAM: &str = "context_slot";

/// Reserved param carrying skill-specific tunables.
pub const CONFIG_OPTIONS_PARAM: &str = "config_options";

/// A single node of a workflow description.
///
/// `outputs` entries are either a successor node id or `None`, the sentinel
/// meaning the workflow may terminate after this node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    pub inputs: Vec<NodeId>,
    pub outputs: Vec<Option<NodeId>>,
    pub params: Map<String, Value>,
}

impl NodeDef {
    /// Create a node with no ports and no params.
    pub fn new(id: NodeId, node_type: impl Into<String>) -> Self {
        Self {
            id,
            node_type: node_type.into(),
            inputs: vec![],
            outputs: vec![],
            params: Map::new(),
        }
    }

    /// Set the input port list.
    pub fn with_inputs(mut self, inputs: Vec<NodeId>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Set the output port list.
    pub fn with_outputs(mut self, outputs: Vec<Option<NodeId>>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Set a single param.
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Parse and shape-check an untyped node document.
    ///
    /// Missing fields fail with `MalformedNode`; fields of the wrong shape fail
    /// with `TypeMismatch`. Integers must be JSON integers: floats, booleans and
    /// strings are rejected.
    pub fn from_value(node: &Value) -> Result<Self> {
        let obj = node
            .as_object()
            .ok_or_else(|| SkillflowError::mismatch("node", "an object"))?;

        for key in ["id", "type", "inputs", "outputs", "params"] {
            if !obj.contains_key(key) {
                return Err(SkillflowError::malformed("node", key));
            }
        }

        let id = as_node_id(&obj["id"])
            .ok_or_else(|| SkillflowError::mismatch("node id", "a 64-bit signed integer"))?;
        let node_type = obj["type"]
            .as_str()
            .ok_or_else(|| SkillflowError::mismatch(format!("node {id} type"), "a string"))?
            .to_string();
        let raw_inputs = obj["inputs"]
            .as_array()
            .ok_or_else(|| SkillflowError::mismatch(format!("node {id} inputs"), "a list"))?;
        let raw_outputs = obj["outputs"]
            .as_array()
            .ok_or_else(|| SkillflowError::mismatch(format!("node {id} outputs"), "a list"))?;
        let params = obj["params"]
            .as_object()
            .ok_or_else(|| SkillflowError::mismatch(format!("node {id} params"), "a mapping"))?
            .clone();

        let inputs = raw_inputs
            .iter()
            .map(|v| {
                as_node_id(v).ok_or_else(|| {
                    SkillflowError::mismatch(format!("node {id} inputs items"), "integers")
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let outputs = raw_outputs
            .iter()
            .map(|v| match v {
                Value::Null => Ok(None),
                other => as_node_id(other).map(Some).ok_or_else(|| {
                    SkillflowError::mismatch(format!("node {id} outputs items"), "integers or null")
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id,
            node_type,
            inputs,
            outputs,
            params,
        })
    }

    /// The `context_slot` param, if it is present and a string.
    pub fn context_slot(&self) -> Option<&str> {
        self.params.get(CONTEXT_SLOT_PARAM).and_then(|v| v.as_str())
    }

    /// The `config_options` param, if it is present and a list.
    pub fn config_options(&self) -> Option<&[Value]> {
        self.params
            .get(CONFIG_OPTIONS_PARAM)
            .and_then(|v| v.as_array())
            .map(|v| v.as_slice())
    }

    /// Whether `next` is among the declared outputs.
    pub fn declares(&self, next: Transition) -> bool {
        self.outputs.contains(&next.target())
    }
}

/// Decode a JSON value as a node id. Only true integers within the `i64`
/// range qualify.
pub fn as_node_id(value: &Value) -> Option<NodeId> {
    match value {
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

/// The routing decision a skill hands back after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Continue at the given node.
    Next(NodeId),
    /// Stop the workflow.
    Terminate,
}

impl Transition {
    /// Decode a raw skill return value. `None` means the value is neither an
    /// integer nor null.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Terminate),
            other => as_node_id(other).map(Self::Next),
        }
    }

    /// The output port entry this transition corresponds to.
    pub fn target(self) -> Option<NodeId> {
        match self {
            Self::Next(id) => Some(id),
            Self::Terminate => None,
        }
    }
}

impl From<Option<NodeId>> for Transition {
    fn from(target: Option<NodeId>) -> Self {
        match target {
            Some(id) => Self::Next(id),
            None => Self::Terminate,
        }
    }
}

impl From<Transition> for Value {
    fn from(transition: Transition) -> Self {
        match transition {
            Transition::Next(id) => Value::from(id),
            Transition::Terminate => Value::Null,
        }
    }
}
