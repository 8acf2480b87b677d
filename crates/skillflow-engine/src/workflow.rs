use std::collections::HashMap;
use std::path::Path;

use serde_json::{Map, Value};

use skillflow_core::error::{Result, SkillflowError};
use skillflow_core::node::{as_node_id, NodeDef, NodeId, Transition};
use skillflow_core::traits::{Skill, SkillResolver};

/// Resolved skills keyed by node id.
pub type SkillMap = HashMap<NodeId, Box<dyn Skill>>;

/// A validated workflow graph.
///
/// Construction checks the whole description up front: required keys and
/// shapes, unique node ids, and an entry that names a declared node. Once
/// built, the graph never changes and may be shared between runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
    workflow_id: String,
    entry: NodeId,
    nodes: Vec<NodeDef>,
    meta: Map<String, Value>,
    /// node id -> index into `nodes`
    node_map: HashMap<NodeId, usize>,
}

impl Workflow {
    /// Build from typed parts.
    pub fn new(
        workflow_id: impl Into<String>,
        entry: NodeId,
        nodes: Vec<NodeDef>,
        meta: Map<String, Value>,
    ) -> Result<Self> {
        let mut node_map = HashMap::with_capacity(nodes.len());
        for (index, node) in nodes.iter().enumerate() {
            if node_map.insert(node.id, index).is_some() {
                return Err(SkillflowError::DuplicateNodeId(node.id));
            }
        }

        if !node_map.contains_key(&entry) {
            return Err(SkillflowError::UnknownEntry(entry));
        }

        Ok(Self {
            workflow_id: workflow_id.into(),
            entry,
            nodes,
            meta,
            node_map,
        })
    }

    /// Validate and build from an untyped description.
    pub fn from_value(data: &Value) -> Result<Self> {
        let obj = data
            .as_object()
            .ok_or_else(|| SkillflowError::mismatch("workflow", "an object"))?;

        for key in ["workflow_id", "entry", "nodes"] {
            if !obj.contains_key(key) {
                return Err(SkillflowError::malformed("workflow", key));
            }
        }

        let workflow_id = obj["workflow_id"]
            .as_str()
            .ok_or_else(|| SkillflowError::mismatch("workflow_id", "a string"))?;
        let entry = as_node_id(&obj["entry"])
            .ok_or_else(|| SkillflowError::mismatch("entry", "an integer"))?;
        let raw_nodes = obj["nodes"]
            .as_array()
            .ok_or_else(|| SkillflowError::mismatch("nodes", "a list"))?;
        let meta = match obj.get("meta") {
            None => Map::new(),
            Some(Value::Object(m)) => m.clone(),
            Some(_) => return Err(SkillflowError::mismatch("meta", "a mapping")),
        };

        let nodes = raw_nodes
            .iter()
            .map(NodeDef::from_value)
            .collect::<Result<Vec<_>>>()?;

        Self::new(workflow_id, entry, nodes, meta)
    }

    /// Parse a JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let data: Value = serde_json::from_str(json)?;
        Self::from_value(&data)
    }

    /// Load and validate a JSON workflow file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> &[NodeDef] {
        &self.nodes
    }

    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    /// Get a node by id.
    pub fn get_node(&self, id: NodeId) -> Option<&NodeDef> {
        self.node_map.get(&id).map(|&index| &self.nodes[index])
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node_map.contains_key(&id)
    }

    /// Declared node ids in declaration order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check that every integer output names a declared node.
    ///
    /// Optional: by default outputs are only checked when a transition is
    /// taken.
    pub fn validate_outputs(&self) -> Result<()> {
        for node in &self.nodes {
            for target in node.outputs.iter().flatten() {
                if !self.contains(*target) {
                    return Err(SkillflowError::UnknownOutputTarget {
                        node: node.id,
                        target: *target,
                    });
                }
            }
        }
        Ok(())
    }

    /// Check that `next` is a declared output of `current`.
    pub fn validate_transition(&self, current: NodeId, next: Transition) -> Result<()> {
        let node = self
            .get_node(current)
            .ok_or(SkillflowError::UnknownNode(current))?;

        if !node.declares(next) {
            return Err(SkillflowError::InvalidTransition {
                from: current,
                to: next.target(),
            });
        }
        Ok(())
    }

    /// Resolve one skill per node, in declaration order.
    pub fn resolve_skills(&self, resolver: &dyn SkillResolver) -> Result<SkillMap> {
        let mut skills = SkillMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let skill = resolver.resolve(&node.node_type, node)?;
            skills.insert(node.id, skill);
        }
        Ok(skills)
    }
}
