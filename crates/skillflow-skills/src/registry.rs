use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use skillflow_core::error::{Result, SkillflowError};
use skillflow_core::node::NodeDef;
use skillflow_core::traits::{Skill, SkillResolver};

/// Constructor for a skill type.
pub type SkillFactory = Arc<dyn Fn(&NodeDef) -> Result<Box<dyn Skill>> + Send + Sync>;

/// Registry of skill types, keyed by the node type name.
///
/// Populated once at startup, by explicit registration or by a discovery
/// pass over a plugin directory. Resolution never falls back to a default.
#[derive(Clone)]
pub struct SkillRegistry {
    factories: HashMap<String, SkillFactory>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory under a type name, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&NodeDef) -> Result<Box<dyn Skill>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Register a type whose constructor is a plain `new(&NodeDef)`.
    pub fn register_skill<S, F>(&mut self, name: impl Into<String>, ctor: F)
    where
        S: Skill,
        F: Fn(&NodeDef) -> Result<S> + Send + Sync + 'static,
    {
        self.register(name, move |node: &NodeDef| {
            ctor(node).map(|s| Box::new(s) as Box<dyn Skill>)
        });
    }

    /// Unregister a type by name.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.factories.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// List all registered type names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Create a registry with all built-in skills registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtin::register_builtins(&mut registry);
        registry
    }
}

impl SkillResolver for SkillRegistry {
    fn resolve(&self, type_name: &str, node: &NodeDef) -> Result<Box<dyn Skill>> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| SkillflowError::PluginNotFound(type_name.to_string()))?;

        let skill = factory(node)?;
        if skill.node_type() != type_name {
            return Err(SkillflowError::PluginContract {
                plugin: type_name.to_string(),
                message: format!("constructed a skill of type '{}'", skill.node_type()),
            });
        }

        debug!(node_id = node.id, skill = type_name, "Resolved skill");
        Ok(skill)
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}
