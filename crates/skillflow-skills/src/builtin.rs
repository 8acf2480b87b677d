//! Built-in skills shipped with the engine.
//!
//! Each routes only through its own declared outputs:
//! - `noop` takes the first output.
//! - `set` writes `params.value` into the context slot, then takes the first output.
//! - `branch` takes `outputs[0]` when the context slot is truthy, else `outputs[1]`.
//! - `counter` increments the context slot and takes `outputs[0]` while the
//!   count is below `params.limit`, else `outputs[1]`.

use serde_json::Value;

use skillflow_core::context::ExecutionContext;
use skillflow_core::error::{Result, SkillflowError};
use skillflow_core::node::{NodeDef, NodeId, Transition};
use skillflow_core::traits::{Skill, SkillBase};

use crate::registry::SkillRegistry;

pub fn register_builtins(registry: &mut SkillRegistry) {
    registry.register_skill("noop", NoopSkill::new);
    registry.register_skill("set", SetSkill::new);
    registry.register_skill("branch", BranchSkill::new);
    registry.register_skill("counter", CounterSkill::new);
}

fn describe(base: &SkillBase) -> String {
    format!("{} node {}", base.node_type(), base.node_id())
}

fn first_output(base: &SkillBase) -> Result<Option<NodeId>> {
    base.outputs()
        .first()
        .copied()
        .ok_or_else(|| SkillflowError::malformed(describe(base), "outputs[0]"))
}

fn two_outputs(base: &SkillBase) -> Result<(Option<NodeId>, Option<NodeId>)> {
    match base.outputs() {
        [a, b, ..] => Ok((*a, *b)),
        _ => Err(SkillflowError::malformed(describe(base), "outputs[1]")),
    }
}

fn required_slot(base: &SkillBase) -> Result<String> {
    base.context_slot()
        .map(str::to_string)
        .ok_or_else(|| SkillflowError::malformed(describe(base), "context_slot"))
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

pub struct NoopSkill {
    base: SkillBase,
    next: Option<NodeId>,
}

impl NoopSkill {
    pub fn new(node: &NodeDef) -> Result<Self> {
        let base = SkillBase::new(node)?;
        let next = first_output(&base)?;
        Ok(Self { base, next })
    }
}

impl Skill for NoopSkill {
    fn base(&self) -> &SkillBase {
        &self.base
    }

    fn execute(&mut self, _context: &mut ExecutionContext) -> Result<Value> {
        Ok(Transition::from(self.next).into())
    }
}

pub struct SetSkill {
    base: SkillBase,
    slot: String,
    value: Value,
    next: Option<NodeId>,
}

impl SetSkill {
    pub fn new(node: &NodeDef) -> Result<Self> {
        let base = SkillBase::new(node)?;
        let slot = required_slot(&base)?;
        let value = base.params().get("value").cloned().unwrap_or(Value::Null);
        let next = first_output(&base)?;
        Ok(Self {
            base,
            slot,
            value,
            next,
        })
    }
}

impl Skill for SetSkill {
    fn base(&self) -> &SkillBase {
        &self.base
    }

    fn execute(&mut self, context: &mut ExecutionContext) -> Result<Value> {
        context.set(self.slot.clone(), self.value.clone());
        Ok(Transition::from(self.next).into())
    }
}

pub struct BranchSkill {
    base: SkillBase,
    slot: String,
    when_true: Option<NodeId>,
    when_false: Option<NodeId>,
}

impl BranchSkill {
    pub fn new(node: &NodeDef) -> Result<Self> {
        let base = SkillBase::new(node)?;
        let slot = required_slot(&base)?;
        let (when_true, when_false) = two_outputs(&base)?;
        Ok(Self {
            base,
            slot,
            when_true,
            when_false,
        })
    }
}

impl Skill for BranchSkill {
    fn base(&self) -> &SkillBase {
        &self.base
    }

    fn execute(&mut self, context: &mut ExecutionContext) -> Result<Value> {
        let next = if is_truthy(context.get(&self.slot)) {
            self.when_true
        } else {
            self.when_false
        };
        Ok(Transition::from(next).into())
    }
}

pub struct CounterSkill {
    base: SkillBase,
    slot: String,
    limit: i64,
    again: Option<NodeId>,
    done: Option<NodeId>,
}

impl CounterSkill {
    pub fn new(node: &NodeDef) -> Result<Self> {
        let base = SkillBase::new(node)?;
        let slot = required_slot(&base)?;
        let limit = base
            .params()
            .get("limit")
            .ok_or_else(|| SkillflowError::malformed(describe(&base), "limit"))?
            .as_i64()
            .ok_or_else(|| {
                SkillflowError::mismatch(format!("{} limit", describe(&base)), "an integer")
            })?;
        let (again, done) = two_outputs(&base)?;
        Ok(Self {
            base,
            slot,
            limit,
            again,
            done,
        })
    }
}

impl Skill for CounterSkill {
    fn base(&self) -> &SkillBase {
        &self.base
    }

    fn execute(&mut self, context: &mut ExecutionContext) -> Result<Value> {
        let count = context
            .get(&self.slot)
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| SkillflowError::SkillExecution {
                node: self.base.node_id(),
                message: format!("counter '{}' overflowed", self.slot),
            })?;
        context.set(self.slot.clone(), Value::from(count));

        let next = if count < self.limit { self.again } else { self.done };
        Ok(Transition::from(next).into())
    }
}
