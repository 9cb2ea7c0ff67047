//! Slot registry: the layout of a state vector.
//!
//! Every automaton-local variable, global variable and synthetic control
//! variable (locations, edge selectors, the self-loop marker) is assigned a
//! slot while the composition tree is built. The registry is append-only and
//! is frozen behind an `Arc` before the first state vector is created.

use crate::error::{ExploreError, ExploreResult};
use pmc_eval::Value;
use pmc_model::VarType;
use std::collections::HashMap;
use std::fmt;

/// Identifier of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotName {
    Global(String),
    /// Variable of one automaton instance.
    Local {
        instance: usize,
        automaton: String,
        variable: String,
    },
    /// Current location of an automaton instance.
    Location { instance: usize, automaton: String },
    /// Edge chosen in the two-layer encoding, `-1` if none.
    EdgeSelector { instance: usize, automaton: String },
    /// Pending self-loop of a fixed deadlock.
    SelfLoop,
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotName::Global(name) => write!(f, "{}", name),
            SlotName::Local {
                instance,
                automaton,
                variable,
            } => write!(f, "{}[{}].{}", automaton, instance, variable),
            SlotName::Location {
                instance,
                automaton,
            } => write!(f, "{}[{}].%location", automaton, instance),
            SlotName::EdgeSelector {
                instance,
                automaton,
            } => write!(f, "{}[{}].%edge", automaton, instance),
            SlotName::SelfLoop => write!(f, "%self-loop"),
        }
    }
}

/// Whether a slot is part of the persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permanence {
    Stored,
    /// Recomputed each step; reset to its initial value (if any) on unmark.
    Transient,
}

/// Descriptor of one slot.
#[derive(Debug, Clone)]
pub struct Slot {
    pub name: SlotName,
    pub ty: VarType,
    pub permanence: Permanence,
    pub initial: Option<Value>,
    /// Decision slots are transient but still distinguish states, so that
    /// the two-layer encoding can tell an edge choice from its source.
    pub decision: bool,
}

impl Slot {
    pub fn stored(name: SlotName, ty: VarType) -> Self {
        Self {
            name,
            ty,
            permanence: Permanence::Stored,
            initial: None,
            decision: false,
        }
    }

    pub fn transient(name: SlotName, ty: VarType) -> Self {
        Self {
            permanence: Permanence::Transient,
            ..Self::stored(name, ty)
        }
    }

    pub fn with_initial(mut self, initial: Value) -> Self {
        self.initial = Some(initial);
        self
    }

    pub fn decision(mut self) -> Self {
        self.decision = true;
        self
    }

    pub fn is_stored(&self) -> bool {
        self.permanence == Permanence::Stored
    }

    /// Whether the slot contributes to state identity.
    pub fn is_identifying(&self) -> bool {
        self.is_stored() || self.decision
    }

    /// Value a fresh state vector holds in this slot.
    pub fn default_value(&self) -> Value {
        if let Some(v) = self.initial {
            return v;
        }
        match self.ty {
            VarType::Bool => Value::bool(false),
            VarType::BoundedInt { lo, hi } => {
                if lo <= 0 && 0 <= hi {
                    Value::int(0)
                } else {
                    Value::int(lo)
                }
            }
            VarType::Int => Value::int(0),
            VarType::Real => Value::real(0.0),
        }
    }

    /// Coerce `value` into this slot's type, or `None` if it does not fit.
    /// Integers widen into real slots.
    pub fn admit(&self, value: Value) -> Option<Value> {
        admit(&self.ty, value)
    }
}

/// Coerce `value` into `ty`, or `None` if it does not fit.
pub fn admit(ty: &VarType, value: Value) -> Option<Value> {
    match (ty, value) {
        (VarType::Bool, Value::Bool(_)) => Some(value),
        (VarType::BoundedInt { lo, hi }, Value::Int(n)) => (*lo <= n && n <= *hi).then_some(value),
        (VarType::Int, Value::Int(_)) => Some(value),
        (VarType::Real, Value::Int(n)) => Some(Value::real(n as f64)),
        (VarType::Real, Value::Real(_)) => Some(value),
        _ => None,
    }
}

/// Finite domain of a type, or `None` if it is unbounded.
pub fn domain(ty: &VarType) -> Option<Vec<Value>> {
    match ty {
        VarType::Bool => Some(vec![Value::bool(false), Value::bool(true)]),
        VarType::BoundedInt { lo, hi } => Some((*lo..=*hi).map(Value::int).collect()),
        VarType::Int | VarType::Real => None,
    }
}

/// Append-only table of slots.
#[derive(Debug, Clone, Default)]
pub struct SlotRegistry {
    slots: Vec<Slot>,
    by_name: HashMap<SlotName, usize>,
    /// Slots hashed into fingerprints.
    identifying: Vec<usize>,
    /// Transient slots with an initial value, restored on unmark.
    resettable: Vec<(usize, Value)>,
}

impl SlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot and return its index.
    pub fn add(&mut self, slot: Slot) -> ExploreResult<usize> {
        if self.by_name.contains_key(&slot.name) {
            return Err(ExploreError::InvalidModel(format!(
                "variable '{}' declared twice",
                slot.name
            )));
        }
        let idx = self.slots.len();
        if slot.is_identifying() {
            self.identifying.push(idx);
        }
        if !slot.is_stored() {
            if let Some(initial) = slot.initial {
                self.resettable.push((idx, initial));
            }
        }
        self.by_name.insert(slot.name.clone(), idx);
        self.slots.push(slot);
        Ok(idx)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn slot(&self, idx: usize) -> &Slot {
        &self.slots[idx]
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn lookup(&self, name: &SlotName) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn global(&self, name: &str) -> Option<usize> {
        self.lookup(&SlotName::Global(name.to_string()))
    }

    pub(crate) fn identifying(&self) -> &[usize] {
        &self.identifying
    }

    pub(crate) fn resettable(&self) -> &[(usize, Value)] {
        &self.resettable
    }

    /// Display name of a slot, for diagnostics.
    pub fn name(&self, idx: usize) -> String {
        self.slots[idx].name.to_string()
    }
}
