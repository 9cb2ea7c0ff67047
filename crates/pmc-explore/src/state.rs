//! State vectors, write marks and fingerprinting.

use crate::registry::SlotRegistry;
use pmc_eval::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A fingerprint is a 64-bit hash identifying a state.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:016x})", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Hash a single slot value at a given position.
/// Int/Bool use splitmix64-style mixing; reals go through AHash.
#[inline]
pub(crate) fn hash_slot(idx: usize, val: &Value) -> u64 {
    let bits = match val {
        Value::Int(n) => *n as u64,
        Value::Bool(b) => *b as u64,
        Value::Real(_) => {
            let mut hasher = ahash::AHasher::default();
            idx.hash(&mut hasher);
            val.hash(&mut hasher);
            return hasher.finish();
        }
    };
    let h = ((idx as u64) ^ 0x2d358dccaa6c78a5).wrapping_mul(0x9e3779b97f4a7c15);
    let h = (h ^ bits).wrapping_mul(0x517cc1b727220a95);
    h ^ (h >> 32)
}

/// A state vector: one value per registry slot plus the set of slots
/// written since the last [`unmark`](StateVector::unmark).
///
/// Writes through [`set`](StateVector::set) are write-once per step; this is
/// how conflicting writes of composed components are detected.
#[derive(Clone)]
pub struct StateVector {
    registry: Arc<SlotRegistry>,
    values: Vec<Value>,
    written: Vec<bool>,
    written_list: Vec<usize>,
}

impl StateVector {
    /// A fresh vector holding each slot's default value, nothing written.
    pub fn new(registry: &Arc<SlotRegistry>) -> Self {
        let values = registry.slots().iter().map(|s| s.default_value()).collect();
        Self {
            registry: Arc::clone(registry),
            values,
            written: vec![false; registry.len()],
            written_list: Vec::with_capacity(registry.len()),
        }
    }

    pub fn registry(&self) -> &Arc<SlotRegistry> {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[inline]
    pub fn get(&self, slot: usize) -> Value {
        self.values[slot]
    }

    #[inline]
    pub fn is_written(&self, slot: usize) -> bool {
        self.written[slot]
    }

    /// Slots written since the last unmark, in write order.
    pub fn written_slots(&self) -> &[usize] {
        &self.written_list
    }

    pub fn num_written(&self) -> usize {
        self.written_list.len()
    }

    /// Write `value` and mark the slot. Returns `false` without writing if
    /// the slot was already written this step.
    #[inline]
    pub fn set(&mut self, slot: usize, value: Value) -> bool {
        if self.written[slot] {
            return false;
        }
        self.values[slot] = value;
        self.mark(slot);
        true
    }

    /// Mark a slot as written without changing its value.
    #[inline]
    pub fn mark(&mut self, slot: usize) -> bool {
        if self.written[slot] {
            return false;
        }
        self.written[slot] = true;
        self.written_list.push(slot);
        true
    }

    /// Clear all marks and restore transient slots to their initial value.
    pub fn unmark(&mut self) {
        for &slot in &self.written_list {
            self.written[slot] = false;
        }
        self.written_list.clear();
        for &(slot, initial) in self.registry.resettable() {
            self.values[slot] = initial;
        }
    }

    /// Copy all values of `other`; marks are left unchanged.
    pub fn copy_from(&mut self, other: &StateVector) {
        debug_assert_eq!(self.values.len(), other.values.len());
        self.values.copy_from_slice(&other.values);
    }

    /// Copy all values of `other` and additionally mark every slot `other`
    /// has written.
    pub fn assign_from_marked(&mut self, other: &StateVector) {
        self.copy_from(other);
        for &slot in &other.written_list {
            self.mark(slot);
        }
    }

    /// Write-once union: copy every slot `other` has written.
    ///
    /// A slot already written here with an equal value is accepted. A slot
    /// written with a different value is a conflict and its index is
    /// returned; slots merged before the conflict stay written.
    pub fn merge_written(&mut self, other: &StateVector) -> Result<(), usize> {
        debug_assert_eq!(self.values.len(), other.values.len());
        for &slot in &other.written_list {
            let value = other.values[slot];
            if self.written[slot] {
                if self.values[slot] != value {
                    return Err(slot);
                }
                continue;
            }
            self.values[slot] = value;
            self.mark(slot);
        }
        Ok(())
    }

    /// Copy every slot not written here from `source`.
    pub fn fill_unwritten(&mut self, source: &StateVector) {
        debug_assert_eq!(self.values.len(), source.values.len());
        for (slot, value) in self.values.iter_mut().enumerate() {
            if !self.written[slot] {
                *value = source.values[slot];
            }
        }
    }

    /// XOR-decomposable hash over the slots that identify a state.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut h: u64 = 0;
        for &slot in self.registry.identifying() {
            h ^= hash_slot(slot, &self.values[slot]);
        }
        Fingerprint(h)
    }
}

impl PartialEq for StateVector {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl Eq for StateVector {}

impl Hash for StateVector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.hash(state);
    }
}

impl fmt::Debug for StateVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for StateVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, (slot, value)) in self.registry.slots().iter().zip(&self.values).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", slot.name, value)?;
        }
        write!(f, ")")
    }
}
