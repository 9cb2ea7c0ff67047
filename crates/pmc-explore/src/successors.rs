//! Reusable successor buffers.

use crate::actions::ActionId;
use crate::registry::SlotRegistry;
use crate::state::StateVector;
use pmc_eval::Weight;
use std::sync::Arc;

/// Successors produced by one query of one composition node.
///
/// Node slots are allocated lazily and reused across queries; the arena
/// doubles when a query needs more slots than any query before. A slot is
/// only valid until the next query of the owning node.
#[derive(Debug, Clone)]
pub struct Successors<W> {
    registry: Arc<SlotRegistry>,
    nodes: Vec<StateVector>,
    weights: Vec<W>,
    labels: Vec<ActionId>,
}

impl<W: Weight> Successors<W> {
    pub fn new(registry: &Arc<SlotRegistry>) -> Self {
        Self {
            registry: Arc::clone(registry),
            nodes: vec![StateVector::new(registry)],
            weights: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Arc<SlotRegistry> {
        &self.registry
    }

    pub fn clear(&mut self) {
        self.weights.clear();
        self.labels.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Number of allocated node slots.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Unmarked node slot for the next successor. Nothing is recorded until
    /// [`commit`](Successors::commit); an uncommitted slot is reused.
    pub fn begin(&mut self) -> &mut StateVector {
        let next = self.len();
        if next >= self.nodes.len() {
            let mut new_len = self.nodes.len().max(1);
            while new_len <= next {
                new_len *= 2;
            }
            let registry = &self.registry;
            self.nodes.resize_with(new_len, || StateVector::new(registry));
        }
        let node = &mut self.nodes[next];
        node.unmark();
        node
    }

    /// Record the slot handed out by the last [`begin`](Successors::begin).
    pub fn commit(&mut self, weight: W, label: ActionId) {
        debug_assert!(self.len() < self.nodes.len());
        self.weights.push(weight);
        self.labels.push(label);
    }

    #[inline]
    pub fn node(&self, i: usize) -> &StateVector {
        debug_assert!(i < self.len());
        &self.nodes[i]
    }

    #[inline]
    pub fn weight(&self, i: usize) -> &W {
        &self.weights[i]
    }

    #[inline]
    pub fn label(&self, i: usize) -> ActionId {
        self.labels[i]
    }

    pub fn labels(&self) -> &[ActionId] {
        &self.labels
    }
}
