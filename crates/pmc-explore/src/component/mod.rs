//! Composition operators.
//!
//! The system composition is built into a tree of explorers mirroring
//! [`Composition`]: leaf automata, binary parallel composition, action
//! renaming and synchronisation vectors. Every node owns a successor buffer
//! that is refilled on each query; parents read their children's buffers
//! right after querying them.
//!
//! Building happens in two passes over the same composition. The first pass
//! registers every slot so that the registry can be frozen; the second
//! compiles expressions against the frozen layout. Both passes number
//! automaton instances in the same order.

mod automaton;
mod parallel;
mod rename;
mod sync_vectors;

pub use automaton::{AutomatonExplorer, EdgeProbabilitySum};
pub use parallel::ParallelExplorer;
pub use rename::RenameExplorer;
pub use sync_vectors::{decode_index, encode_index, SyncVectorExplorer};

use crate::actions::{ActionId, ActionIndex};
use crate::config::EnumeratorKind;
use crate::error::{ExploreError, ExploreResult};
use crate::extension::ExplorerExtension;
use crate::registry::SlotRegistry;
use crate::state::StateVector;
use pmc_eval::{Constants, Weight};
use pmc_model::{Automaton, Composition, Model};
use std::sync::Arc;

/// A node of the composition tree.
pub trait Component<W: Weight> {
    /// Initial nodes of this subtree. Only slots owned by the subtree are
    /// written (and marked).
    fn initial_nodes(&self) -> &[StateVector];

    /// Write the location transient values of every automaton that the
    /// next [`query`](Component::query) of `node` moves. Runs over the whole
    /// tree before any successor is generated, so that every successor sees
    /// the values of all automata.
    fn apply_location_values(&self, node: &mut StateVector) -> ExploreResult<()>;

    /// Compute the successors of `node`, replacing those of the previous
    /// query.
    fn query(
        &mut self,
        node: &StateVector,
        extensions: &mut [Box<dyn ExplorerExtension<W>>],
    ) -> ExploreResult<()>;

    fn num_successors(&self) -> usize;

    fn successor(&self, i: usize) -> &StateVector;

    fn weight(&self, i: usize) -> &W;

    fn label(&self, i: usize) -> ActionId;

    /// Whether `node` is a state of this subtree rather than a pending
    /// edge choice of the two-layer encoding.
    fn is_state(&self, node: &StateVector) -> bool;

    /// Whether the last queried node was a state.
    fn is_state_query(&self) -> bool;
}

/// Shared inputs of the second build pass.
pub(crate) struct BuildContext<'a> {
    pub model: &'a Model,
    pub registry: &'a Arc<SlotRegistry>,
    pub actions: &'a ActionIndex,
    pub constants: &'a Constants,
    pub enumerator: EnumeratorKind,
    pub next_instance: usize,
}

impl<'a> BuildContext<'a> {
    pub(crate) fn automaton(&self, name: &str) -> ExploreResult<&'a Automaton> {
        find_automaton(self.model, name)
    }

    pub(crate) fn take_instance(&mut self) -> usize {
        let instance = self.next_instance;
        self.next_instance += 1;
        instance
    }
}

fn find_automaton<'a>(model: &'a Model, name: &str) -> ExploreResult<&'a Automaton> {
    model
        .automaton(name)
        .ok_or_else(|| ExploreError::UnknownAutomaton(name.to_string()))
}

/// First pass: register the slots of every automaton instance in
/// `composition`.
pub(crate) fn register_slots(
    composition: &Composition,
    model: &Model,
    constants: &Constants,
    registry: &mut SlotRegistry,
    next_instance: &mut usize,
) -> ExploreResult<()> {
    match composition {
        Composition::Automaton(name) => {
            let automaton = find_automaton(model, name)?;
            automaton::register_slots(automaton, *next_instance, model.model_type, constants, registry)?;
            *next_instance += 1;
        }
        Composition::Parallel { left, right, .. } => {
            register_slots(left, model, constants, registry, next_instance)?;
            register_slots(right, model, constants, registry, next_instance)?;
        }
        Composition::Rename { inner, .. } => {
            register_slots(inner, model, constants, registry, next_instance)?;
        }
        Composition::SyncVectors { elements, .. } => {
            for name in elements {
                let automaton = find_automaton(model, name)?;
                automaton::register_slots(automaton, *next_instance, model.model_type, constants, registry)?;
                *next_instance += 1;
            }
        }
    }
    Ok(())
}

/// Composition tree node, dispatching to the concrete operator.
#[derive(Debug)]
pub enum ComponentExplorer<W: Weight> {
    Automaton(AutomatonExplorer<W>),
    Parallel(Box<ParallelExplorer<W>>),
    Rename(Box<RenameExplorer<W>>),
    SyncVectors(SyncVectorExplorer<W>),
}

impl<W: Weight> ComponentExplorer<W> {
    /// Second pass: build the explorer for `composition`.
    pub(crate) fn build(composition: &Composition, ctx: &mut BuildContext<'_>) -> ExploreResult<Self> {
        Ok(match composition {
            Composition::Automaton(name) => {
                let automaton = ctx.automaton(name)?;
                let instance = ctx.take_instance();
                ComponentExplorer::Automaton(AutomatonExplorer::build(automaton, instance, ctx)?)
            }
            Composition::Parallel {
                left,
                right,
                synchronise,
            } => {
                let left = ComponentExplorer::build(left, ctx)?;
                let right = ComponentExplorer::build(right, ctx)?;
                ComponentExplorer::Parallel(Box::new(ParallelExplorer::build(
                    left,
                    right,
                    synchronise,
                    ctx,
                )?))
            }
            Composition::Rename { inner, renaming } => {
                let inner = ComponentExplorer::build(inner, ctx)?;
                ComponentExplorer::Rename(Box::new(RenameExplorer::build(inner, renaming, ctx)?))
            }
            Composition::SyncVectors { elements, syncs } => {
                ComponentExplorer::SyncVectors(SyncVectorExplorer::build(elements, syncs, ctx)?)
            }
        })
    }
}

macro_rules! dispatch {
    ($self:expr, $c:ident => $body:expr) => {
        match $self {
            ComponentExplorer::Automaton($c) => $body,
            ComponentExplorer::Parallel($c) => $body,
            ComponentExplorer::Rename($c) => $body,
            ComponentExplorer::SyncVectors($c) => $body,
        }
    };
}

impl<W: Weight> Component<W> for ComponentExplorer<W> {
    fn initial_nodes(&self) -> &[StateVector] {
        dispatch!(self, c => c.initial_nodes())
    }

    fn apply_location_values(&self, node: &mut StateVector) -> ExploreResult<()> {
        dispatch!(self, c => c.apply_location_values(node))
    }

    fn query(
        &mut self,
        node: &StateVector,
        extensions: &mut [Box<dyn ExplorerExtension<W>>],
    ) -> ExploreResult<()> {
        dispatch!(self, c => c.query(node, extensions))
    }

    #[inline]
    fn num_successors(&self) -> usize {
        dispatch!(self, c => c.num_successors())
    }

    #[inline]
    fn successor(&self, i: usize) -> &StateVector {
        dispatch!(self, c => c.successor(i))
    }

    #[inline]
    fn weight(&self, i: usize) -> &W {
        dispatch!(self, c => c.weight(i))
    }

    #[inline]
    fn label(&self, i: usize) -> ActionId {
        dispatch!(self, c => c.label(i))
    }

    fn is_state(&self, node: &StateVector) -> bool {
        dispatch!(self, c => c.is_state(node))
    }

    fn is_state_query(&self) -> bool {
        dispatch!(self, c => c.is_state_query())
    }
}

/// Map a merge conflict onto the slot's name.
pub(crate) fn merge_conflict(registry: &SlotRegistry, slot: usize) -> ExploreError {
    ExploreError::MultipleWrite {
        slot: registry.name(slot),
    }
}
