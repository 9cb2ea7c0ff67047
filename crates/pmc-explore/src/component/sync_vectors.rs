//! N-ary synchronisation vectors over automaton instances.

use super::{merge_conflict, AutomatonExplorer, BuildContext, Component};
use crate::actions::{ActionId, SILENT};
use crate::error::{ExploreError, ExploreResult};
use crate::extension::ExplorerExtension;
use crate::state::StateVector;
use crate::successors::Successors;
use pmc_eval::Weight;
use pmc_model::SyncVector;
use smallvec::SmallVec;
use std::sync::Arc;

/// Split `index` into one digit per position, least significant first.
///
/// Digit `k` ranges over `0..widths[k]`. Inverse of [`encode_index`] on
/// `0..widths.iter().product()`.
pub fn decode_index(mut index: usize, widths: &[usize], digits: &mut Vec<usize>) {
    digits.clear();
    for &width in widths {
        digits.push(index % width);
        index /= width;
    }
}

/// Combine mixed-radix digits into a linear index.
pub fn encode_index(digits: &[usize], widths: &[usize]) -> usize {
    digits
        .iter()
        .zip(widths)
        .rev()
        .fold(0, |index, (digit, width)| index * width + digit)
}

#[derive(Debug, Clone)]
struct CompiledVector {
    /// Automaton position and the action it must take.
    participants: SmallVec<[(usize, ActionId); 4]>,
    result: ActionId,
}

/// Synchronises a list of automata through explicit vectors.
///
/// A vector contributes the cross product of its participants' successors
/// for the required actions; automata a vector does not mention keep their
/// state. In the two-layer encoding, once edges are chosen the automata
/// still resolving a distribution are crossed with each other.
#[derive(Debug)]
pub struct SyncVectorExplorer<W: Weight> {
    automata: Vec<AutomatonExplorer<W>>,
    vectors: Vec<CompiledVector>,
    two_layer: bool,
    initial_nodes: Vec<StateVector>,
    successors: Successors<W>,
    state_query: bool,
    widths: Vec<usize>,
    digits: Vec<usize>,
}

impl<W: Weight> SyncVectorExplorer<W> {
    pub(crate) fn build(
        elements: &[String],
        syncs: &[SyncVector],
        ctx: &mut BuildContext<'_>,
    ) -> ExploreResult<Self> {
        let mut automata = Vec::with_capacity(elements.len());
        for name in elements {
            let automaton = ctx.automaton(name)?;
            let instance = ctx.take_instance();
            automata.push(AutomatonExplorer::build(automaton, instance, ctx)?);
        }

        let mut vectors = Vec::with_capacity(syncs.len());
        for sync in syncs {
            if sync.synchronise.len() != elements.len() {
                return Err(ExploreError::InvalidModel(format!(
                    "synchronisation vector has {} entries for {} automata",
                    sync.synchronise.len(),
                    elements.len()
                )));
            }
            let mut participants = SmallVec::new();
            for (position, action) in sync.synchronise.iter().enumerate() {
                if let Some(action) = action {
                    participants.push((position, ctx.actions.id(Some(action))?));
                }
            }
            if participants.is_empty() {
                return Err(ExploreError::InvalidModel(
                    "synchronisation vector without participants".to_string(),
                ));
            }
            vectors.push(CompiledVector {
                participants,
                result: ctx.actions.id(sync.result.as_deref())?,
            });
        }

        let mut initial_nodes = vec![StateVector::new(ctx.registry)];
        for automaton in &automata {
            let mut next = Vec::with_capacity(initial_nodes.len() * automaton.initial_nodes().len());
            for partial in &initial_nodes {
                for own in automaton.initial_nodes() {
                    let mut node = partial.clone();
                    node.merge_written(own)
                        .map_err(|slot| merge_conflict(ctx.registry, slot))?;
                    next.push(node);
                }
            }
            initial_nodes = next;
        }

        Ok(Self {
            automata,
            vectors,
            two_layer: ctx.model.model_type.is_two_layer(),
            initial_nodes,
            successors: Successors::new(ctx.registry),
            state_query: true,
            widths: Vec::new(),
            digits: Vec::new(),
        })
    }

    /// Successors of every vector. Edge choices of the two-layer encoding
    /// carry no weight.
    fn synchronise(&mut self, node: &StateVector, weigh: bool) -> ExploreResult<()> {
        let Self {
            automata,
            vectors,
            successors,
            widths,
            digits,
            ..
        } = self;
        let registry = Arc::clone(successors.registry());
        for vector in vectors.iter() {
            widths.clear();
            widths.extend(
                vector
                    .participants
                    .iter()
                    .map(|&(k, action)| automata[k].action_range(action).len()),
            );
            let total: usize = widths.iter().product();
            for index in 0..total {
                decode_index(index, widths, digits);
                let succ = successors.begin();
                succ.copy_from(node);
                let mut weight = W::one();
                for (&(k, action), &digit) in vector.participants.iter().zip(digits.iter()) {
                    let i = automata[k].action_range(action).start + digit;
                    succ.merge_written(automata[k].successor(i))
                        .map_err(|slot| merge_conflict(&registry, slot))?;
                    if weigh {
                        weight = weight.multiply(automata[k].weight(i));
                    }
                }
                successors.commit(if weigh { weight } else { W::zero() }, vector.result);
            }
        }
        Ok(())
    }

    /// Whether every automaton is in a state of `node`. Always true outside
    /// the two-layer encoding.
    fn all_state(&self, node: &StateVector) -> bool {
        self.automata.iter().all(|a| a.is_state(node))
    }

    /// Cross product of the automata resolving a distribution.
    fn resolve(&mut self, node: &StateVector) -> ExploreResult<()> {
        let Self {
            automata,
            successors,
            widths,
            digits,
            ..
        } = self;
        let registry = Arc::clone(successors.registry());
        let resolving: SmallVec<[usize; 8]> = (0..automata.len())
            .filter(|&k| !automata[k].is_state(node))
            .collect();
        widths.clear();
        widths.extend(resolving.iter().map(|&k| automata[k].num_successors()));
        let total: usize = widths.iter().product();
        for index in 0..total {
            decode_index(index, widths, digits);
            let succ = successors.begin();
            succ.copy_from(node);
            let mut weight = W::one();
            for (&k, &i) in resolving.iter().zip(digits.iter()) {
                succ.merge_written(automata[k].successor(i))
                    .map_err(|slot| merge_conflict(&registry, slot))?;
                weight = weight.multiply(automata[k].weight(i));
            }
            successors.commit(weight, SILENT);
        }
        Ok(())
    }
}

impl<W: Weight> Component<W> for SyncVectorExplorer<W> {
    fn initial_nodes(&self) -> &[StateVector] {
        &self.initial_nodes
    }

    fn apply_location_values(&self, node: &mut StateVector) -> ExploreResult<()> {
        let all_state = self.all_state(node);
        for automaton in &self.automata {
            if all_state || !automaton.is_state(node) {
                automaton.apply_location_values(node)?;
            }
        }
        Ok(())
    }

    fn query(
        &mut self,
        node: &StateVector,
        extensions: &mut [Box<dyn ExplorerExtension<W>>],
    ) -> ExploreResult<()> {
        self.successors.clear();
        self.state_query = self.all_state(node);
        for automaton in &mut self.automata {
            if self.state_query || !automaton.is_state(node) {
                automaton.query(node, extensions)?;
            }
        }
        if !self.two_layer {
            return self.synchronise(node, true);
        }
        if self.state_query {
            self.synchronise(node, false)
        } else {
            self.resolve(node)
        }
    }

    #[inline]
    fn num_successors(&self) -> usize {
        self.successors.len()
    }

    #[inline]
    fn successor(&self, i: usize) -> &StateVector {
        self.successors.node(i)
    }

    #[inline]
    fn weight(&self, i: usize) -> &W {
        self.successors.weight(i)
    }

    #[inline]
    fn label(&self, i: usize) -> ActionId {
        self.successors.label(i)
    }

    fn is_state(&self, node: &StateVector) -> bool {
        self.automata.iter().all(|a| a.is_state(node))
    }

    fn is_state_query(&self) -> bool {
        self.state_query
    }
}
