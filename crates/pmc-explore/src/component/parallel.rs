//! Binary parallel composition.

use super::{merge_conflict, BuildContext, Component, ComponentExplorer};
use crate::actions::{ActionId, SILENT};
use crate::error::ExploreResult;
use crate::extension::ExplorerExtension;
use crate::state::StateVector;
use crate::successors::Successors;
use pmc_eval::Weight;
use std::sync::Arc;

/// Interleaves two components and synchronises them on a set of actions.
#[derive(Debug)]
pub struct ParallelExplorer<W: Weight> {
    left: ComponentExplorer<W>,
    right: ComponentExplorer<W>,
    /// Indexed by action.
    synchronising: Vec<bool>,
    two_layer: bool,
    initial_nodes: Vec<StateVector>,
    successors: Successors<W>,
    state_query: bool,
}

impl<W: Weight> ParallelExplorer<W> {
    pub(crate) fn build(
        left: ComponentExplorer<W>,
        right: ComponentExplorer<W>,
        synchronise: &[String],
        ctx: &BuildContext<'_>,
    ) -> ExploreResult<Self> {
        let mut synchronising = vec![false; ctx.actions.len()];
        for name in synchronise {
            synchronising[ctx.actions.id(Some(name))?] = true;
        }

        let mut initial_nodes =
            Vec::with_capacity(left.initial_nodes().len() * right.initial_nodes().len());
        for l in left.initial_nodes() {
            for r in right.initial_nodes() {
                let mut node = l.clone();
                node.merge_written(r)
                    .map_err(|slot| merge_conflict(ctx.registry, slot))?;
                initial_nodes.push(node);
            }
        }

        Ok(Self {
            left,
            right,
            synchronising,
            two_layer: ctx.model.model_type.is_two_layer(),
            initial_nodes,
            successors: Successors::new(ctx.registry),
            state_query: true,
        })
    }

    /// Synchronised pairs, then the independent moves of either side.
    fn interleave(&mut self, weigh: bool) -> ExploreResult<()> {
        let Self {
            left,
            right,
            synchronising,
            successors,
            ..
        } = self;
        let registry = Arc::clone(successors.registry());
        for i in 0..left.num_successors() {
            let action = left.label(i);
            if !synchronising[action] {
                continue;
            }
            for j in 0..right.num_successors() {
                if right.label(j) != action {
                    continue;
                }
                let succ = successors.begin();
                succ.assign_from_marked(left.successor(i));
                succ.merge_written(right.successor(j))
                    .map_err(|slot| merge_conflict(&registry, slot))?;
                let weight = if weigh {
                    left.weight(i).multiply(right.weight(j))
                } else {
                    W::zero()
                };
                successors.commit(weight, action);
            }
        }
        for side in [&*left, &*right] {
            for i in 0..side.num_successors() {
                let action = side.label(i);
                if synchronising[action] {
                    continue;
                }
                successors.begin().assign_from_marked(side.successor(i));
                let weight = if weigh { side.weight(i).clone() } else { W::zero() };
                successors.commit(weight, action);
            }
        }
        Ok(())
    }

    /// Which children move from `node`. In the two-layer encoding a side
    /// still resolving a distribution moves alone while the other waits in
    /// its state.
    fn moving(&self, node: &StateVector) -> (bool, bool) {
        if !self.two_layer {
            return (true, true);
        }
        match (self.left.is_state(node), self.right.is_state(node)) {
            (false, true) => (true, false),
            (true, false) => (false, true),
            _ => (true, true),
        }
    }

    /// Forward the successors of the one side that is resolving a choice.
    fn forward(successors: &mut Successors<W>, side: &ComponentExplorer<W>) {
        for i in 0..side.num_successors() {
            successors.begin().assign_from_marked(side.successor(i));
            successors.commit(side.weight(i).clone(), side.label(i));
        }
    }

    /// Both sides resolve a choice: every pair of outcomes.
    fn cross(&mut self) -> ExploreResult<()> {
        let Self {
            left,
            right,
            successors,
            ..
        } = self;
        let registry = Arc::clone(successors.registry());
        for i in 0..left.num_successors() {
            for j in 0..right.num_successors() {
                let succ = successors.begin();
                succ.assign_from_marked(left.successor(i));
                succ.merge_written(right.successor(j))
                    .map_err(|slot| merge_conflict(&registry, slot))?;
                successors.commit(left.weight(i).multiply(right.weight(j)), SILENT);
            }
        }
        Ok(())
    }
}

impl<W: Weight> Component<W> for ParallelExplorer<W> {
    fn initial_nodes(&self) -> &[StateVector] {
        &self.initial_nodes
    }

    fn apply_location_values(&self, node: &mut StateVector) -> ExploreResult<()> {
        let (left, right) = self.moving(node);
        if left {
            self.left.apply_location_values(node)?;
        }
        if right {
            self.right.apply_location_values(node)?;
        }
        Ok(())
    }

    fn query(
        &mut self,
        node: &StateVector,
        extensions: &mut [Box<dyn ExplorerExtension<W>>],
    ) -> ExploreResult<()> {
        self.successors.clear();
        let (left_moves, right_moves) = self.moving(node);
        if left_moves {
            self.left.query(node, extensions)?;
        }
        if right_moves {
            self.right.query(node, extensions)?;
        }

        if !self.two_layer {
            self.state_query = true;
            return self.interleave(true);
        }
        self.state_query = self.left.is_state(node) && self.right.is_state(node);
        match (left_moves, right_moves) {
            (true, false) => {
                Self::forward(&mut self.successors, &self.left);
                Ok(())
            }
            (false, true) => {
                Self::forward(&mut self.successors, &self.right);
                Ok(())
            }
            _ if self.state_query => self.interleave(false),
            _ => self.cross(),
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
        self.left.is_state(node) && self.right.is_state(node)
    }

    fn is_state_query(&self) -> bool {
        self.state_query
    }
}

