//! Action renaming.

use super::{BuildContext, Component, ComponentExplorer};
use crate::actions::ActionId;
use crate::error::ExploreResult;
use crate::extension::ExplorerExtension;
use crate::state::StateVector;
use pmc_eval::Weight;

/// Relabels the successors of its child; everything else passes through.
#[derive(Debug)]
pub struct RenameExplorer<W: Weight> {
    inner: ComponentExplorer<W>,
    /// New action per old action; identity where unmapped.
    relabel: Vec<ActionId>,
    labels: Vec<ActionId>,
    initial_nodes: Vec<StateVector>,
}

impl<W: Weight> RenameExplorer<W> {
    pub(crate) fn build(
        inner: ComponentExplorer<W>,
        renaming: &[(String, Option<String>)],
        ctx: &BuildContext<'_>,
    ) -> ExploreResult<Self> {
        let mut relabel: Vec<ActionId> = (0..ctx.actions.len()).collect();
        for (from, to) in renaming {
            relabel[ctx.actions.id(Some(from))?] = ctx.actions.id(to.as_deref())?;
        }
        let initial_nodes = inner.initial_nodes().to_vec();
        Ok(Self {
            inner,
            relabel,
            labels: Vec::new(),
            initial_nodes,
        })
    }
}

impl<W: Weight> Component<W> for RenameExplorer<W> {
    fn initial_nodes(&self) -> &[StateVector] {
        &self.initial_nodes
    }

    fn apply_location_values(&self, node: &mut StateVector) -> ExploreResult<()> {
        self.inner.apply_location_values(node)
    }

    fn query(
        &mut self,
        node: &StateVector,
        extensions: &mut [Box<dyn ExplorerExtension<W>>],
    ) -> ExploreResult<()> {
        self.inner.query(node, extensions)?;
        self.labels.clear();
        for i in 0..self.inner.num_successors() {
            self.labels.push(self.relabel[self.inner.label(i)]);
        }
        Ok(())
    }

    #[inline]
    fn num_successors(&self) -> usize {
        self.inner.num_successors()
    }

    #[inline]
    fn successor(&self, i: usize) -> &StateVector {
        self.inner.successor(i)
    }

    #[inline]
    fn weight(&self, i: usize) -> &W {
        self.inner.weight(i)
    }

    #[inline]
    fn label(&self, i: usize) -> ActionId {
        self.labels[i]
    }

    fn is_state(&self, node: &StateVector) -> bool {
        self.inner.is_state(node)
    }

    fn is_state_query(&self) -> bool {
        self.inner.is_state_query()
    }
}
