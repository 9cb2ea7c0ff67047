//! Observer hooks around queries, and the probability-sum validator.

use crate::component::{AutomatonExplorer, Component};
use crate::state::StateVector;
use pmc_eval::Weight;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

/// Hooks invoked by the explorer. Every method defaults to a no-op.
///
/// Extensions are passed down the query path explicitly; a leaf automaton
/// calls [`after_query_automaton`](ExplorerExtension::after_query_automaton)
/// on every installed extension once its successors are complete.
pub trait ExplorerExtension<W: Weight> {
    fn before_query(&mut self, _node: &StateVector) {}

    fn after_query(&mut self, _node: &StateVector) {}

    /// A query produced no successors and the deadlock was fixed.
    fn handle_no_successors(&mut self, _node: &StateVector) {}

    /// A pending self-loop was resolved.
    fn handle_self_loop(&mut self, _node: &StateVector) {}

    fn after_query_automaton(&mut self, _automaton: &AutomatonExplorer<W>) {}
}

/// A fired edge whose destination probabilities do not sum to one.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityDeviation {
    pub automaton: String,
    pub instance: usize,
    pub location: usize,
    pub edge: usize,
    pub sum: f64,
}

/// Findings of a [`ProbabilitySumCheck`], shared with the caller.
#[derive(Debug, Default)]
pub struct ProbabilitySumReport {
    checked: AtomicUsize,
    deviations: Mutex<Vec<ProbabilityDeviation>>,
}

impl ProbabilitySumReport {
    /// Number of edge distributions checked so far.
    pub fn checked(&self) -> usize {
        self.checked.load(Ordering::Relaxed)
    }

    pub fn deviations(&self) -> Vec<ProbabilityDeviation> {
        self.deviations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_ok(&self) -> bool {
        self.deviations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

/// Checks that every fired edge's destination probabilities sum to one.
///
/// Deviations are logged and recorded, never raised. Edge choices of the
/// two-layer encoding carry no distribution and are not checked.
#[derive(Debug)]
pub struct ProbabilitySumCheck {
    tolerance: f64,
    report: Arc<ProbabilitySumReport>,
}

impl ProbabilitySumCheck {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            report: Arc::new(ProbabilitySumReport::default()),
        }
    }

    pub fn report(&self) -> Arc<ProbabilitySumReport> {
        Arc::clone(&self.report)
    }
}

impl<W: Weight> ExplorerExtension<W> for ProbabilitySumCheck {
    fn after_query_automaton(&mut self, automaton: &AutomatonExplorer<W>) {
        if automaton.is_two_layer() && automaton.is_state_query() {
            return;
        }
        for entry in automaton.last_edge_probability_sums() {
            self.report.checked.fetch_add(1, Ordering::Relaxed);
            let sum = entry.sum.to_f64();
            if (sum - 1.0).abs() <= self.tolerance {
                continue;
            }
            warn!(
                automaton = %automaton.name(),
                instance = automaton.instance(),
                location = entry.location,
                edge = entry.edge,
                sum,
                "destination probabilities do not sum to one"
            );
            self.report
                .deviations
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(ProbabilityDeviation {
                    automaton: automaton.name().to_string(),
                    instance: automaton.instance(),
                    location: entry.location,
                    edge: entry.edge,
                    sum,
                });
        }
    }
}
