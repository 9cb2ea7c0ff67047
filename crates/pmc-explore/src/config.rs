//! Explorer configuration.

/// How initial-state predicates that have no closed-form solution are
/// enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumeratorKind {
    /// Cross product of all variable domains, filtered by the predicate.
    /// Every variable must have a finite domain.
    BruteForce,
    /// Depth-first assignment with three-valued pruning. Unbounded variables
    /// are accepted when an equality in the predicate determines them.
    #[default]
    Propagating,
}

/// Configuration for the explorer.
#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    /// Turn states without successors into self-loops instead of failing.
    pub fix_deadlocks: bool,
    /// Enumerator for initial-state predicates.
    pub initial_enumerator: EnumeratorKind,
    /// Allowed deviation of a distribution's probability sum from one.
    pub probability_tolerance: f64,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            fix_deadlocks: false,
            initial_enumerator: EnumeratorKind::Propagating,
            probability_tolerance: 1e-10,
        }
    }
}
