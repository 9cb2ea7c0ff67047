//! Exploration errors.

use crate::state::StateVector;
use pmc_eval::{EvalError, Value};
use thiserror::Error;

/// Error raised while building the explorer or querying a state.
///
/// Every variant is fatal for the current query; there is no retry.
#[derive(Debug, Error)]
pub enum ExploreError {
    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("variable '{slot}' written by more than one component in the same step")]
    MultipleWrite { slot: String },

    #[error("negative probability or rate {value}")]
    NegativeWeight { value: f64 },

    #[error("value {value} out of range for variable '{slot}'")]
    OutOfRange { slot: String, value: Value },

    #[error("deadlock: no successors in state {state}")]
    Deadlock { state: StateVector },

    #[error("initial states range over unbounded variable '{variable}'")]
    UnboundedInitialVariable { variable: String },

    #[error("initial-state predicate admits infinitely many states")]
    InfinitelyManyInitialStates,

    #[error("unknown automaton '{0}'")]
    UnknownAutomaton(String),

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("unknown location '{location}' in automaton '{automaton}'")]
    UnknownLocation { automaton: String, location: String },

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("undefined constants: {0}")]
    UndefinedConstant(String),

    #[error("invalid model: {0}")]
    InvalidModel(String),
}

pub type ExploreResult<T> = Result<T, ExploreError>;

/// Map identifier resolution failures onto the model-level error.
pub(crate) fn resolution_error(err: EvalError) -> ExploreError {
    match err {
        EvalError::UnresolvedIdentifier(name) => ExploreError::UnknownVariable(name),
        EvalError::UndefinedConstant(name) => ExploreError::UndefinedConstant(name),
        other => ExploreError::Eval(other),
    }
}
