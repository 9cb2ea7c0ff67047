//! Keys for the graph, node and edge properties the explorer reports.

use crate::actions::ActionId;
use pmc_eval::Value;
use pmc_model::{Expr, ModelType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphProperty {
    /// Semantic type of the model.
    Semantics,
}

/// Properties of the last queried node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeProperty {
    /// Whether the node is a state rather than a pending choice.
    State,
    /// Whether the node is one of the initial nodes.
    Initial,
    /// Value of a variable. Globals go by their name, automaton slots by
    /// their qualified name such as `a[0].x`.
    Variable(String),
    /// Whether the query produced no successors before deadlock fixing.
    Deadlock,
    /// An expression over the global variables and constants, such as an
    /// atomic proposition or a state reward. Compiled on first use.
    Expression(Expr),
}

/// Properties of one successor of the last query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeProperty {
    Weight,
    Label,
    /// Value a transient variable takes on this edge.
    Transient(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue<W> {
    Semantics(ModelType),
    Bool(bool),
    Value(Value),
    Weight(W),
    Label(ActionId),
}
