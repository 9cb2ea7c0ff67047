//! Model graph consumed by the explorer.

pub mod expr;
pub mod model;

pub use expr::{BinOp, Expr, UnaryOp};
pub use model::{
    Assignment, Automaton, Composition, Constant, Destination, Edge, Location, Model, ModelType,
    SyncVector, VarType, Variable,
};
