//! Expression compilation, evaluation and weight arithmetic.

pub mod compile;
pub mod eval;
pub mod ir;
pub mod value;
pub mod weight;

pub use compile::{compile, simplify, Constants};
pub use eval::{eval, eval_bool, eval_partial, EvalError, EvalResult, Evaluator};
pub use ir::{decompose_conjuncts, CompiledExpr};
pub use value::Value;
pub use weight::{Interval, Weight};
