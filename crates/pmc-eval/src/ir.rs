//! Slot-indexed compiled expressions.

use crate::value::Value;
use pmc_model::{BinOp, UnaryOp};

/// A compiled expression. Variables are referenced by slot index into the
/// value slice the expression is evaluated against.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledExpr {
    /// Literal (including substituted constants).
    Lit(Value),
    /// Slot reference.
    Var(usize),
    Unary {
        op: UnaryOp,
        operand: Box<CompiledExpr>,
    },
    Binary {
        op: BinOp,
        left: Box<CompiledExpr>,
        right: Box<CompiledExpr>,
    },
    Ite {
        cond: Box<CompiledExpr>,
        then_branch: Box<CompiledExpr>,
        else_branch: Box<CompiledExpr>,
    },
}

impl CompiledExpr {
    pub const TRUE: CompiledExpr = CompiledExpr::Lit(Value::Bool(true));
    pub const FALSE: CompiledExpr = CompiledExpr::Lit(Value::Bool(false));

    pub fn binary(op: BinOp, left: CompiledExpr, right: CompiledExpr) -> Self {
        CompiledExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            CompiledExpr::Lit(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, CompiledExpr::Lit(Value::Bool(true)))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, CompiledExpr::Lit(Value::Bool(false)))
    }

    /// Whether the expression reads no slot.
    pub fn is_closed(&self) -> bool {
        match self {
            CompiledExpr::Lit(_) => true,
            CompiledExpr::Var(_) => false,
            CompiledExpr::Unary { operand, .. } => operand.is_closed(),
            CompiledExpr::Binary { left, right, .. } => left.is_closed() && right.is_closed(),
            CompiledExpr::Ite {
                cond,
                then_branch,
                else_branch,
            } => cond.is_closed() && then_branch.is_closed() && else_branch.is_closed(),
        }
    }

    /// Collect the slots read by this expression.
    pub fn collect_vars(&self, out: &mut Vec<usize>) {
        match self {
            CompiledExpr::Lit(_) => {}
            CompiledExpr::Var(idx) => {
                if !out.contains(idx) {
                    out.push(*idx);
                }
            }
            CompiledExpr::Unary { operand, .. } => operand.collect_vars(out),
            CompiledExpr::Binary { left, right, .. } => {
                left.collect_vars(out);
                right.collect_vars(out);
            }
            CompiledExpr::Ite {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.collect_vars(out);
                then_branch.collect_vars(out);
                else_branch.collect_vars(out);
            }
        }
    }

    /// Replace every read of `slot` by `value`. The result is not simplified.
    pub fn substitute(&self, slot: usize, value: Value) -> CompiledExpr {
        match self {
            CompiledExpr::Var(idx) if *idx == slot => CompiledExpr::Lit(value),
            CompiledExpr::Lit(_) | CompiledExpr::Var(_) => self.clone(),
            CompiledExpr::Unary { op, operand } => CompiledExpr::Unary {
                op: *op,
                operand: Box::new(operand.substitute(slot, value)),
            },
            CompiledExpr::Binary { op, left, right } => CompiledExpr::binary(
                *op,
                left.substitute(slot, value),
                right.substitute(slot, value),
            ),
            CompiledExpr::Ite {
                cond,
                then_branch,
                else_branch,
            } => CompiledExpr::Ite {
                cond: Box::new(cond.substitute(slot, value)),
                then_branch: Box::new(then_branch.substitute(slot, value)),
                else_branch: Box::new(else_branch.substitute(slot, value)),
            },
        }
    }

    /// If this is `var == e` or `e == var`, return the slot and `e`.
    pub fn as_var_equality(&self) -> Option<(usize, &CompiledExpr)> {
        match self {
            CompiledExpr::Binary {
                op: BinOp::Eq,
                left,
                right,
            } => match (left.as_ref(), right.as_ref()) {
                (CompiledExpr::Var(idx), other) | (other, CompiledExpr::Var(idx)) => {
                    Some((*idx, other))
                }
                _ => None,
            },
            _ => None,
        }
    }
}

/// Split nested conjunctions into their conjuncts.
pub fn decompose_conjuncts(expr: &CompiledExpr) -> Vec<&CompiledExpr> {
    let mut out = Vec::new();
    let mut stack = vec![expr];
    while let Some(e) = stack.pop() {
        match e {
            CompiledExpr::Binary {
                op: BinOp::And,
                left,
                right,
            } => {
                stack.push(right);
                stack.push(left);
            }
            other => out.push(other),
        }
    }
    out
}
