//! Model expression to slot-indexed IR compiler.

use crate::eval::{apply_binary, apply_unary, expect_bool, EvalError, EvalResult};
use crate::ir::CompiledExpr;
use crate::value::Value;
use pmc_model::{BinOp, Constant, Expr};
use std::collections::HashMap;

/// Constant values of a model, evaluated once in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Constants {
    values: HashMap<String, Value>,
}

impl Constants {
    /// Evaluate all constants. A constant may refer to earlier ones; an
    /// undefined constant is an error.
    pub fn evaluate(constants: &[Constant]) -> EvalResult<Self> {
        let mut out = Constants::default();
        for c in constants {
            let expr = c
                .value
                .as_ref()
                .ok_or_else(|| EvalError::UndefinedConstant(c.name.clone()))?;
            let compiled = compile(expr, &out, &no_slots)?;
            let value = match compiled {
                CompiledExpr::Lit(v) => v,
                _ => return Err(EvalError::UnresolvedIdentifier(c.name.clone())),
            };
            out.values.insert(c.name.clone(), value);
        }
        Ok(out)
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).copied()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn no_slots(_: &str) -> Option<usize> {
    None
}

/// Compile an expression. `resolve` maps variable names to slots and is
/// consulted before constants, so a variable shadows a constant of the same
/// name. The result is simplified.
pub fn compile(
    expr: &Expr,
    constants: &Constants,
    resolve: &dyn Fn(&str) -> Option<usize>,
) -> EvalResult<CompiledExpr> {
    let compiled = compile_expr(expr, constants, resolve)?;
    simplify(compiled)
}

fn compile_expr(
    expr: &Expr,
    constants: &Constants,
    resolve: &dyn Fn(&str) -> Option<usize>,
) -> EvalResult<CompiledExpr> {
    let compiled = match expr {
        Expr::Bool(b) => CompiledExpr::Lit(Value::bool(*b)),
        Expr::Int(n) => CompiledExpr::Lit(Value::int(*n)),
        Expr::Real(r) => CompiledExpr::Lit(Value::real(*r)),
        Expr::Ident(name) => {
            if let Some(slot) = resolve(name) {
                CompiledExpr::Var(slot)
            } else if let Some(v) = constants.get(name) {
                CompiledExpr::Lit(v)
            } else {
                return Err(EvalError::UnresolvedIdentifier(name.clone()));
            }
        }
        Expr::Unary { op, operand } => CompiledExpr::Unary {
            op: *op,
            operand: Box::new(compile_expr(operand, constants, resolve)?),
        },
        Expr::Binary { op, left, right } => CompiledExpr::binary(
            *op,
            compile_expr(left, constants, resolve)?,
            compile_expr(right, constants, resolve)?,
        ),
        Expr::Ite {
            cond,
            then_branch,
            else_branch,
        } => CompiledExpr::Ite {
            cond: Box::new(compile_expr(cond, constants, resolve)?),
            then_branch: Box::new(compile_expr(then_branch, constants, resolve)?),
            else_branch: Box::new(compile_expr(else_branch, constants, resolve)?),
        },
    };
    Ok(compiled)
}

/// Fold closed subtrees and apply boolean identities.
///
/// Folding an ill-typed closed subtree reports the evaluation error, so
/// `1 / 0` in a guard fails when the explorer is built.
pub fn simplify(expr: CompiledExpr) -> EvalResult<CompiledExpr> {
    match expr {
        CompiledExpr::Lit(_) | CompiledExpr::Var(_) => Ok(expr),

        CompiledExpr::Unary { op, operand } => {
            let operand = simplify(*operand)?;
            match operand {
                CompiledExpr::Lit(v) => Ok(CompiledExpr::Lit(apply_unary(op, v)?)),
                operand => Ok(CompiledExpr::Unary {
                    op,
                    operand: Box::new(operand),
                }),
            }
        }

        CompiledExpr::Binary { op, left, right } => {
            let left = simplify(*left)?;
            let right = simplify(*right)?;
            match (op, &left, &right) {
                (_, CompiledExpr::Lit(a), CompiledExpr::Lit(b)) => {
                    Ok(CompiledExpr::Lit(apply_binary(op, *a, *b)?))
                }
                (BinOp::And, CompiledExpr::Lit(v), _) => {
                    if expect_bool(v)? {
                        Ok(right)
                    } else {
                        Ok(CompiledExpr::FALSE)
                    }
                }
                (BinOp::And, _, CompiledExpr::Lit(v)) => {
                    if expect_bool(v)? {
                        Ok(left)
                    } else {
                        Ok(CompiledExpr::binary(BinOp::And, left, right))
                    }
                }
                (BinOp::Or, CompiledExpr::Lit(v), _) => {
                    if expect_bool(v)? {
                        Ok(CompiledExpr::TRUE)
                    } else {
                        Ok(right)
                    }
                }
                (BinOp::Or, _, CompiledExpr::Lit(v)) => {
                    if expect_bool(v)? {
                        Ok(CompiledExpr::binary(BinOp::Or, left, right))
                    } else {
                        Ok(left)
                    }
                }
                (BinOp::Implies, CompiledExpr::Lit(v), _) => {
                    if expect_bool(v)? {
                        Ok(right)
                    } else {
                        Ok(CompiledExpr::TRUE)
                    }
                }
                _ => Ok(CompiledExpr::binary(op, left, right)),
            }
        }

        CompiledExpr::Ite {
            cond,
            then_branch,
            else_branch,
        } => {
            let cond = simplify(*cond)?;
            if let CompiledExpr::Lit(v) = &cond {
                return if expect_bool(v)? {
                    simplify(*then_branch)
                } else {
                    simplify(*else_branch)
                };
            }
            Ok(CompiledExpr::Ite {
                cond: Box::new(cond),
                then_branch: Box::new(simplify(*then_branch)?),
                else_branch: Box::new(simplify(*else_branch)?),
            })
        }
    }
}
