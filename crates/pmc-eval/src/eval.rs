//! Expression evaluator.

use crate::ir::CompiledExpr;
use crate::value::Value;
use pmc_model::{BinOp, UnaryOp};
use thiserror::Error;

/// Evaluation error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,

    #[error("undefined variable at slot {0}")]
    UndefinedVariable(usize),

    #[error("unresolved identifier '{0}'")]
    UnresolvedIdentifier(String),

    #[error("constant '{0}' has no value")]
    UndefinedConstant(String),

    #[error("value {0} is not a finite number")]
    NotFinite(f64),
}

pub type EvalResult<T> = Result<T, EvalError>;

/// Evaluate a compiled expression against slot values.
pub fn eval(expr: &CompiledExpr, vars: &[Value]) -> EvalResult<Value> {
    match expr {
        CompiledExpr::Lit(v) => Ok(*v),

        CompiledExpr::Var(idx) => vars
            .get(*idx)
            .copied()
            .ok_or(EvalError::UndefinedVariable(*idx)),

        CompiledExpr::Unary { op, operand } => apply_unary(*op, eval(operand, vars)?),

        CompiledExpr::Binary { op, left, right } => {
            // Short-circuit evaluation for logical operators
            match op {
                BinOp::And => {
                    if !expect_bool(&eval(left, vars)?)? {
                        return Ok(Value::bool(false));
                    }
                    return Ok(Value::bool(expect_bool(&eval(right, vars)?)?));
                }
                BinOp::Or => {
                    if expect_bool(&eval(left, vars)?)? {
                        return Ok(Value::bool(true));
                    }
                    return Ok(Value::bool(expect_bool(&eval(right, vars)?)?));
                }
                BinOp::Implies => {
                    if !expect_bool(&eval(left, vars)?)? {
                        return Ok(Value::bool(true));
                    }
                    return Ok(Value::bool(expect_bool(&eval(right, vars)?)?));
                }
                _ => {}
            }
            apply_binary(*op, eval(left, vars)?, eval(right, vars)?)
        }

        CompiledExpr::Ite {
            cond,
            then_branch,
            else_branch,
        } => {
            if expect_bool(&eval(cond, vars)?)? {
                eval(then_branch, vars)
            } else {
                eval(else_branch, vars)
            }
        }
    }
}

/// Evaluate an expression that must produce a boolean.
pub fn eval_bool(expr: &CompiledExpr, vars: &[Value]) -> EvalResult<bool> {
    expect_bool(&eval(expr, vars)?)
}

/// Three-valued evaluation over a partial assignment.
///
/// Returns `Ok(None)` when the result depends on an unassigned slot. Logical
/// operators short-circuit on whichever side is known.
pub fn eval_partial(expr: &CompiledExpr, vars: &[Option<Value>]) -> EvalResult<Option<Value>> {
    match expr {
        CompiledExpr::Lit(v) => Ok(Some(*v)),

        CompiledExpr::Var(idx) => match vars.get(*idx) {
            Some(v) => Ok(*v),
            None => Err(EvalError::UndefinedVariable(*idx)),
        },

        CompiledExpr::Unary { op, operand } => match eval_partial(operand, vars)? {
            Some(v) => apply_unary(*op, v).map(Some),
            None => Ok(None),
        },

        CompiledExpr::Binary { op, left, right } => {
            let l = eval_partial(left, vars)?;
            let r = eval_partial(right, vars)?;
            let lb = l.as_ref().map(expect_bool).transpose();
            let rb = r.as_ref().map(expect_bool).transpose();
            match op {
                BinOp::And => match (lb?, rb?) {
                    (Some(false), _) | (_, Some(false)) => Ok(Some(Value::bool(false))),
                    (Some(true), Some(true)) => Ok(Some(Value::bool(true))),
                    _ => Ok(None),
                },
                BinOp::Or => match (lb?, rb?) {
                    (Some(true), _) | (_, Some(true)) => Ok(Some(Value::bool(true))),
                    (Some(false), Some(false)) => Ok(Some(Value::bool(false))),
                    _ => Ok(None),
                },
                BinOp::Implies => match (lb?, rb?) {
                    (Some(false), _) | (_, Some(true)) => Ok(Some(Value::bool(true))),
                    (Some(true), Some(false)) => Ok(Some(Value::bool(false))),
                    _ => Ok(None),
                },
                _ => match (l, r) {
                    (Some(a), Some(b)) => apply_binary(*op, a, b).map(Some),
                    _ => Ok(None),
                },
            }
        }

        CompiledExpr::Ite {
            cond,
            then_branch,
            else_branch,
        } => match eval_partial(cond, vars)? {
            Some(c) => {
                if expect_bool(&c)? {
                    eval_partial(then_branch, vars)
                } else {
                    eval_partial(else_branch, vars)
                }
            }
            None => {
                let t = eval_partial(then_branch, vars)?;
                let e = eval_partial(else_branch, vars)?;
                match (t, e) {
                    (Some(a), Some(b)) if a == b => Ok(Some(a)),
                    _ => Ok(None),
                }
            }
        },
    }
}

pub(crate) fn apply_unary(op: UnaryOp, v: Value) -> EvalResult<Value> {
    match op {
        UnaryOp::Not => Ok(Value::bool(!expect_bool(&v)?)),
        UnaryOp::Neg => match v {
            Value::Int(n) => n.checked_neg().map(Value::int).ok_or(EvalError::Overflow),
            Value::Real(r) => Ok(Value::real(-r)),
            Value::Bool(_) => Err(type_mismatch("Int or Real", &v)),
        },
        UnaryOp::Abs => match v {
            Value::Int(n) => n.checked_abs().map(Value::int).ok_or(EvalError::Overflow),
            Value::Real(r) => Ok(Value::real(r.abs())),
            Value::Bool(_) => Err(type_mismatch("Int or Real", &v)),
        },
        UnaryOp::Floor => match v {
            Value::Int(_) => Ok(v),
            Value::Real(r) => real_to_int(r.floor()),
            Value::Bool(_) => Err(type_mismatch("Int or Real", &v)),
        },
        UnaryOp::Ceil => match v {
            Value::Int(_) => Ok(v),
            Value::Real(r) => real_to_int(r.ceil()),
            Value::Bool(_) => Err(type_mismatch("Int or Real", &v)),
        },
    }
}

pub(crate) fn apply_binary(op: BinOp, a: Value, b: Value) -> EvalResult<Value> {
    match op {
        BinOp::And => Ok(Value::bool(expect_bool(&a)? && expect_bool(&b)?)),
        BinOp::Or => Ok(Value::bool(expect_bool(&a)? || expect_bool(&b)?)),
        BinOp::Implies => Ok(Value::bool(!expect_bool(&a)? || expect_bool(&b)?)),
        BinOp::Iff => Ok(Value::bool(expect_bool(&a)? == expect_bool(&b)?)),

        BinOp::Eq => values_equal(&a, &b).map(Value::bool),
        BinOp::Ne => values_equal(&a, &b).map(|eq| Value::bool(!eq)),

        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ord = match (a, b) {
                (Value::Int(x), Value::Int(y)) => x.cmp(&y),
                _ => {
                    let x = expect_num(&a)?;
                    let y = expect_num(&b)?;
                    match x.partial_cmp(&y) {
                        Some(o) => o,
                        None => return Ok(Value::bool(false)),
                    }
                }
            };
            Ok(Value::bool(match op {
                BinOp::Lt => ord.is_lt(),
                BinOp::Le => ord.is_le(),
                BinOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            }))
        }

        BinOp::Add => int_or_real(a, b, i64::checked_add, |x, y| x + y),
        BinOp::Sub => int_or_real(a, b, i64::checked_sub, |x, y| x - y),
        BinOp::Mul => int_or_real(a, b, i64::checked_mul, |x, y| x * y),
        BinOp::Min => int_or_real(a, b, |x, y| Some(x.min(y)), f64::min),
        BinOp::Max => int_or_real(a, b, |x, y| Some(x.max(y)), f64::max),

        BinOp::Div => {
            let x = expect_num(&a)?;
            let y = expect_num(&b)?;
            if y == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::real(x / y))
        }
        BinOp::IntDiv => {
            let x = expect_int(&a)?;
            let y = expect_int(&b)?;
            if y == 0 {
                return Err(EvalError::DivisionByZero);
            }
            x.checked_div_euclid(y)
                .map(Value::int)
                .ok_or(EvalError::Overflow)
        }
        BinOp::Mod => {
            let x = expect_int(&a)?;
            let y = expect_int(&b)?;
            if y == 0 {
                return Err(EvalError::DivisionByZero);
            }
            x.checked_rem_euclid(y)
                .map(Value::int)
                .ok_or(EvalError::Overflow)
        }
        BinOp::Pow => match (a, b) {
            (Value::Int(x), Value::Int(y)) if y >= 0 => {
                let exp = u32::try_from(y).map_err(|_| EvalError::Overflow)?;
                x.checked_pow(exp).map(Value::int).ok_or(EvalError::Overflow)
            }
            _ => Ok(Value::real(expect_num(&a)?.powf(expect_num(&b)?))),
        },
    }
}

fn values_equal(a: &Value, b: &Value) -> EvalResult<bool> {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::Int(x), Value::Int(y)) => Ok(x == y),
        (Value::Bool(_), _) => Err(type_mismatch("Bool", b)),
        (_, Value::Bool(_)) => Err(type_mismatch("Int or Real", b)),
        _ => Ok(expect_num(a)? == expect_num(b)?),
    }
}

fn int_or_real(
    a: Value,
    b: Value,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    real_op: impl Fn(f64, f64) -> f64,
) -> EvalResult<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => int_op(x, y).map(Value::int).ok_or(EvalError::Overflow),
        _ => Ok(Value::real(real_op(expect_num(&a)?, expect_num(&b)?))),
    }
}

fn real_to_int(r: f64) -> EvalResult<Value> {
    if !r.is_finite() || r < i64::MIN as f64 || r > i64::MAX as f64 {
        return Err(EvalError::NotFinite(r));
    }
    Ok(Value::int(r as i64))
}

#[inline(always)]
pub fn expect_bool(val: &Value) -> EvalResult<bool> {
    val.as_bool().ok_or_else(|| type_mismatch("Bool", val))
}

#[inline(always)]
pub fn expect_int(val: &Value) -> EvalResult<i64> {
    val.as_int().ok_or_else(|| type_mismatch("Int", val))
}

#[inline(always)]
pub fn expect_num(val: &Value) -> EvalResult<f64> {
    val.as_f64().ok_or_else(|| type_mismatch("Int or Real", val))
}

pub(crate) fn type_mismatch(expected: &'static str, actual: &Value) -> EvalError {
    EvalError::TypeMismatch {
        expected,
        actual: actual.type_name(),
    }
}

/// A compiled expression bound to the slot layout it was compiled against.
///
/// Built once per (expression, variable set) and reused for every query.
#[derive(Debug, Clone)]
pub struct Evaluator {
    expr: CompiledExpr,
}

impl Evaluator {
    pub fn new(expr: CompiledExpr) -> Self {
        Self { expr }
    }

    pub fn expr(&self) -> &CompiledExpr {
        &self.expr
    }

    #[inline]
    pub fn evaluate(&self, values: &[Value]) -> EvalResult<Value> {
        eval(&self.expr, values)
    }

    #[inline]
    pub fn evaluate_boolean(&self, values: &[Value]) -> EvalResult<bool> {
        match &self.expr {
            CompiledExpr::Lit(Value::Bool(b)) => Ok(*b),
            expr => eval_bool(expr, values),
        }
    }
}
