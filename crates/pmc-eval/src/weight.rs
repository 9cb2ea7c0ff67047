//! Transition weight arithmetic.
//!
//! The explorer is generic over the number type of probabilities and rates.
//! Floating point is the default; exact rationals and intervals are available
//! for analyses that need them.

use crate::eval::{type_mismatch, EvalError, EvalResult};
use crate::value::Value;
use num_bigint::BigInt;
use num_rational::{BigRational, Ratio};
use num_traits::{Signed, ToPrimitive, Zero};
use std::fmt;

/// Number type of transition weights.
pub trait Weight: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    fn zero() -> Self;
    fn one() -> Self;
    /// Convert an evaluated probability or rate.
    fn from_value(value: Value) -> EvalResult<Self>;
    fn add(&self, other: &Self) -> Self;
    fn multiply(&self, other: &Self) -> Self;
    fn is_zero(&self) -> bool;
    fn is_ge_zero(&self) -> bool;
    /// Approximate value, for diagnostics.
    fn to_f64(&self) -> f64;
}

fn finite_number(value: Value) -> EvalResult<f64> {
    let x = value
        .as_f64()
        .ok_or_else(|| type_mismatch("Int or Real", &value))?;
    if !x.is_finite() {
        return Err(EvalError::NotFinite(x));
    }
    Ok(x)
}

impl Weight for f64 {
    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn one() -> Self {
        1.0
    }

    fn from_value(value: Value) -> EvalResult<Self> {
        finite_number(value)
    }

    #[inline]
    fn add(&self, other: &Self) -> Self {
        self + other
    }

    #[inline]
    fn multiply(&self, other: &Self) -> Self {
        self * other
    }

    #[inline]
    fn is_zero(&self) -> bool {
        *self == 0.0
    }

    #[inline]
    fn is_ge_zero(&self) -> bool {
        *self >= 0.0
    }

    fn to_f64(&self) -> f64 {
        *self
    }
}

impl Weight for BigRational {
    fn zero() -> Self {
        Zero::zero()
    }

    fn one() -> Self {
        num_traits::One::one()
    }

    /// Reals are converted to the simplest nearby fraction, so `0.1` becomes
    /// exactly `1/10`.
    ///
    /// Expressions are evaluated in `f64` before this conversion, so the
    /// result is only exact when the intended fraction is the simplest one
    /// within double precision of the computed float. Values that need more
    /// than an `i64` numerator or denominator fall back to the float's exact
    /// binary expansion.
    fn from_value(value: Value) -> EvalResult<Self> {
        match value {
            Value::Int(n) => Ok(BigRational::from_integer(BigInt::from(n))),
            Value::Real(r) => {
                let r = finite_number(Value::Real(r))?;
                if let Some(small) = Ratio::<i64>::approximate_float(r) {
                    return Ok(BigRational::new(
                        BigInt::from(*small.numer()),
                        BigInt::from(*small.denom()),
                    ));
                }
                BigRational::from_float(r).ok_or(EvalError::NotFinite(r))
            }
            Value::Bool(_) => Err(type_mismatch("Int or Real", &value)),
        }
    }

    fn add(&self, other: &Self) -> Self {
        self + other
    }

    fn multiply(&self, other: &Self) -> Self {
        self * other
    }

    fn is_zero(&self) -> bool {
        Zero::is_zero(self)
    }

    fn is_ge_zero(&self) -> bool {
        !self.is_negative()
    }

    fn to_f64(&self) -> f64 {
        ToPrimitive::to_f64(self).unwrap_or(f64::NAN)
    }
}

/// A closed interval of reals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    pub fn new(lo: f64, hi: f64) -> Self {
        debug_assert!(lo <= hi);
        Self { lo, hi }
    }

    pub fn point(x: f64) -> Self {
        Self { lo: x, hi: x }
    }

    pub fn contains(&self, x: f64) -> bool {
        self.lo <= x && x <= self.hi
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lo, self.hi)
    }
}

impl Weight for Interval {
    fn zero() -> Self {
        Interval::point(0.0)
    }

    fn one() -> Self {
        Interval::point(1.0)
    }

    fn from_value(value: Value) -> EvalResult<Self> {
        finite_number(value).map(Interval::point)
    }

    fn add(&self, other: &Self) -> Self {
        Interval {
            lo: self.lo + other.lo,
            hi: self.hi + other.hi,
        }
    }

    fn multiply(&self, other: &Self) -> Self {
        let products = [
            self.lo * other.lo,
            self.lo * other.hi,
            self.hi * other.lo,
            self.hi * other.hi,
        ];
        Interval {
            lo: products.iter().copied().fold(f64::INFINITY, f64::min),
            hi: products.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }

    fn is_zero(&self) -> bool {
        self.lo == 0.0 && self.hi == 0.0
    }

    fn is_ge_zero(&self) -> bool {
        self.lo >= 0.0
    }

    fn to_f64(&self) -> f64 {
        (self.lo + self.hi) / 2.0
    }
}
