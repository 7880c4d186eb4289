//! Expression tree used for textual input, rendering of closed forms, and the
//! numeric value of transcendental atoms.

use std::fmt;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, ToPrimitive, Zero};

use crate::error::{MomentError, Result};

pub type Rational = BigRational;

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Expr {
    Variable(String),
    Constant(Rational),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Sin(Box<Expr>),
    Cos(Box<Expr>),
    Exp(Box<Expr>),
    Log(Box<Expr>),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }

    pub fn integer(value: impl Into<BigInt>) -> Self {
        Expr::Constant(Rational::from_integer(value.into()))
    }

    pub fn rational(value: Rational) -> Self {
        Expr::Constant(value)
    }

    pub fn negate(self) -> Self {
        match self {
            Expr::Constant(r) => Expr::Constant(-r),
            Expr::Neg(inner) => *inner,
            other => Expr::Neg(Box::new(other)),
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Constant(r) if r.is_zero())
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Expr::Constant(r) if r.is_one())
    }

    pub fn as_variable(&self) -> Option<&str> {
        if let Expr::Variable(name) = self {
            Some(name)
        } else {
            None
        }
    }

    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }

    /// Evaluate numerically. `lookup` supplies values for variables; any
    /// variable it does not know is reported as unbound.
    pub fn evaluate<F>(&self, lookup: &F) -> Result<f64>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let value = match self {
            Expr::Variable(name) => {
                lookup(name).ok_or_else(|| MomentError::Unbound(name.clone()))?
            }
            Expr::Constant(r) => rational_to_f64(r),
            Expr::Add(a, b) => a.evaluate(lookup)? + b.evaluate(lookup)?,
            Expr::Sub(a, b) => a.evaluate(lookup)? - b.evaluate(lookup)?,
            Expr::Mul(a, b) => a.evaluate(lookup)? * b.evaluate(lookup)?,
            Expr::Div(a, b) => {
                let denom = b.evaluate(lookup)?;
                if denom == 0.0 {
                    return Err(MomentError::DivisionByZero(self.to_string()));
                }
                a.evaluate(lookup)? / denom
            }
            Expr::Pow(a, b) => a.evaluate(lookup)?.powf(b.evaluate(lookup)?),
            Expr::Neg(a) => -a.evaluate(lookup)?,
            Expr::Sin(a) => a.evaluate(lookup)?.sin(),
            Expr::Cos(a) => a.evaluate(lookup)?.cos(),
            Expr::Exp(a) => a.evaluate(lookup)?.exp(),
            Expr::Log(a) => a.evaluate(lookup)?.ln(),
        };
        Ok(value)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::format::pretty(self))
    }
}

pub fn rational_to_f64(r: &Rational) -> f64 {
    r.to_f64().unwrap_or(f64::NAN)
}

pub fn zero() -> Expr {
    Expr::Constant(Rational::zero())
}

pub fn one() -> Expr {
    Expr::Constant(Rational::one())
}

pub fn rational(num: i64, den: i64) -> Rational {
    Rational::new(num.into(), den.into())
}

pub fn pow(base: Expr, exp: Expr) -> Expr {
    Expr::Pow(base.boxed(), exp.boxed())
}

pub fn add(a: Expr, b: Expr) -> Expr {
    Expr::Add(a.boxed(), b.boxed())
}

pub fn mul(a: Expr, b: Expr) -> Expr {
    Expr::Mul(a.boxed(), b.boxed())
}

pub fn div(a: Expr, b: Expr) -> Expr {
    Expr::Div(a.boxed(), b.boxed())
}
