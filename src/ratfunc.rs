//! Exact rational functions over the symbolic constants of a program.
//!
//! A symbol is either a parameter (a plain identifier such as `p`) or a
//! transcendental atom whose name is the printed form of a constant expression,
//! for instance `exp(-1/2)` or `cos(1)`. Atoms take part in arithmetic like any
//! other symbol and are only interpreted when a numeric value is requested.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{MomentError, Result};
use crate::expr::{Expr, Rational};
use crate::multipoly::MultiPoly;
use crate::parser::parse_expr;
use crate::polynomial::{CoeffOps, Poly};

type SymPoly = MultiPoly<Rational>;

#[derive(Clone, Debug)]
pub struct RatFunc {
    num: SymPoly,
    den: SymPoly,
}

impl RatFunc {
    pub fn new(num: SymPoly, den: SymPoly) -> Result<Self> {
        if den.is_zero() {
            return Err(MomentError::DivisionByZero(format!(
                "{}",
                num.to_expr_with(|c| Expr::Constant(c.clone()))
            )));
        }
        Ok(RatFunc::normalized(num, den))
    }

    pub fn from_poly(num: SymPoly) -> Self {
        RatFunc {
            num,
            den: SymPoly::one(),
        }
    }

    pub fn constant(value: Rational) -> Self {
        RatFunc::from_poly(SymPoly::constant(value))
    }

    pub fn integer(value: i64) -> Self {
        <RatFunc as CoeffOps>::from_integer(value)
    }

    pub fn ratio(num: i64, den: i64) -> Self {
        RatFunc::constant(crate::expr::rational(num, den))
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        RatFunc::from_poly(SymPoly::var(name))
    }

    /// Opaque constant standing for `expr`. Arguments that make the function
    /// trivial (`exp(0)`, `cos(0)`, `sin(0)`) collapse to their value.
    pub fn atom(expr: &Expr) -> Self {
        match expr {
            Expr::Constant(c) => RatFunc::constant(c.clone()),
            Expr::Exp(arg) | Expr::Cos(arg) if arg.is_zero() => RatFunc::one(),
            Expr::Sin(arg) if arg.is_zero() => RatFunc::zero(),
            other => RatFunc::symbol(other.to_string()),
        }
    }

    pub fn numer(&self) -> &SymPoly {
        &self.num
    }

    pub fn denom(&self) -> &SymPoly {
        &self.den
    }

    pub fn is_constant(&self) -> bool {
        self.num.is_constant() && self.den.is_constant()
    }

    pub fn as_rational(&self) -> Option<Rational> {
        if !self.is_constant() {
            return None;
        }
        Some(self.num.constant_term().div(&self.den.constant_term()))
    }

    pub fn symbols(&self) -> BTreeSet<String> {
        let mut symbols = self.num.symbols();
        symbols.extend(self.den.symbols());
        symbols
    }

    pub fn contains_symbol(&self, name: &str) -> bool {
        self.num.contains_symbol(name) || self.den.contains_symbol(name)
    }

    /// Partial derivative with respect to a parameter. Atoms are constants.
    pub fn derivative(&self, name: &str) -> Self {
        if !self.contains_symbol(name) {
            return RatFunc::zero();
        }
        let num = self
            .num
            .derivative(name)
            .mul(&self.den)
            .sub(&self.num.mul(&self.den.derivative(name)));
        RatFunc::normalized(num, self.den.mul(&self.den))
    }

    /// Substitute an exact value for a symbol.
    pub fn substitute(&self, name: &str, value: &Rational) -> Result<Self> {
        if !self.contains_symbol(name) {
            return Ok(self.clone());
        }
        let value = SymPoly::constant(value.clone());
        RatFunc::new(
            self.num.substitute(name, &value),
            self.den.substitute(name, &value),
        )
    }

    pub fn to_expr(&self) -> Expr {
        let coeff = |c: &Rational| Expr::Constant(c.clone());
        let num = self.num.to_expr_with(coeff);
        if self.den.is_one() {
            num
        } else {
            crate::expr::div(num, self.den.to_expr_with(coeff))
        }
    }

    /// Numeric value. `params` supplies parameter values; atoms are evaluated
    /// from their own expression.
    pub fn to_f64<F>(&self, params: &F) -> Result<f64>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let lookup = |name: &str| symbol_value(name, params);
        let num = self.num.to_expr_with(|c| Expr::Constant(c.clone()));
        let den = self.den.to_expr_with(|c| Expr::Constant(c.clone()));
        let denom = den.evaluate(&lookup)?;
        if denom == 0.0 {
            return Err(MomentError::DivisionByZero(self.to_string()));
        }
        Ok(num.evaluate(&lookup)? / denom)
    }

    fn normalized(num: SymPoly, den: SymPoly) -> Self {
        if num.is_zero() {
            return RatFunc::zero();
        }
        if den.is_constant() {
            let inverse = Rational::one().div(&den.constant_term());
            return RatFunc::from_poly(num.scale(&inverse));
        }
        if let Some(quotient) = num.div_exact(&den) {
            return RatFunc::from_poly(quotient);
        }

        let (mut num, mut den) = match den.div_exact(&num) {
            Some(quotient) => (SymPoly::one(), quotient),
            None => (num, den),
        };

        let shared = num.monomial_content().gcd(&den.monomial_content());
        if !shared.is_one() {
            num = num.div_monomial(&shared);
            den = den.div_monomial(&shared);
        }

        if let Some((reduced_num, reduced_den)) = cancel_univariate(&num, &den) {
            num = reduced_num;
            den = reduced_den;
        }

        match den.leading_term().map(|(_, c)| c.clone()) {
            Some(lead) if !lead.is_one() => {
                let inverse = Rational::one().div(&lead);
                RatFunc {
                    num: num.scale(&inverse),
                    den: den.scale(&inverse),
                }
            }
            _ if den.is_constant() => RatFunc::normalized(num, den),
            _ => RatFunc { num, den },
        }
    }
}

/// Cancel the polynomial gcd when numerator and denominator share a single symbol.
fn cancel_univariate(num: &SymPoly, den: &SymPoly) -> Option<(SymPoly, SymPoly)> {
    let mut symbols = num.symbols();
    symbols.extend(den.symbols());
    if symbols.len() != 1 {
        return None;
    }
    let name = symbols.into_iter().next()?;
    let p = num.as_univariate(&name)?;
    let q = den.as_univariate(&name)?;
    let gcd = Poly::gcd(&p, &q);
    if gcd.degree().unwrap_or(0) == 0 {
        return None;
    }
    Some((
        SymPoly::from_univariate(&p.div_exact(&gcd)?, &name),
        SymPoly::from_univariate(&q.div_exact(&gcd)?, &name),
    ))
}

pub fn is_atom(name: &str) -> bool {
    name.contains('(')
}

fn symbol_value<F>(name: &str, params: &F) -> Option<f64>
where
    F: Fn(&str) -> Option<f64>,
{
    if let Some(value) = params(name) {
        return Some(value);
    }
    if !is_atom(name) {
        return None;
    }
    let expr = parse_expr(name).ok()?;
    expr.evaluate(&|inner: &str| symbol_value(inner, params)).ok()
}

impl CoeffOps for RatFunc {
    fn zero() -> Self {
        RatFunc::from_poly(SymPoly::zero())
    }

    fn one() -> Self {
        RatFunc::from_poly(SymPoly::one())
    }

    fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    fn is_one(&self) -> bool {
        self.num == self.den
    }

    fn add(&self, other: &Self) -> Self {
        if self.den == other.den {
            return RatFunc::normalized(self.num.add(&other.num), self.den.clone());
        }
        RatFunc::normalized(
            self.num.mul(&other.den).add(&other.num.mul(&self.den)),
            self.den.mul(&other.den),
        )
    }

    fn sub(&self, other: &Self) -> Self {
        self.add(&other.neg())
    }

    fn mul(&self, other: &Self) -> Self {
        if self.is_zero() || other.is_zero() {
            return RatFunc::zero();
        }
        RatFunc::normalized(self.num.mul(&other.num), self.den.mul(&other.den))
    }

    fn neg(&self) -> Self {
        RatFunc {
            num: self.num.neg(),
            den: self.den.clone(),
        }
    }

    fn div(&self, other: &Self) -> Self {
        debug_assert!(!other.is_zero(), "division of {self} by zero");
        RatFunc::normalized(self.num.mul(&other.den), self.den.mul(&other.num))
    }

    fn from_rational(value: &Rational) -> Self {
        RatFunc::constant(value.clone())
    }

    fn pivot_weight(&self) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        match self.as_rational() {
            Some(value) => crate::expr::rational_to_f64(&value).abs(),
            None => 1.0,
        }
    }

    fn equals(&self, other: &Self) -> bool {
        self.num.mul(&other.den) == other.num.mul(&self.den)
    }
}

impl PartialEq for RatFunc {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl From<Rational> for RatFunc {
    fn from(value: Rational) -> Self {
        RatFunc::constant(value)
    }
}

impl fmt::Display for RatFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_expr())
    }
}
