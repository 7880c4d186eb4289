//! Closed forms of linear recurrences: exponential polynomials in `n` with an
//! explicit prefix for the iterations where the formula does not apply yet.

use std::fmt;

use num_bigint::BigInt;
use num_complex::Complex64;
use num_traits::ToPrimitive;

use crate::error::{MomentError, Result};
use crate::expr::{Expr, Rational};
use crate::polynomial::{CoeffOps, Polynomial};
use crate::ratfunc::RatFunc;

/// Name of the iteration counter in rendered closed forms.
pub const ITERATION_VAR: &str = "n";

/// `Σ_b poly_b(n)·bⁿ` over distinct nonzero bases.
#[derive(Clone, Debug)]
pub struct ExpPoly<C> {
    terms: Vec<(C, Polynomial<C>)>,
}

impl<C: CoeffOps> PartialEq for ExpPoly<C> {
    fn eq(&self, other: &Self) -> bool {
        self.terms.len() == other.terms.len()
            && self.terms.iter().all(|(base, poly)| {
                other
                    .terms
                    .iter()
                    .any(|(b, p)| b.equals(base) && p == poly)
            })
    }
}

impl<C: CoeffOps> ExpPoly<C> {
    pub fn zero() -> Self {
        ExpPoly { terms: Vec::new() }
    }

    pub fn constant(value: C) -> Self {
        ExpPoly::term(C::one(), Polynomial::from_constant(value))
    }

    /// `poly(n)·baseⁿ`; `base` must be nonzero.
    pub fn term(base: C, poly: Polynomial<C>) -> Self {
        let mut result = ExpPoly::zero();
        result.add_term(base, poly);
        result
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&C, &Polynomial<C>)> + '_ {
        self.terms.iter().map(|(b, p)| (b, p))
    }

    pub fn add_term(&mut self, base: C, poly: Polynomial<C>) {
        if poly.is_zero() {
            return;
        }
        debug_assert!(!base.is_zero());
        if let Some(idx) = self.terms.iter().position(|(b, _)| b.equals(&base)) {
            let merged = self.terms[idx].1.clone() + poly;
            if merged.is_zero() {
                self.terms.remove(idx);
            } else {
                self.terms[idx].1 = merged;
            }
        } else {
            self.terms.push((base, poly));
        }
    }

    pub fn add(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for (base, poly) in &other.terms {
            result.add_term(base.clone(), poly.clone());
        }
        result
    }

    pub fn scale(&self, k: &C) -> Self {
        if k.is_zero() {
            return ExpPoly::zero();
        }
        ExpPoly {
            terms: self
                .terms
                .iter()
                .map(|(b, p)| (b.clone(), p.scale(k)))
                .collect(),
        }
    }

    /// `f(n + offset)`.
    pub fn shift(&self, offset: i64) -> Self {
        let mut result = ExpPoly::zero();
        for (base, poly) in &self.terms {
            let shifted = poly.shift(&C::from_integer(offset)).scale(&base.powi(offset));
            result.add_term(base.clone(), shifted);
        }
        result
    }

    pub fn evaluate(&self, n: u64) -> C {
        let point = C::from_integer(n as i64);
        self.terms.iter().fold(C::zero(), |acc, (base, poly)| {
            acc.add(&poly.evaluate(&point).mul(&base.powu(n)))
        })
    }

    pub fn map_coeffs<D: CoeffOps, F: Fn(&C) -> D>(&self, f: F) -> ExpPoly<D> {
        let mut result = ExpPoly::zero();
        for (base, poly) in &self.terms {
            result.add_term(f(base), poly.map_coeffs(&f));
        }
        result
    }

    pub fn to_expr_with<F: Fn(&C) -> Expr>(&self, coeff_expr: F) -> Expr {
        let mut parts = self.terms.iter().map(|(base, poly)| {
            let amplitude = poly.to_expr_with(ITERATION_VAR, &coeff_expr);
            if base.is_one() {
                return amplitude;
            }
            let power = crate::expr::pow(coeff_expr(base), Expr::var(ITERATION_VAR));
            if amplitude.is_one() {
                power
            } else {
                crate::expr::mul(amplitude, power)
            }
        });
        match parts.next() {
            None => crate::expr::zero(),
            Some(first) => parts.fold(first, crate::expr::add),
        }
    }
}

impl ExpPoly<RatFunc> {
    /// Partial derivative with respect to a parameter:
    /// `d/dp [q(n)·bⁿ] = (q'(n) + n·q(n)·b'/b)·bⁿ`.
    pub fn derivative(&self, name: &str) -> Self {
        let mut result = ExpPoly::zero();
        for (base, poly) in &self.terms {
            result.add_term(base.clone(), poly.map_coeffs(|c| c.derivative(name)));
            let log_derivative = base.derivative(name).div(base);
            if !log_derivative.is_zero() {
                result.add_term(
                    base.clone(),
                    poly.clone() * Polynomial::monomial(log_derivative, 1),
                );
            }
        }
        result
    }
}

/// Binomial coefficient as a field element.
fn binomial<C: CoeffOps>(n: usize, k: usize) -> C {
    let value = num_integer::binomial(BigInt::from(n), BigInt::from(k));
    C::from_rational(&Rational::from_integer(value))
}

/// `S` with `S(n + 1) - S(n) = nʲ` and `S(0) = 0`, so `Σ_{k<n} kʲ = S(n)`.
pub fn sum_powers<C: CoeffOps>(j: usize) -> Polynomial<C> {
    let mut s = vec![C::zero(); j + 2];
    s[j + 1] = C::one().div(&C::from_integer(j as i64 + 1));
    for i in (0..j).rev() {
        let tail = ((i + 2)..=(j + 1)).fold(C::zero(), |acc, l| {
            acc.add(&s[l].mul(&binomial(l, i)))
        });
        s[i + 1] = tail.neg().div(&C::from_integer(i as i64 + 1));
    }
    Polynomial::from_coeffs(s)
}

/// `G` of degree `j` with `q·G(n + 1) - G(n) = nʲ`, so that
/// `Σ_{k<n} kʲ·qᵏ = G(n)·qⁿ - G(0)`. Requires `q ≠ 1`.
pub fn sum_power_geometric<C: CoeffOps>(j: usize, q: &C) -> Polynomial<C> {
    let q_minus_one = q.sub(&C::one());
    let mut g = vec![C::zero(); j + 1];
    g[j] = C::one().div(&q_minus_one);
    for i in (0..j).rev() {
        let tail = ((i + 1)..=j).fold(C::zero(), |acc, l| acc.add(&g[l].mul(&binomial(l, i))));
        g[i] = q.mul(&tail).neg().div(&q_minus_one);
    }
    Polynomial::from_coeffs(g)
}

/// Explicit values for `n < prefix.len()`, then `formula`.
#[derive(Clone, Debug)]
pub struct ClosedForm<C> {
    prefix: Vec<C>,
    formula: ExpPoly<C>,
}

impl<C: CoeffOps> ClosedForm<C> {
    /// Prefix entries at the end that already agree with the formula are dropped.
    pub fn new(mut prefix: Vec<C>, formula: ExpPoly<C>) -> Self {
        while let Some(last) = prefix.last() {
            let n = (prefix.len() - 1) as u64;
            if !formula.evaluate(n).equals(last) {
                break;
            }
            prefix.pop();
        }
        ClosedForm { prefix, formula }
    }

    pub fn prefix(&self) -> &[C] {
        &self.prefix
    }

    pub fn formula(&self) -> &ExpPoly<C> {
        &self.formula
    }

    /// First `n` from which the formula holds.
    pub fn threshold(&self) -> usize {
        self.prefix.len()
    }

    pub fn value_at(&self, n: u64) -> C {
        match usize::try_from(n).ok().and_then(|i| self.prefix.get(i)) {
            Some(value) => value.clone(),
            None => self.formula.evaluate(n),
        }
    }

    pub fn to_expr_with<F: Fn(&C) -> Expr>(&self, coeff_expr: F) -> Expr {
        self.formula.to_expr_with(coeff_expr)
    }

    fn render<F: Fn(&C) -> Expr>(&self, coeff_expr: F) -> String {
        let formula = self.formula.to_expr_with(&coeff_expr);
        if self.prefix.is_empty() {
            return formula.to_string();
        }
        let mut cases: Vec<String> = self
            .prefix
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{} if {ITERATION_VAR} = {i}", coeff_expr(v)))
            .collect();
        cases.push(format!("{formula} if {ITERATION_VAR} >= {}", self.prefix.len()));
        format!("{{ {} }}", cases.join("; "))
    }
}

impl ClosedForm<RatFunc> {
    pub fn derivative(&self, name: &str) -> Self {
        ClosedForm::new(
            self.prefix.iter().map(|v| v.derivative(name)).collect(),
            self.formula.derivative(name),
        )
    }

    pub fn substitute(&self, name: &str, value: &Rational) -> Result<Self> {
        let prefix = self
            .prefix
            .iter()
            .map(|v| v.substitute(name, value))
            .collect::<Result<Vec<_>>>()?;
        let mut formula = ExpPoly::zero();
        for (base, poly) in &self.formula.terms {
            let mut substituted = Polynomial::zero();
            for (exp, coeff) in poly.coeff_entries() {
                substituted = substituted + Polynomial::monomial(coeff.substitute(name, value)?, exp);
            }
            let base = base.substitute(name, value)?;
            if base.is_zero() {
                continue;
            }
            formula.add_term(base, substituted);
        }
        Ok(ClosedForm::new(prefix, formula))
    }
}

/// Closed form of one monomial's expectation.
#[derive(Clone, Debug)]
pub enum Solution {
    Exact(ClosedForm<RatFunc>),
    /// Built from numerically approximated characteristic roots.
    Approximate(ClosedForm<Complex64>),
}

impl Solution {
    pub fn is_exact(&self) -> bool {
        matches!(self, Solution::Exact(_))
    }

    pub fn threshold(&self) -> usize {
        match self {
            Solution::Exact(form) => form.threshold(),
            Solution::Approximate(form) => form.threshold(),
        }
    }

    pub fn exact(&self) -> Option<&ClosedForm<RatFunc>> {
        match self {
            Solution::Exact(form) => Some(form),
            Solution::Approximate(_) => None,
        }
    }

    /// Numeric value at iteration `n`; `params` supplies parameter values.
    pub fn evaluate<F>(&self, n: u64, params: &F) -> Result<f64>
    where
        F: Fn(&str) -> Option<f64>,
    {
        match self {
            Solution::Exact(form) => form.value_at(n).to_f64(params),
            Solution::Approximate(form) => Ok(form.value_at(n).re),
        }
    }

    /// Value at `n` for parameter-free programs.
    pub fn value_at(&self, n: u64) -> Result<f64> {
        self.evaluate(n, &|_| None)
    }

    /// The formula valid from `threshold()` on, as an expression in `n`.
    pub fn to_expr(&self) -> Expr {
        match self {
            Solution::Exact(form) => form.to_expr_with(RatFunc::to_expr),
            Solution::Approximate(form) => form.to_expr_with(complex_to_expr),
        }
    }

    pub fn derivative(&self, name: &str) -> Result<Solution> {
        match self {
            Solution::Exact(form) => Ok(Solution::Exact(form.derivative(name))),
            Solution::Approximate(_) => Err(MomentError::Unsupported(
                "differentiating a numerically approximated closed form".into(),
            )),
        }
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Solution::Exact(form) => write!(f, "{}", form.render(RatFunc::to_expr)),
            Solution::Approximate(form) => write!(f, "{}", form.render(complex_to_expr)),
        }
    }
}

/// Decimal digits kept when rendering floating point coefficients.
const RENDER_DIGITS: i32 = 10;

fn float_to_expr(value: f64) -> Expr {
    let scale = 10f64.powi(RENDER_DIGITS);
    let scaled = (value * scale).round();
    match (scaled.to_i128(), scale.to_i128()) {
        (Some(num), Some(den)) => Expr::Constant(Rational::new(num.into(), den.into())),
        _ => Expr::Constant(Rational::from_float(value).unwrap_or_default()),
    }
}

fn complex_to_expr(value: &Complex64) -> Expr {
    let re = float_to_expr(value.re);
    if value.im == 0.0 {
        return re;
    }
    let im = float_to_expr(value.im.abs());
    let imaginary = crate::expr::mul(im, Expr::var("i"));
    let imaginary = if value.im < 0.0 {
        imaginary.negate()
    } else {
        imaginary
    };
    if value.re == 0.0 {
        imaginary
    } else {
        crate::expr::add(re, imaginary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::rational;

    fn q(n: i64, d: i64) -> Rational {
        rational(n, d)
    }

    #[test]
    fn faulhaber_sums() {
        // Σ_{k<n} k = n(n-1)/2
        let s1: Polynomial<Rational> = sum_powers(1);
        assert_eq!(s1.evaluate(&q(5, 1)), q(10, 1));
        // Σ_{k<n} k^2 = (n-1)n(2n-1)/6
        let s2: Polynomial<Rational> = sum_powers(2);
        assert_eq!(s2.evaluate(&q(4, 1)), q(14, 1));
        assert_eq!(s2.evaluate(&q(0, 1)), q(0, 1));
    }

    #[test]
    fn geometric_power_sums() {
        let ratio = q(1, 2);
        let g: Polynomial<Rational> = sum_power_geometric(1, &ratio);
        // Σ_{k<4} k·(1/2)^k = 1/2 + 2/4 + 3/8 = 11/8
        let n = 4u64;
        let value = g.evaluate(&q(4, 1)).mul(&ratio.powu(n)).sub(&g.evaluate(&q(0, 1)));
        assert_eq!(value, q(11, 8));
    }

    #[test]
    fn shifted_formula_agrees_with_evaluation() {
        let mut f = ExpPoly::zero();
        f.add_term(q(1, 2), Polynomial::from_coeffs(vec![q(1, 1), q(3, 1)]));
        f.add_term(q(1, 1), Polynomial::from_constant(q(2, 1)));
        let shifted = f.shift(-1);
        for n in 1..6 {
            assert_eq!(shifted.evaluate(n), f.evaluate(n - 1));
        }
    }

    #[test]
    fn prefix_is_trimmed_when_redundant() {
        let form = ClosedForm::new(vec![q(2, 1), q(5, 1)], ExpPoly::constant(q(5, 1)));
        assert_eq!(form.threshold(), 1);
        assert_eq!(form.value_at(0), q(2, 1));
        assert_eq!(form.value_at(7), q(5, 1));
    }

    #[test]
    fn derivative_in_the_base() {
        // d/dp p^n = n·p^(n-1)
        let p = RatFunc::symbol("p");
        let f = ExpPoly::term(p.clone(), Polynomial::one());
        let df = f.derivative("p");
        let at_three = df.evaluate(3);
        assert_eq!(at_three, RatFunc::integer(3).mul(&p.mul(&p)));
    }

    #[test]
    fn imaginary_parts_keep_their_sign() {
        let below = complex_to_expr(&Complex64::new(0.0, -0.5)).to_string();
        let above = complex_to_expr(&Complex64::new(0.0, 0.5)).to_string();
        assert_eq!(below, format!("-{above}"));
        assert!(above.ends_with('i'));
    }

    #[test]
    fn piecewise_rendering() {
        let form = ClosedForm::new(
            vec![RatFunc::integer(1)],
            ExpPoly::term(RatFunc::ratio(1, 2), Polynomial::from_constant(RatFunc::integer(4))),
        );
        let rendered = Solution::Exact(form).to_string();
        assert_eq!(rendered, "{ 1 if n = 0; 4*(1/2)^n if n >= 1 }");
    }
}
