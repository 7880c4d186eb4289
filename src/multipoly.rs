//! Sparse multivariate polynomials keyed by [`Monomial`].
//!
//! The same container serves two roles: numerators and denominators of
//! rational functions over the parameters (`MultiPoly<Rational>`), and program
//! state expressions over the loop variables (`MultiPoly<RatFunc>`).

use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::expr::{Expr, Rational};
use crate::polynomial::{CoeffOps, Poly, Polynomial};

/// Product of symbols raised to positive integer powers. The empty product is
/// the unit monomial.
#[derive(Clone, PartialEq, Eq, Hash, Default, Debug)]
pub struct Monomial {
    powers: BTreeMap<String, u32>,
}

impl Monomial {
    pub fn one() -> Self {
        Monomial::default()
    }

    pub fn var(name: impl Into<String>) -> Self {
        Monomial::power(name, 1)
    }

    pub fn power(name: impl Into<String>, exp: u32) -> Self {
        let mut powers = BTreeMap::new();
        if exp > 0 {
            powers.insert(name.into(), exp);
        }
        Monomial { powers }
    }

    pub fn from_powers<I, S>(powers: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut result = Monomial::one();
        for (name, exp) in powers {
            result = result.mul(&Monomial::power(name, exp));
        }
        result
    }

    pub fn is_one(&self) -> bool {
        self.powers.is_empty()
    }

    pub fn degree(&self) -> u32 {
        self.powers.values().sum()
    }

    pub fn exponent(&self, name: &str) -> u32 {
        self.powers.get(name).copied().unwrap_or(0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.powers.contains_key(name)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> + '_ {
        self.powers.keys().map(String::as_str)
    }

    pub fn powers(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.powers.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn mul(&self, other: &Monomial) -> Monomial {
        let mut powers = self.powers.clone();
        for (name, exp) in &other.powers {
            *powers.entry(name.clone()).or_insert(0) += exp;
        }
        Monomial { powers }
    }

    /// `self / other` when every exponent of `other` fits into `self`.
    pub fn div(&self, other: &Monomial) -> Option<Monomial> {
        let mut powers = self.powers.clone();
        for (name, exp) in &other.powers {
            match powers.entry(name.clone()) {
                Entry::Occupied(mut entry) if *entry.get() >= *exp => {
                    if *entry.get() == *exp {
                        entry.remove();
                    } else {
                        *entry.get_mut() -= exp;
                    }
                }
                _ => return None,
            }
        }
        Some(Monomial { powers })
    }

    /// Split off the power of `name`, returning `(exponent, rest)`.
    pub fn split(&self, name: &str) -> (u32, Monomial) {
        let mut powers = self.powers.clone();
        let exp = powers.remove(name).unwrap_or(0);
        (exp, Monomial { powers })
    }

    /// Elementwise minimum of exponents.
    pub fn gcd(&self, other: &Monomial) -> Monomial {
        let powers = self
            .powers
            .iter()
            .filter_map(|(name, exp)| {
                let shared = (*exp).min(other.exponent(name));
                (shared > 0).then(|| (name.clone(), shared))
            })
            .collect();
        Monomial { powers }
    }

    pub fn to_expr(&self) -> Expr {
        let mut factors = self.powers.iter().map(|(name, exp)| {
            if *exp == 1 {
                Expr::var(name.clone())
            } else {
                crate::expr::pow(Expr::var(name.clone()), Expr::integer(*exp))
            }
        });
        match factors.next() {
            None => crate::expr::one(),
            Some(first) => factors.fold(first, crate::expr::mul),
        }
    }
}

impl Ord for Monomial {
    /// Graded lexicographic: total degree first, then exponents compared
    /// symbol by symbol in name order.
    fn cmp(&self, other: &Self) -> Ordering {
        self.degree().cmp(&other.degree()).then_with(|| {
            let names: BTreeSet<&String> =
                self.powers.keys().chain(other.powers.keys()).collect();
            for name in names {
                let ord = self.exponent(name).cmp(&other.exponent(name));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        })
    }
}

impl PartialOrd for Monomial {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Monomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.powers.is_empty() {
            return write!(f, "1");
        }
        let parts: Vec<String> = self
            .powers
            .iter()
            .map(|(name, exp)| {
                if *exp == 1 {
                    name.clone()
                } else {
                    format!("{name}^{exp}")
                }
            })
            .collect();
        write!(f, "{}", parts.join("*"))
    }
}

#[derive(Clone, Debug)]
pub struct MultiPoly<C> {
    terms: BTreeMap<Monomial, C>,
}

impl<C: CoeffOps> PartialEq for MultiPoly<C> {
    fn eq(&self, other: &Self) -> bool {
        self.terms.len() == other.terms.len()
            && self
                .terms
                .iter()
                .zip(other.terms.iter())
                .all(|((ma, ca), (mb, cb))| ma == mb && ca.equals(cb))
    }
}

impl<C: CoeffOps> MultiPoly<C> {
    pub fn zero() -> Self {
        MultiPoly {
            terms: BTreeMap::new(),
        }
    }

    pub fn one() -> Self {
        MultiPoly::constant(C::one())
    }

    pub fn constant(c: C) -> Self {
        MultiPoly::term(c, Monomial::one())
    }

    pub fn var(name: impl Into<String>) -> Self {
        MultiPoly::term(C::one(), Monomial::var(name))
    }

    pub fn term(c: C, monomial: Monomial) -> Self {
        let mut terms = BTreeMap::new();
        if !c.is_zero() {
            terms.insert(monomial, c);
        }
        MultiPoly { terms }
    }

    pub fn from_terms<I: IntoIterator<Item = (Monomial, C)>>(terms: I) -> Self {
        let mut result = MultiPoly::zero();
        for (monomial, coeff) in terms {
            result.add_term(monomial, coeff);
        }
        result
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn is_constant(&self) -> bool {
        self.terms.keys().all(Monomial::is_one)
    }

    pub fn is_one(&self) -> bool {
        self.terms.len() == 1 && self.constant_term().is_one()
    }

    /// Coefficient of the unit monomial.
    pub fn constant_term(&self) -> C {
        self.coefficient(&Monomial::one())
    }

    pub fn coefficient(&self, monomial: &Monomial) -> C {
        self.terms.get(monomial).cloned().unwrap_or_else(C::zero)
    }

    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, &C)> + '_ {
        self.terms.iter()
    }

    pub fn monomials(&self) -> impl Iterator<Item = &Monomial> + '_ {
        self.terms.keys()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Largest term in graded-lex order.
    pub fn leading_term(&self) -> Option<(&Monomial, &C)> {
        self.terms.iter().next_back()
    }

    pub fn symbols(&self) -> BTreeSet<String> {
        self.terms
            .keys()
            .flat_map(|m| m.symbols().map(str::to_string))
            .collect()
    }

    pub fn contains_symbol(&self, name: &str) -> bool {
        self.terms.keys().any(|m| m.contains(name))
    }

    pub fn total_degree(&self) -> u32 {
        self.terms.keys().map(Monomial::degree).max().unwrap_or(0)
    }

    pub fn add_term(&mut self, monomial: Monomial, coeff: C) {
        if coeff.is_zero() {
            return;
        }
        match self.terms.entry(monomial) {
            Entry::Vacant(entry) => {
                entry.insert(coeff);
            }
            Entry::Occupied(mut entry) => {
                let updated = entry.get().add(&coeff);
                if updated.is_zero() {
                    entry.remove();
                } else {
                    *entry.get_mut() = updated;
                }
            }
        }
    }

    pub fn add(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for (monomial, coeff) in &other.terms {
            result.add_term(monomial.clone(), coeff.clone());
        }
        result
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.neg())
    }

    pub fn neg(&self) -> Self {
        MultiPoly {
            terms: self
                .terms
                .iter()
                .map(|(m, c)| (m.clone(), c.neg()))
                .collect(),
        }
    }

    pub fn mul(&self, other: &Self) -> Self {
        let mut result = MultiPoly::zero();
        for (ma, ca) in &self.terms {
            for (mb, cb) in &other.terms {
                result.add_term(ma.mul(mb), ca.mul(cb));
            }
        }
        result
    }

    pub fn scale(&self, k: &C) -> Self {
        if k.is_zero() {
            return MultiPoly::zero();
        }
        MultiPoly::from_terms(self.terms.iter().map(|(m, c)| (m.clone(), c.mul(k))))
    }

    pub fn mul_monomial(&self, monomial: &Monomial) -> Self {
        MultiPoly {
            terms: self
                .terms
                .iter()
                .map(|(m, c)| (m.mul(monomial), c.clone()))
                .collect(),
        }
    }

    pub fn pow(&self, exp: u32) -> Self {
        let mut result = MultiPoly::one();
        let mut base = self.clone();
        let mut n = exp;
        while n > 0 {
            if n % 2 == 1 {
                result = result.mul(&base);
            }
            n /= 2;
            if n > 0 {
                base = base.mul(&base);
            }
        }
        result
    }

    pub fn map_coeffs<D: CoeffOps, F: Fn(&C) -> D>(&self, f: F) -> MultiPoly<D> {
        MultiPoly::from_terms(self.terms.iter().map(|(m, c)| (m.clone(), f(c))))
    }

    /// Group the terms by the power of `name`: `self = Σ_p name^p · group[p]`,
    /// where no group contains `name`.
    pub fn group_by_power(&self, name: &str) -> BTreeMap<u32, MultiPoly<C>> {
        let mut groups: BTreeMap<u32, MultiPoly<C>> = BTreeMap::new();
        for (monomial, coeff) in &self.terms {
            let (exp, rest) = monomial.split(name);
            groups
                .entry(exp)
                .or_insert_with(MultiPoly::zero)
                .add_term(rest, coeff.clone());
        }
        groups
    }

    /// Replace every power `name^p` by `replacement(p)`.
    pub fn replace_powers<F>(&self, name: &str, mut replacement: F) -> Self
    where
        F: FnMut(u32) -> MultiPoly<C>,
    {
        if !self.contains_symbol(name) {
            return self.clone();
        }
        let mut result = MultiPoly::zero();
        for (exp, rest) in self.group_by_power(name) {
            let substituted = if exp == 0 {
                rest
            } else {
                rest.mul(&replacement(exp))
            };
            result = result.add(&substituted);
        }
        result
    }

    pub fn substitute(&self, name: &str, value: &MultiPoly<C>) -> Self {
        let mut powers: BTreeMap<u32, MultiPoly<C>> = BTreeMap::new();
        self.replace_powers(name, |exp| {
            powers
                .entry(exp)
                .or_insert_with(|| value.pow(exp))
                .clone()
        })
    }

    /// Exact division in graded-lex order; `None` if `divisor` does not divide `self`.
    pub fn div_exact(&self, divisor: &Self) -> Option<Self> {
        let (lead_m, lead_c) = divisor.leading_term()?;
        let mut remainder = self.clone();
        let mut quotient = MultiPoly::zero();
        while let Some((m, c)) = remainder.leading_term() {
            let factor_m = m.div(lead_m)?;
            let factor_c = c.div(lead_c);
            let step = MultiPoly::term(factor_c, factor_m);
            let product = step.mul(divisor);
            let top = m.clone();
            remainder = remainder.sub(&product);
            // Cancel the leading term outright so inexact fields still progress.
            remainder.terms.remove(&top);
            quotient = quotient.add(&step);
        }
        Some(quotient)
    }

    /// Monomial dividing every term.
    pub fn monomial_content(&self) -> Monomial {
        let mut iter = self.terms.keys();
        let Some(first) = iter.next() else {
            return Monomial::one();
        };
        iter.fold(first.clone(), |acc, m| acc.gcd(m))
    }

    /// Divide every term by `monomial`, which must divide all of them.
    pub fn div_monomial(&self, monomial: &Monomial) -> Self {
        MultiPoly {
            terms: self
                .terms
                .iter()
                .filter_map(|(m, c)| m.div(monomial).map(|q| (q, c.clone())))
                .collect(),
        }
    }

    /// View as a univariate polynomial in `name` when it is the only symbol.
    pub fn as_univariate(&self, name: &str) -> Option<Polynomial<C>> {
        let mut coeffs = Vec::new();
        for (monomial, coeff) in &self.terms {
            let (exp, rest) = monomial.split(name);
            if !rest.is_one() {
                return None;
            }
            coeffs.push((exp as usize, coeff.clone()));
        }
        let mut poly = Polynomial::zero();
        for (exp, coeff) in coeffs {
            poly = poly + Polynomial::monomial(coeff, exp);
        }
        Some(poly)
    }

    pub fn from_univariate(poly: &Polynomial<C>, name: &str) -> Self {
        MultiPoly::from_terms(
            poly.coeff_entries()
                .map(|(exp, c)| (Monomial::power(name, exp as u32), c)),
        )
    }

    pub fn to_expr_with<F: Fn(&C) -> Expr>(&self, coeff_expr: F) -> Expr {
        let mut parts = self.terms.iter().rev().map(|(m, c)| {
            if m.is_one() {
                coeff_expr(c)
            } else if c.is_one() {
                m.to_expr()
            } else {
                crate::expr::mul(coeff_expr(c), m.to_expr())
            }
        });
        match parts.next() {
            None => crate::expr::zero(),
            Some(first) => parts.fold(first, crate::expr::add),
        }
    }
}

impl MultiPoly<Rational> {
    pub fn derivative(&self, name: &str) -> Self {
        let mut result = MultiPoly::zero();
        for (monomial, coeff) in &self.terms {
            let (exp, rest) = monomial.split(name);
            if exp == 0 {
                continue;
            }
            let lowered = rest.mul(&Monomial::power(name, exp - 1));
            result.add_term(lowered, coeff.mul(&Rational::from_integer(exp.into())));
        }
        result
    }

    /// Convert an expression built from `+ - *`, integer powers and division by
    /// constants.
    pub fn from_expr(expr: &Expr) -> Option<Self> {
        match expr {
            Expr::Variable(name) => Some(MultiPoly::var(name.clone())),
            Expr::Constant(c) => Some(MultiPoly::constant(c.clone())),
            Expr::Add(a, b) => Some(Self::from_expr(a)?.add(&Self::from_expr(b)?)),
            Expr::Sub(a, b) => Some(Self::from_expr(a)?.sub(&Self::from_expr(b)?)),
            Expr::Mul(a, b) => Some(Self::from_expr(a)?.mul(&Self::from_expr(b)?)),
            Expr::Neg(a) => Some(Self::from_expr(a)?.neg()),
            Expr::Div(a, b) => {
                let denom = Self::from_expr(b)?;
                if !denom.is_constant() || denom.is_zero() {
                    return None;
                }
                let inverse = Rational::one().div(&denom.constant_term());
                Some(Self::from_expr(a)?.scale(&inverse))
            }
            Expr::Pow(base, exp) => {
                let exponent = match &**exp {
                    Expr::Constant(c) if c.is_integer() => c.to_integer(),
                    _ => return None,
                };
                let power = u32::try_from(exponent).ok()?;
                Some(Self::from_expr(base)?.pow(power))
            }
            _ => None,
        }
    }

    /// Univariate view when at most one symbol occurs.
    pub fn single_symbol(&self) -> Option<(String, Poly)> {
        let symbols = self.symbols();
        if symbols.len() != 1 {
            return None;
        }
        let name = symbols.into_iter().next()?;
        let poly = self.as_univariate(&name)?;
        Some((name, poly))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expr;

    fn mp(input: &str) -> MultiPoly<Rational> {
        MultiPoly::from_expr(&parse_expr(input).unwrap()).unwrap()
    }

    #[test]
    fn graded_lex_is_multiplicative() {
        let p = Monomial::var("p");
        let q = Monomial::var("q");
        assert!(p < Monomial::power("p", 2));
        assert!(q > p || q < p);
        let ord = p.cmp(&q);
        assert_eq!(p.mul(&p).cmp(&q.mul(&p)), ord);
    }

    #[test]
    fn grouping_by_power_separates_rest() {
        let poly = mp("x^2*y + 3*x^2 + y + 1");
        let groups = poly.group_by_power("x");
        assert_eq!(groups[&2], mp("y + 3"));
        assert_eq!(groups[&0], mp("y + 1"));
    }

    #[test]
    fn substitution_expands() {
        let poly = mp("x^2 + y");
        assert_eq!(poly.substitute("x", &mp("y + 1")), mp("y^2 + 3*y + 1"));
    }

    #[test]
    fn exact_division_detects_factors() {
        let product = mp("(p + q)*(p - 2*q)");
        assert_eq!(product.div_exact(&mp("p + q")), Some(mp("p - 2*q")));
        assert_eq!(mp("p^2 + 1").div_exact(&mp("p + 1")), None);
    }

    #[test]
    fn derivative_lowers_powers() {
        assert_eq!(mp("p^3*q + p").derivative("p"), mp("3*p^2*q + 1"));
    }
}
