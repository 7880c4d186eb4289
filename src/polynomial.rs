use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::expr::{Expr, Rational};
use num_bigint::BigInt;
use num_complex::Complex64;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

/// Field operations shared by every coefficient domain the solvers work over:
/// exact rationals, rational functions in the parameters, and complex floats.
pub trait CoeffOps: Clone + std::fmt::Debug {
    fn zero() -> Self;
    fn one() -> Self;
    fn is_zero(&self) -> bool;
    fn is_one(&self) -> bool;
    fn add(&self, other: &Self) -> Self;
    fn sub(&self, other: &Self) -> Self;
    fn mul(&self, other: &Self) -> Self;
    fn neg(&self) -> Self;
    /// `other` must be nonzero.
    fn div(&self, other: &Self) -> Self;
    fn from_rational(value: &Rational) -> Self;
    /// Magnitude used to pick elimination pivots; zero only for zero.
    fn pivot_weight(&self) -> f64;
    fn equals(&self, other: &Self) -> bool {
        self.sub(other).is_zero()
    }

    fn from_integer(value: i64) -> Self {
        Self::from_rational(&Rational::from_integer(BigInt::from(value)))
    }

    fn powu(&self, exp: u64) -> Self {
        let mut result = Self::one();
        let mut base = self.clone();
        let mut n = exp;
        while n > 0 {
            if n % 2 == 1 {
                result = result.mul(&base);
            }
            base = base.mul(&base);
            n /= 2;
        }
        result
    }

    /// Integer power; negative exponents invert, so `self` must be nonzero for them.
    fn powi(&self, exp: i64) -> Self {
        if exp >= 0 {
            self.powu(exp as u64)
        } else {
            Self::one().div(&self.powu(exp.unsigned_abs()))
        }
    }
}

impl CoeffOps for Rational {
    fn zero() -> Self {
        Zero::zero()
    }

    fn one() -> Self {
        One::one()
    }

    fn is_zero(&self) -> bool {
        Zero::is_zero(self)
    }

    fn is_one(&self) -> bool {
        One::is_one(self)
    }

    fn add(&self, other: &Self) -> Self {
        self + other
    }

    fn sub(&self, other: &Self) -> Self {
        self - other
    }

    fn mul(&self, other: &Self) -> Self {
        self * other
    }

    fn neg(&self) -> Self {
        -self.clone()
    }

    fn div(&self, other: &Self) -> Self {
        self / other
    }

    fn from_rational(value: &Rational) -> Self {
        value.clone()
    }

    fn pivot_weight(&self) -> f64 {
        crate::expr::rational_to_f64(&self.abs())
    }

    fn equals(&self, other: &Self) -> bool {
        self == other
    }
}

impl CoeffOps for Complex64 {
    fn zero() -> Self {
        Complex64::new(0.0, 0.0)
    }

    fn one() -> Self {
        Complex64::new(1.0, 0.0)
    }

    fn is_zero(&self) -> bool {
        self.re == 0.0 && self.im == 0.0
    }

    fn is_one(&self) -> bool {
        self.re == 1.0 && self.im == 0.0
    }

    fn add(&self, other: &Self) -> Self {
        self + other
    }

    fn sub(&self, other: &Self) -> Self {
        self - other
    }

    fn mul(&self, other: &Self) -> Self {
        self * other
    }

    fn neg(&self) -> Self {
        -self
    }

    fn div(&self, other: &Self) -> Self {
        self / other
    }

    fn from_rational(value: &Rational) -> Self {
        Complex64::new(crate::expr::rational_to_f64(value), 0.0)
    }

    fn pivot_weight(&self) -> f64 {
        self.norm()
    }

    fn equals(&self, other: &Self) -> bool {
        self == other
    }
}

/// Dense-by-exponent univariate polynomial.
#[derive(Clone, Debug)]
pub struct Polynomial<C> {
    pub(crate) coeffs: BTreeMap<usize, C>,
}

pub type Poly = Polynomial<Rational>;

impl<C: CoeffOps> PartialEq for Polynomial<C> {
    fn eq(&self, other: &Self) -> bool {
        self.coeffs.len() == other.coeffs.len()
            && self
                .coeffs
                .iter()
                .zip(other.coeffs.iter())
                .all(|((ea, ca), (eb, cb))| ea == eb && ca.equals(cb))
    }
}

impl<C: CoeffOps> Polynomial<C> {
    pub fn zero() -> Self {
        Polynomial {
            coeffs: BTreeMap::new(),
        }
    }

    pub fn one() -> Self {
        Polynomial::from_constant(C::one())
    }

    pub fn from_constant(c: C) -> Self {
        Polynomial::monomial(c, 0)
    }

    /// `c * t^power`.
    pub fn monomial(c: C, power: usize) -> Self {
        let mut coeffs = BTreeMap::new();
        if !c.is_zero() {
            coeffs.insert(power, c);
        }
        Polynomial { coeffs }
    }

    /// Build from coefficients listed from the constant term upwards.
    pub fn from_coeffs(coeffs: Vec<C>) -> Self {
        Polynomial {
            coeffs: coeffs
                .into_iter()
                .enumerate()
                .filter(|(_, c)| !c.is_zero())
                .collect(),
        }
    }

    /// `t - root`
    pub fn linear(root: &C) -> Self {
        Polynomial::monomial(C::one(), 1) - Polynomial::from_constant(root.clone())
    }

    pub fn degree(&self) -> Option<usize> {
        self.coeffs.keys().next_back().cloned()
    }

    pub fn leading_coeff(&self) -> C {
        self.degree()
            .and_then(|d| self.coeffs.get(&d).cloned())
            .unwrap_or_else(C::zero)
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.is_empty()
    }

    pub fn is_one(&self) -> bool {
        self.coeffs.len() == 1 && self.coeffs.get(&0).map(|c| c.is_one()).unwrap_or(false)
    }

    pub fn coeff(&self, power: usize) -> C {
        self.coeffs.get(&power).cloned().unwrap_or_else(C::zero)
    }

    pub fn coeff_entries(&self) -> impl Iterator<Item = (usize, C)> + '_ {
        self.coeffs.iter().map(|(e, c)| (*e, c.clone()))
    }

    /// Lowest exponent carrying a nonzero coefficient.
    pub fn trailing_power(&self) -> Option<usize> {
        self.coeffs.keys().next().cloned()
    }

    pub fn pow(&self, exp: usize) -> Self {
        if exp == 0 {
            return Polynomial::one();
        }
        let mut result = Polynomial::one();
        let mut base = self.clone();
        let mut n = exp;
        while n > 0 {
            if n % 2 == 1 {
                result = result * base.clone();
            }
            base = base.clone() * base;
            n /= 2;
        }
        result
    }

    pub fn scale(&self, k: &C) -> Self {
        if k.is_zero() {
            return Polynomial::zero();
        }
        let mut coeffs = BTreeMap::new();
        for (exp, coeff) in &self.coeffs {
            let scaled = coeff.mul(k);
            if !scaled.is_zero() {
                coeffs.insert(*exp, scaled);
            }
        }
        Polynomial { coeffs }
    }

    pub fn map_coeffs<D: CoeffOps, F: Fn(&C) -> D>(&self, f: F) -> Polynomial<D> {
        Polynomial {
            coeffs: self
                .coeffs
                .iter()
                .map(|(e, c)| (*e, f(c)))
                .filter(|(_, c)| !c.is_zero())
                .collect(),
        }
    }

    pub fn evaluate(&self, x: &C) -> C {
        let Some(degree) = self.degree() else {
            return C::zero();
        };
        let mut acc = C::zero();
        for exp in (0..=degree).rev() {
            acc = acc.mul(x);
            if let Some(coeff) = self.coeffs.get(&exp) {
                acc = acc.add(coeff);
            }
        }
        acc
    }

    pub fn derivative(&self) -> Self {
        let mut coeffs = BTreeMap::new();
        for (exp, coeff) in &self.coeffs {
            if *exp == 0 {
                continue;
            }
            let scaled = coeff.mul(&C::from_integer(*exp as i64));
            if !scaled.is_zero() {
                coeffs.insert(exp - 1, scaled);
            }
        }
        Polynomial { coeffs }
    }

    /// `p(t + shift)`.
    pub fn shift(&self, shift: &C) -> Self {
        let linear = Polynomial::monomial(C::one(), 1) + Polynomial::from_constant(shift.clone());
        let mut result = Polynomial::zero();
        for (exp, coeff) in &self.coeffs {
            result = result + linear.pow(*exp).scale(coeff);
        }
        result
    }

    pub fn monic(&self) -> Self {
        let lc = self.leading_coeff();
        if lc.is_zero() {
            return self.clone();
        }
        self.scale(&C::one().div(&lc))
    }

    pub fn div_rem(&self, divisor: &Self) -> (Self, Self) {
        let Some(divisor_degree) = divisor.degree() else {
            return (Polynomial::zero(), self.clone());
        };
        let mut remainder = self.clone();
        let mut quotient = Polynomial::zero();
        let divisor_lc = divisor.leading_coeff();

        while let Some(r_deg) = remainder.degree() {
            if r_deg < divisor_degree {
                break;
            }
            let power = r_deg - divisor_degree;
            let coeff = remainder.leading_coeff().div(&divisor_lc);
            let term_poly = Polynomial::monomial(coeff, power);
            // Drop the leading term explicitly: inexact fields may not cancel it.
            remainder.coeffs.remove(&r_deg);
            let mut product = term_poly.clone() * divisor.clone();
            product.coeffs.remove(&r_deg);
            quotient = quotient + term_poly;
            remainder = remainder - product;
        }

        (quotient, remainder)
    }

    pub fn div_exact(&self, divisor: &Self) -> Option<Self> {
        let (q, r) = self.div_rem(divisor);
        if r.is_zero() {
            Some(q)
        } else {
            None
        }
    }

    /// Render with `var` as the indeterminate, highest power first.
    pub fn to_expr_with<F: Fn(&C) -> Expr>(&self, var: &str, coeff_expr: F) -> Expr {
        if self.is_zero() {
            return crate::expr::zero();
        }
        let mut terms = self.coeffs.iter().rev().map(|(exp, coeff)| {
            let power = match *exp {
                0 => None,
                1 => Some(Expr::var(var)),
                e => Some(crate::expr::pow(Expr::var(var), Expr::integer(e as i64))),
            };
            let c = coeff_expr(coeff);
            match power {
                None => c,
                Some(p) if c.is_one() => p,
                Some(p) => crate::expr::mul(c, p),
            }
        });
        let first = terms.next().unwrap_or_else(crate::expr::zero);
        terms.fold(first, crate::expr::add)
    }
}

impl<C: CoeffOps> std::ops::Add for Polynomial<C> {
    type Output = Polynomial<C>;
    fn add(self, rhs: Polynomial<C>) -> Polynomial<C> {
        let mut coeffs = self.coeffs;
        for (exp, coeff) in rhs.coeffs {
            match coeffs.entry(exp) {
                Entry::Vacant(entry) => {
                    if !coeff.is_zero() {
                        entry.insert(coeff);
                    }
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
        Polynomial { coeffs }
    }
}

impl<C: CoeffOps> std::ops::Sub for Polynomial<C> {
    type Output = Polynomial<C>;
    fn sub(self, rhs: Polynomial<C>) -> Polynomial<C> {
        self + (-rhs)
    }
}

impl<C: CoeffOps> std::ops::Mul for Polynomial<C> {
    type Output = Polynomial<C>;
    fn mul(self, rhs: Polynomial<C>) -> Polynomial<C> {
        let mut coeffs: BTreeMap<usize, C> = BTreeMap::new();
        for (exp_a, coeff_a) in &self.coeffs {
            for (exp_b, coeff_b) in &rhs.coeffs {
                let product = coeff_a.mul(coeff_b);
                if product.is_zero() {
                    continue;
                }
                match coeffs.entry(exp_a + exp_b) {
                    Entry::Vacant(entry) => {
                        entry.insert(product);
                    }
                    Entry::Occupied(mut entry) => {
                        let updated = entry.get().add(&product);
                        if updated.is_zero() {
                            entry.remove();
                        } else {
                            *entry.get_mut() = updated;
                        }
                    }
                }
            }
        }
        Polynomial { coeffs }
    }
}

impl<C: CoeffOps> std::ops::Neg for Polynomial<C> {
    type Output = Polynomial<C>;
    fn neg(self) -> Polynomial<C> {
        Polynomial {
            coeffs: self
                .coeffs
                .into_iter()
                .map(|(exp, coeff)| (exp, coeff.neg()))
                .collect(),
        }
    }
}

impl Polynomial<Rational> {
    pub fn content_and_primitive_part(&self) -> (Rational, Self) {
        if self.is_zero() {
            return (Zero::zero(), Polynomial::zero());
        }
        let mut lcm = BigInt::one();
        for coeff in self.coeffs.values() {
            lcm = lcm.lcm(coeff.denom());
        }

        let mut gcd_num = BigInt::zero();
        let mut scaled_nums = BTreeMap::new();
        for (exp, coeff) in &self.coeffs {
            let scaled = coeff * Rational::from_integer(lcm.clone());
            let num = scaled.numer().clone();
            let abs_num = num.abs();
            if gcd_num.is_zero() {
                gcd_num = abs_num;
            } else {
                gcd_num = gcd_num.gcd(&abs_num);
            }
            scaled_nums.insert(*exp, num);
        }

        let mut coeffs = BTreeMap::new();
        for (exp, num) in scaled_nums {
            let reduced = num / gcd_num.clone();
            if !reduced.is_zero() {
                coeffs.insert(exp, Rational::from_integer(reduced));
            }
        }

        let mut primitive = Polynomial { coeffs };
        let mut content = Rational::new(gcd_num, lcm);
        if primitive.leading_coeff().is_negative() {
            primitive = -primitive;
            content = -content;
        }
        (content, primitive)
    }

    /// Integer coefficients of the primitive part, constant term first.
    pub fn integer_coeffs(&self) -> Vec<BigInt> {
        let (_, primitive) = self.content_and_primitive_part();
        let degree = primitive.degree().unwrap_or(0);
        (0..=degree)
            .map(|e| primitive.coeff(e).to_integer())
            .collect()
    }

    pub fn gcd(a: &Poly, b: &Poly) -> Poly {
        let mut r0 = a.clone();
        let mut r1 = b.clone();
        while !r1.is_zero() {
            let (_, r) = r0.div_rem(&r1);
            r0 = r1;
            r1 = r;
        }
        r0.monic()
    }

    pub fn square_free_decomposition(&self) -> Vec<(Poly, usize)> {
        if self.is_zero() || self.degree().unwrap_or(0) == 0 {
            return Vec::new();
        }

        let mut result = Vec::new();
        let mut i = 1;
        let monic = self.monic();
        let mut g = Poly::gcd(&monic, &monic.derivative());
        let mut y = monic.div_exact(&g).unwrap_or_else(Poly::zero);

        while !y.is_one() && !y.is_zero() {
            let z = Poly::gcd(&y, &g);
            let factor = y.div_exact(&z).unwrap_or_else(Poly::zero);
            if !factor.is_one() && !factor.is_zero() {
                result.push((factor, i));
            }
            y = z;
            g = g.div_exact(&y).unwrap_or_else(Poly::zero);
            i += 1;
        }

        result
    }

    /// Rational roots found with the rational root theorem.
    pub fn rational_roots(&self) -> Vec<Rational> {
        let mut roots = Vec::new();
        let mut current = self.clone();
        while let Some(root) = find_rational_root(&current) {
            roots.push(root.clone());
            match current.div_exact(&Poly::linear(&root)) {
                Some(next) => current = next,
                None => break,
            }
        }
        roots
    }
}

fn find_rational_root(poly: &Poly) -> Option<Rational> {
    let degree = poly.degree()?;
    if degree == 0 {
        return None;
    }
    if Zero::is_zero(&poly.coeff(0)) {
        return Some(<Rational as Zero>::zero());
    }
    if degree == 1 {
        return Some(-poly.coeff(0) / poly.coeff(1));
    }

    let int_coeffs = poly.integer_coeffs();
    let leading = int_coeffs.last()?.clone();
    let constant = int_coeffs.first()?.clone();

    let p_candidates = divisors(&constant);
    let q_candidates = divisors(&leading);

    let mut candidates = Vec::new();
    for p in &p_candidates {
        for q in &q_candidates {
            let candidate = Rational::new(p.clone(), q.clone());
            candidates.push(candidate.clone());
            candidates.push(-candidate);
        }
    }
    candidates.sort();
    candidates.dedup();

    candidates
        .into_iter()
        .find(|candidate| Zero::is_zero(&poly.evaluate(candidate)))
}

const DIVISOR_SEARCH_LIMIT: u64 = 1_000_000;

fn divisors(n: &BigInt) -> Vec<BigInt> {
    let mut result = Vec::new();
    let abs_n = n.abs();
    if abs_n.is_zero() {
        return result;
    }
    let mut d = BigInt::one();
    while &d * &d <= abs_n {
        if d.to_u64().map(|v| v > DIVISOR_SEARCH_LIMIT).unwrap_or(true) {
            break;
        }
        if (&abs_n % &d).is_zero() {
            result.push(d.clone());
            let other = &abs_n / &d;
            if other != d {
                result.push(other);
            }
        }
        d += 1;
    }
    result.sort();
    result
}
