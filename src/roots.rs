//! Roots of characteristic polynomials, exact or numeric.

use nalgebra::DMatrix;
use num_complex::Complex64;
use tracing::{debug, warn};

use crate::config::RootMode;
use crate::error::{MomentError, Result};
use crate::expr::Rational;
use crate::polynomial::{CoeffOps, Poly, Polynomial};
use crate::ratfunc::{is_atom, RatFunc};

/// Newton steps applied to each companion-matrix eigenvalue.
const POLISH_STEPS: usize = 3;

/// Distinct roots with their multiplicities.
#[derive(Clone, Debug)]
pub enum CharacteristicRoots {
    Exact(Vec<(RatFunc, usize)>),
    Numeric(Vec<(Complex64, usize)>),
}

impl CharacteristicRoots {
    pub fn is_exact(&self) -> bool {
        matches!(self, CharacteristicRoots::Exact(_))
    }

    /// Sum of multiplicities.
    pub fn count(&self) -> usize {
        match self {
            CharacteristicRoots::Exact(roots) => roots.iter().map(|(_, m)| m).sum(),
            CharacteristicRoots::Numeric(roots) => roots.iter().map(|(_, m)| m).sum(),
        }
    }

    /// Multiplicity of the root 0.
    pub fn zero_multiplicity(&self) -> usize {
        match self {
            CharacteristicRoots::Exact(roots) => roots
                .iter()
                .find(|(r, _)| r.is_zero())
                .map(|(_, m)| *m)
                .unwrap_or(0),
            CharacteristicRoots::Numeric(roots) => roots
                .iter()
                .find(|(r, _)| r.is_zero())
                .map(|(_, m)| *m)
                .unwrap_or(0),
        }
    }
}

/// Find the roots of `poly` with multiplicities.
///
/// `candidates` are tried first in exact mode; the diagonal of the matrix the
/// polynomial came from is a good source for them.
pub fn find_roots(
    poly: &Polynomial<RatFunc>,
    candidates: &[RatFunc],
    mode: RootMode,
    fallback_epsilon: f64,
) -> Result<CharacteristicRoots> {
    match mode {
        RootMode::Exact => exact_roots(poly, candidates, fallback_epsilon),
        RootMode::NumericComplex { epsilon } => {
            numeric_roots(poly, epsilon).map(CharacteristicRoots::Numeric)
        }
        RootMode::NumericReal { epsilon } => {
            let roots = numeric_roots(poly, epsilon)?;
            if let Some((root, _)) = roots.iter().find(|(r, _)| r.im.abs() > epsilon) {
                return Err(MomentError::RootFinding(format!(
                    "characteristic polynomial has the non-real root {root}"
                )));
            }
            Ok(CharacteristicRoots::Numeric(
                roots
                    .into_iter()
                    .map(|(r, m)| (Complex64::new(r.re, 0.0), m))
                    .collect(),
            ))
        }
    }
}

fn exact_roots(
    poly: &Polynomial<RatFunc>,
    candidates: &[RatFunc],
    fallback_epsilon: f64,
) -> Result<CharacteristicRoots> {
    let mut remaining = poly.clone();
    let mut found: Vec<(RatFunc, usize)> = Vec::new();

    let mut tried: Vec<RatFunc> = vec![RatFunc::zero(), RatFunc::one(), RatFunc::integer(-1)];
    tried.extend(candidates.iter().cloned());
    for candidate in tried {
        if found.iter().any(|(r, _)| r.equals(&candidate)) {
            continue;
        }
        let multiplicity = deflate(&mut remaining, &candidate);
        if multiplicity > 0 {
            found.push((candidate, multiplicity));
        }
    }

    if remaining.degree().unwrap_or(0) > 0 {
        if let Some(rational) = as_rational_poly(&remaining) {
            for root in rational.rational_roots() {
                let root = RatFunc::constant(root);
                if let Some(entry) = found.iter_mut().find(|(r, _)| r.equals(&root)) {
                    entry.1 += 1;
                } else {
                    found.push((root.clone(), 1));
                }
                if let Some(next) = remaining.div_exact(&Polynomial::linear(&root)) {
                    remaining = next;
                }
            }
        }
    }

    if remaining.degree().unwrap_or(0) == 0 {
        debug!(roots = found.len(), "characteristic polynomial split exactly");
        return Ok(CharacteristicRoots::Exact(found));
    }

    if has_parameters(poly) {
        return Err(MomentError::RootFinding(format!(
            "factor {} has no roots in the coefficient field",
            remaining.to_expr_with("t", RatFunc::to_expr)
        )));
    }

    warn!(
        degree = remaining.degree().unwrap_or(0),
        "characteristic polynomial does not split over the rationals; using numeric roots"
    );
    numeric_roots(poly, fallback_epsilon).map(CharacteristicRoots::Numeric)
}

/// Divide out `(t - root)` as often as it divides, returning the multiplicity.
fn deflate(poly: &mut Polynomial<RatFunc>, root: &RatFunc) -> usize {
    let mut multiplicity = 0;
    while poly.degree().unwrap_or(0) > 0 && poly.evaluate(root).is_zero() {
        match poly.div_exact(&Polynomial::linear(root)) {
            Some(next) => {
                *poly = next;
                multiplicity += 1;
            }
            None => break,
        }
    }
    multiplicity
}

/// Whether any coefficient mentions a program parameter. Atoms such as
/// `cos(1)` are numeric constants and do not count.
fn has_parameters(poly: &Polynomial<RatFunc>) -> bool {
    poly.coeff_entries()
        .any(|(_, coeff)| coeff.symbols().iter().any(|name| !is_atom(name)))
}

fn as_rational_poly(poly: &Polynomial<RatFunc>) -> Option<Poly> {
    let mut coeffs = Vec::new();
    for (exp, coeff) in poly.coeff_entries() {
        coeffs.push((exp, coeff.as_rational()?));
    }
    Some(
        coeffs
            .into_iter()
            .fold(Poly::zero(), |acc, (exp, c)| acc + Poly::monomial(c, exp)),
    )
}

fn numeric_roots(poly: &Polynomial<RatFunc>, epsilon: f64) -> Result<Vec<(Complex64, usize)>> {
    if let Some(rational) = as_rational_poly(poly) {
        let mut roots = Vec::new();
        for (factor, multiplicity) in rational.square_free_decomposition() {
            let complex = factor.map_coeffs(|c: &Rational| Complex64::from_rational(c));
            for root in companion_roots(&complex)? {
                roots.push((root, multiplicity));
            }
        }
        return Ok(merge_close(roots, epsilon));
    }

    let complex = numeric_coefficients(poly)?;
    let simple = companion_roots(&complex)?
        .into_iter()
        .map(|r| (r, 1))
        .collect();
    Ok(merge_close(simple, epsilon))
}

fn numeric_coefficients(poly: &Polynomial<RatFunc>) -> Result<Polynomial<Complex64>> {
    let mut result = Polynomial::zero();
    for (exp, coeff) in poly.coeff_entries() {
        let value = coeff.to_f64(&|_| None).map_err(|e| {
            MomentError::RootFinding(format!("coefficient {coeff} has no numeric value: {e}"))
        })?;
        result = result + Polynomial::monomial(Complex64::new(value, 0.0), exp);
    }
    Ok(result)
}

/// Eigenvalues of the companion matrix, refined with a few Newton steps.
fn companion_roots(poly: &Polynomial<Complex64>) -> Result<Vec<Complex64>> {
    let Some(degree) = poly.degree() else {
        return Ok(Vec::new());
    };
    if degree == 0 {
        return Ok(Vec::new());
    }
    let leading = poly.leading_coeff();
    if degree == 1 {
        return Ok(vec![-poly.coeff(0) / leading]);
    }

    let mut companion = DMatrix::<Complex64>::zeros(degree, degree);
    for row in 1..degree {
        companion[(row, row - 1)] = Complex64::new(1.0, 0.0);
    }
    for column in 0..degree {
        companion[(0, column)] = -poly.coeff(degree - 1 - column) / leading;
    }

    let eigenvalues = companion.eigenvalues().ok_or_else(|| {
        MomentError::RootFinding("failed to compute eigenvalues of the companion matrix".into())
    })?;

    let derivative = poly.derivative();
    Ok(eigenvalues
        .iter()
        .map(|&z| canonicalize_root(polish(poly, &derivative, z)))
        .collect())
}

fn polish(poly: &Polynomial<Complex64>, derivative: &Polynomial<Complex64>, z: Complex64) -> Complex64 {
    let mut current = z;
    for _ in 0..POLISH_STEPS {
        let slope = derivative.evaluate(&current);
        if slope.norm() == 0.0 {
            break;
        }
        let next = current - poly.evaluate(&current) / slope;
        if !next.re.is_finite() || !next.im.is_finite() {
            break;
        }
        current = next;
    }
    current
}

const RESULT_ZERO_TOL: f64 = 1.0e-12;

fn canonicalize_root(z: Complex64) -> Complex64 {
    if !z.re.is_finite() || !z.im.is_finite() {
        return z;
    }
    let mut real = z.re;
    let mut imag = z.im;
    let scale = 1.0 + real.abs();
    if imag.abs() <= RESULT_ZERO_TOL * scale {
        imag = 0.0;
    }
    if real.abs() <= RESULT_ZERO_TOL {
        real = 0.0;
    }
    Complex64::new(real, imag)
}

/// Cluster roots closer than `epsilon`, summing multiplicities.
fn merge_close(roots: Vec<(Complex64, usize)>, epsilon: f64) -> Vec<(Complex64, usize)> {
    let mut clusters: Vec<(Complex64, usize)> = Vec::new();
    for (root, multiplicity) in roots {
        match clusters
            .iter_mut()
            .find(|(center, _)| (center - root).norm() <= epsilon)
        {
            Some((center, count)) => {
                let total = (*count + multiplicity) as f64;
                *center = (*center * *count as f64 + root * multiplicity as f64) / total;
                *count += multiplicity;
            }
            None => clusters.push((root, multiplicity)),
        }
    }
    clusters
        .into_iter()
        .map(|(r, m)| (canonicalize_root(r), m))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;

    fn poly(coeffs: &[i64]) -> Polynomial<RatFunc> {
        Polynomial::from_coeffs(coeffs.iter().map(|&c| RatFunc::integer(c)).collect())
    }

    #[test]
    fn exact_roots_with_multiplicity() {
        // (t - 1)^2 (t + 1/2)
        let p = Polynomial::linear(&RatFunc::one()).pow(2)
            * Polynomial::linear(&RatFunc::ratio(-1, 2));
        let CharacteristicRoots::Exact(roots) = find_roots(&p, &[], RootMode::Exact, 1e-9).unwrap()
        else {
            panic!("expected exact roots");
        };
        assert_eq!(roots.len(), 2);
        assert!(roots.iter().any(|(r, m)| r.is_one() && *m == 2));
        assert!(roots.iter().any(|(r, m)| r.equals(&RatFunc::ratio(-1, 2)) && *m == 1));
    }

    #[test]
    fn symbolic_candidates_are_tested() {
        let p_sym = RatFunc::symbol("p");
        let char_poly = Polynomial::linear(&p_sym) * Polynomial::linear(&RatFunc::ratio(1, 3));
        let roots = find_roots(&char_poly, &[p_sym.clone()], RootMode::Exact, 1e-9).unwrap();
        assert!(roots.is_exact());
        assert_eq!(roots.count(), 2);
    }

    #[test]
    fn irrational_roots_fall_back_to_numerics() {
        // t^2 - 2
        let roots = find_roots(&poly(&[-2, 0, 1]), &[], RootMode::Exact, 1e-9).unwrap();
        let CharacteristicRoots::Numeric(values) = roots else {
            panic!("expected numeric roots");
        };
        for (root, multiplicity) in values {
            assert_eq!(multiplicity, 1);
            assert!((root.re.abs() - 2f64.sqrt()).abs() < 1e-10);
            assert_eq!(root.im, 0.0);
        }
    }

    #[test]
    fn real_mode_rejects_complex_roots() {
        // t^2 + 1
        let result = find_roots(&poly(&[1, 0, 1]), &[], RootMode::NumericReal { epsilon: 1e-9 }, 1e-9);
        assert!(matches!(result, Err(MomentError::RootFinding(_))));
        let complex =
            find_roots(&poly(&[1, 0, 1]), &[], RootMode::NumericComplex { epsilon: 1e-9 }, 1e-9)
                .unwrap();
        assert_eq!(complex.count(), 2);
    }

    #[test]
    fn atom_coefficients_fall_back_to_numerics() {
        // t^2 - cos(1)
        let cos_one = RatFunc::atom(&Expr::Cos(Expr::integer(1).boxed()));
        let p = poly(&[0, 0, 1]) - Polynomial::from_constant(cos_one);
        let CharacteristicRoots::Numeric(values) = find_roots(&p, &[], RootMode::Exact, 1e-9).unwrap()
        else {
            panic!("expected numeric roots");
        };
        assert_eq!(values.len(), 2);
        for (root, _) in values {
            assert!((root.re.abs() - 1f64.cos().sqrt()).abs() < 1e-10);
        }
    }

    #[test]
    fn symbolic_polynomial_without_roots_is_an_error() {
        // t^2 - p
        let mut p = poly(&[0, 0, 1]);
        p = p - Polynomial::from_constant(RatFunc::symbol("p"));
        assert!(find_roots(&p, &[], RootMode::Exact, 1e-9).is_err());
    }
}
