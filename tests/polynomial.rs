use num_traits::Zero;
use loop_moments::{parse_expr, MultiPoly, Poly, Rational};

fn poly(input: &str) -> Poly {
    let expr = parse_expr(input).expect("parse polynomial");
    MultiPoly::<Rational>::from_expr(&expr)
        .and_then(|p| p.as_univariate("x"))
        .expect("build polynomial")
}

fn rational(num: i64, den: i64) -> Rational {
    Rational::new(num.into(), den.into())
}

#[test]
fn polynomial_division_exact() {
    let dividend = poly("x^3 - 1");
    let divisor = poly("x - 1");
    let (quotient, remainder) = dividend.div_rem(&divisor);
    assert!(remainder.is_zero());
    assert_eq!(quotient, poly("x^2 + x + 1"));
}

#[test]
fn polynomial_division_remainder() {
    let dividend = poly("x^3 + x + 1");
    let divisor = poly("x^2 + 1");
    let (quotient, remainder) = dividend.div_rem(&divisor);
    assert_eq!(quotient, poly("x"));
    assert_eq!(remainder, poly("1"));
}

#[test]
fn polynomial_division_non_exact() {
    let dividend = poly("x^2 + 1");
    let divisor = poly("x + 1");
    assert!(dividend.div_exact(&divisor).is_none());
}

#[test]
fn polynomial_gcd_is_monic() {
    let a = poly("x^2 - 1");
    let b = poly("x^2 - x");
    let gcd = Poly::gcd(&a, &b);
    assert_eq!(gcd, poly("x - 1"));
}

#[test]
fn polynomial_gcd_ignores_content() {
    let a = poly("2*x^2 + 2*x");
    let b = poly("4*x");
    let gcd = Poly::gcd(&a, &b);
    assert_eq!(gcd, poly("x"));
}

#[test]
fn polynomial_content_and_primitive_part() {
    let polynomial = poly("2/3*x^2 + 4/3*x + 2/3");
    let (content, primitive) = polynomial.content_and_primitive_part();
    assert_eq!(content, Rational::new(2.into(), 3.into()));
    assert_eq!(primitive, poly("x^2 + 2*x + 1"));
    assert_eq!(primitive.scale(&content), polynomial);
}

#[test]
fn polynomial_content_sign_normalizes_leading_coeff() {
    let polynomial = poly("-2*x^2 - 4*x");
    let (content, primitive) = polynomial.content_and_primitive_part();
    assert_eq!(content, Rational::from_integer((-2).into()));
    assert_eq!(primitive, poly("x^2 + 2*x"));
    assert_eq!(primitive.scale(&content), polynomial);
}

#[test]
fn polynomial_content_zero_is_zero() {
    let polynomial = poly("0");
    let (content, primitive) = polynomial.content_and_primitive_part();
    assert!(content.is_zero());
    assert!(primitive.is_zero());
}

#[test]
fn square_free_decomposition_groups_by_multiplicity() {
    // (x - 1)^2 (x + 2)^3 (x - 3)
    let polynomial = poly("(x - 1)^2 * (x + 2)^3 * (x - 3)");
    let factors = polynomial.square_free_decomposition();
    assert_eq!(
        factors,
        vec![(poly("x - 3"), 1), (poly("x - 1"), 2), (poly("x + 2"), 3)]
    );
}

#[test]
fn rational_roots_with_repetition() {
    let polynomial = poly("6*x^3 - 5*x^2 - 2*x + 1");
    let mut roots = polynomial.rational_roots();
    roots.sort();
    assert_eq!(roots, vec![rational(-1, 2), rational(1, 3), rational(1, 1)]);

    let repeated = poly("x^3 - 3*x + 2");
    let mut roots = repeated.rational_roots();
    roots.sort();
    assert_eq!(roots, vec![rational(-2, 1), rational(1, 1), rational(1, 1)]);
}

#[test]
fn irreducible_quadratic_has_no_rational_roots() {
    assert!(poly("x^2 - x - 1").rational_roots().is_empty());
}

#[test]
fn shift_and_evaluate_agree() {
    let polynomial = poly("x^3 - 2*x + 5");
    let shifted = polynomial.shift(&rational(2, 1));
    for k in -3..=3 {
        let at = rational(k, 1);
        assert_eq!(shifted.evaluate(&at), polynomial.evaluate(&(at.clone() + rational(2, 1))));
    }
}
