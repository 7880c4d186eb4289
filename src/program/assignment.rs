use std::collections::BTreeSet;
use std::fmt;

use num_bigint::BigInt;

use crate::error::{MomentError, Result};
use crate::expr::Rational;
use crate::polynomial::{CoeffOps, Poly};
use crate::ratfunc::RatFunc;

use super::distribution::{binomial, Distribution};
use super::{render, state_symbols, StatePoly};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrigFunction {
    Sin,
    Cos,
}

/// Right-hand side of a single-assignment statement.
#[derive(Clone, Debug)]
pub enum Assignment {
    /// `x = f(state)`.
    Polynomial(StatePoly),
    /// `x = e1 {p1} e2 {p2} …`: branch `i` is taken with probability `pᵢ`.
    Categorical(Vec<(StatePoly, StatePoly)>),
    /// `x ~ D`.
    Distribution(Distribution),
    /// `x = f(D)` for a univariate polynomial `f`.
    Functional { function: Poly, distribution: Distribution },
    /// `x = sin(D)` or `x = cos(D)`.
    Trigonometric { function: TrigFunction, distribution: Distribution },
}

impl Assignment {
    /// Whether the assigned value is a plain function of the state.
    pub fn is_deterministic(&self) -> bool {
        matches!(self, Assignment::Polynomial(_))
    }

    pub fn distribution(&self) -> Option<&Distribution> {
        match self {
            Assignment::Distribution(d)
            | Assignment::Functional { distribution: d, .. }
            | Assignment::Trigonometric { distribution: d, .. } => Some(d),
            _ => None,
        }
    }

    /// Expected value of `variable^power` produced by this assignment, in
    /// terms of the state just before it executes.
    pub fn get_moment(&self, power: u32) -> Result<StatePoly> {
        if power == 0 {
            return Ok(StatePoly::one());
        }
        match self {
            Assignment::Polynomial(poly) => Ok(poly.pow(power)),
            Assignment::Categorical(branches) => {
                Ok(branches.iter().fold(StatePoly::zero(), |acc, (value, prob)| {
                    acc.add(&prob.mul(&value.pow(power)))
                }))
            }
            Assignment::Distribution(dist) => dist.moment(power),
            Assignment::Functional {
                function,
                distribution,
            } => {
                let expanded = function.pow(power as usize);
                let mut result = StatePoly::zero();
                for (exp, coeff) in expanded.coeff_entries() {
                    let moment = distribution.moment(exp as u32)?;
                    result = result.add(&moment.scale(&RatFunc::constant(coeff)));
                }
                Ok(result)
            }
            Assignment::Trigonometric {
                function,
                distribution,
            } => trig_moment(*function, distribution, power).map(StatePoly::constant),
        }
    }

    /// Variables and parameters this assignment reads.
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut symbols = BTreeSet::new();
        match self {
            Assignment::Polynomial(poly) => symbols.extend(state_symbols(poly)),
            Assignment::Categorical(branches) => {
                for (value, prob) in branches {
                    symbols.extend(state_symbols(value));
                    symbols.extend(state_symbols(prob));
                }
            }
            Assignment::Distribution(dist)
            | Assignment::Functional {
                distribution: dist, ..
            }
            | Assignment::Trigonometric {
                distribution: dist, ..
            } => {
                for param in dist.parameters() {
                    symbols.extend(state_symbols(&param));
                }
            }
        }
        symbols
    }
}

/// `E[sin(X)^k]` or `E[cos(X)^k]` through the characteristic function:
/// `cosᵏθ = 2⁻ᵏ Σ_m C(k,m) e^{i(k-2m)θ}` and
/// `sinᵏθ = (2i)⁻ᵏ Σ_m C(k,m) (-1)^m e^{i(k-2m)θ}`.
fn trig_moment(function: TrigFunction, distribution: &Distribution, power: u32) -> Result<RatFunc> {
    let mut re = RatFunc::zero();
    let mut im = RatFunc::zero();
    for m in 0..=power {
        let freq = i64::from(power) - 2 * i64::from(m);
        let (c, s) = distribution.characteristic(freq)?;
        let mut weight = binomial(power, m);
        if function == TrigFunction::Sin && m % 2 == 1 {
            weight = weight.neg();
        }
        re = re.add(&weight.mul(&c));
        im = im.add(&weight.mul(&s));
    }
    let value = match function {
        TrigFunction::Cos => re,
        // Real part of (-i)^k (re + i·im).
        TrigFunction::Sin => match power % 4 {
            0 => re,
            1 => im,
            2 => re.neg(),
            _ => im.neg(),
        },
    };
    let denominator = num_traits::pow(BigInt::from(2), power as usize);
    let scale = RatFunc::constant(Rational::new(BigInt::from(1), denominator));
    Ok(value.mul(&scale))
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assignment::Polynomial(poly) => write!(f, "{}", render(poly)),
            Assignment::Categorical(branches) => {
                let parts: Vec<String> = branches
                    .iter()
                    .map(|(value, prob)| format!("{} {{{}}}", render(value), render(prob)))
                    .collect();
                write!(f, "{}", parts.join(" "))
            }
            Assignment::Distribution(dist) => write!(f, "{dist}"),
            Assignment::Functional {
                function,
                distribution,
            } => {
                let shown = function.to_expr_with("u", |c| crate::expr::Expr::Constant(c.clone()));
                write!(f, "({shown})[u ~ {distribution}]")
            }
            Assignment::Trigonometric {
                function,
                distribution,
            } => {
                let name = match function {
                    TrigFunction::Sin => "sin",
                    TrigFunction::Cos => "cos",
                };
                write!(f, "{name}({distribution})")
            }
        }
    }
}

/// Reject trigonometric and functional assignments whose distribution reads `symbol`.
pub(crate) fn ensure_symbol_free(
    assignment: &Assignment,
    symbol: &str,
    dependent: &BTreeSet<String>,
) -> Result<()> {
    let reads = |dist: &Distribution| {
        dist.parameters().iter().any(|param| {
            let symbols = state_symbols(param);
            symbols.contains(symbol) || symbols.iter().any(|s| dependent.contains(s))
        })
    };
    match assignment {
        Assignment::Functional { distribution, .. }
        | Assignment::Trigonometric { distribution, .. }
            if reads(distribution) =>
        {
            Err(MomentError::Unsupported(format!(
                "derivative through {assignment} whose distribution depends on {symbol}"
            )))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(value: i64) -> StatePoly {
        StatePoly::constant(RatFunc::integer(value))
    }

    #[test]
    fn categorical_mixes_branch_powers() {
        // x = (y + 1) {1/2} (y - 1) {1/2}; E[x^2] = y^2 + 1
        let half = StatePoly::constant(RatFunc::ratio(1, 2));
        let y = StatePoly::var("y");
        let assignment = Assignment::Categorical(vec![
            (y.add(&constant(1)), half.clone()),
            (y.sub(&constant(1)), half),
        ]);
        let expected = y.pow(2).add(&constant(1));
        assert_eq!(assignment.get_moment(2).unwrap(), expected);
        assert_eq!(assignment.get_moment(1).unwrap(), y);
    }

    #[test]
    fn functional_of_uniform() {
        // u^2 with u ~ Uniform(0, 1): E[u^2] = 1/3, E[u^4] = 1/5
        let square = Poly::monomial(Rational::new(1.into(), 1.into()), 2);
        let assignment = Assignment::Functional {
            function: square,
            distribution: Distribution::Uniform {
                low: constant(0),
                high: constant(1),
            },
        };
        assert_eq!(
            assignment.get_moment(1).unwrap(),
            StatePoly::constant(RatFunc::ratio(1, 3))
        );
        assert_eq!(
            assignment.get_moment(2).unwrap(),
            StatePoly::constant(RatFunc::ratio(1, 5))
        );
    }

    #[test]
    fn trigonometric_moments_of_a_normal() {
        let dist = Distribution::Normal {
            mean: constant(1),
            variance: constant(1),
        };
        let cos = Assignment::Trigonometric {
            function: TrigFunction::Cos,
            distribution: dist.clone(),
        };
        let sin_squared = Assignment::Trigonometric {
            function: TrigFunction::Sin,
            distribution: dist,
        };
        let value = |a: &Assignment, k| {
            a.get_moment(k)
                .unwrap()
                .constant_term()
                .to_f64(&|_| None)
                .unwrap()
        };
        // E[cos X] = e^{-1/2} cos 1
        assert!((value(&cos, 1) - (-0.5f64).exp() * 1f64.cos()).abs() < 1e-12);
        // E[sin^2 X] = (1 - e^{-2} cos 2) / 2
        let expected = (1.0 - (-2f64).exp() * 2f64.cos()) / 2.0;
        assert!((value(&sin_squared, 2) - expected).abs() < 1e-12);
    }

    #[test]
    fn free_symbols_cover_parameters_and_variables() {
        let poly = StatePoly::var("x").scale(&RatFunc::symbol("p"));
        let symbols = Assignment::Polynomial(poly).free_symbols();
        assert!(symbols.contains("x"));
        assert!(symbols.contains("p"));
    }
}
