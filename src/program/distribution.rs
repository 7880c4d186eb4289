use std::fmt;

use num_bigint::BigInt;

use crate::error::{MomentError, Result};
use crate::expr::{Expr, Rational};
use crate::polynomial::CoeffOps;
use crate::ratfunc::RatFunc;

use super::{constant_of, StatePoly};

/// Probability distributions a loop variable can be drawn from.
///
/// Distributions whose raw moments are polynomial in their parameters accept
/// parameters that read earlier program state.
#[derive(Clone, Debug)]
pub enum Distribution {
    Bernoulli { p: StatePoly },
    /// Values `0..probabilities.len()` with the given probabilities.
    Categorical { probabilities: Vec<RatFunc> },
    /// Integers `low..=high`, uniformly.
    DiscreteUniform { low: i64, high: i64 },
    Uniform { low: StatePoly, high: StatePoly },
    Normal { mean: StatePoly, variance: StatePoly },
    Laplace { location: StatePoly, scale: StatePoly },
    Exponential { rate: StatePoly },
    Gamma { shape: StatePoly, scale: StatePoly },
    Beta { alpha: StatePoly, beta: StatePoly },
    Binomial { trials: u32, p: StatePoly },
}

impl Distribution {
    /// Build from a distribution name and its positional arguments.
    pub fn from_parts(name: &str, args: Vec<StatePoly>) -> Result<Self> {
        let arity = |expected: usize| -> Result<()> {
            if args.len() == expected {
                Ok(())
            } else {
                Err(MomentError::InvalidProgram(format!(
                    "{name} takes {expected} arguments, got {}",
                    args.len()
                )))
            }
        };
        let mut it = args.iter().cloned();
        let mut next = || it.next().unwrap_or_else(StatePoly::zero);
        let dist = match name.to_ascii_lowercase().as_str() {
            "bernoulli" => {
                arity(1)?;
                Distribution::Bernoulli { p: next() }
            }
            "categorical" => Distribution::Categorical {
                probabilities: args
                    .iter()
                    .map(|a| constant_of(a, "categorical probability"))
                    .collect::<Result<_>>()?,
            },
            "discreteuniform" | "discrete_uniform" => {
                arity(2)?;
                Distribution::DiscreteUniform {
                    low: integer_of(&next(), "lower bound")?,
                    high: integer_of(&next(), "upper bound")?,
                }
            }
            "uniform" => {
                arity(2)?;
                Distribution::Uniform {
                    low: next(),
                    high: next(),
                }
            }
            "normal" => {
                arity(2)?;
                Distribution::Normal {
                    mean: next(),
                    variance: next(),
                }
            }
            "laplace" => {
                arity(2)?;
                Distribution::Laplace {
                    location: next(),
                    scale: next(),
                }
            }
            "exponential" => {
                arity(1)?;
                Distribution::Exponential { rate: next() }
            }
            "gamma" => {
                arity(2)?;
                Distribution::Gamma {
                    shape: next(),
                    scale: next(),
                }
            }
            "beta" => {
                arity(2)?;
                Distribution::Beta {
                    alpha: next(),
                    beta: next(),
                }
            }
            "binomial" => {
                arity(2)?;
                let trials = integer_of(&next(), "trial count")?;
                Distribution::Binomial {
                    trials: u32::try_from(trials).map_err(|_| {
                        MomentError::InvalidProgram(format!("negative trial count {trials}"))
                    })?,
                    p: next(),
                }
            }
            other => {
                return Err(MomentError::Unsupported(format!("distribution {other}")));
            }
        };
        Ok(dist)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Distribution::Bernoulli { .. } => "Bernoulli",
            Distribution::Categorical { .. } => "Categorical",
            Distribution::DiscreteUniform { .. } => "DiscreteUniform",
            Distribution::Uniform { .. } => "Uniform",
            Distribution::Normal { .. } => "Normal",
            Distribution::Laplace { .. } => "Laplace",
            Distribution::Exponential { .. } => "Exponential",
            Distribution::Gamma { .. } => "Gamma",
            Distribution::Beta { .. } => "Beta",
            Distribution::Binomial { .. } => "Binomial",
        }
    }

    /// Parameters as polynomials, for symbol analysis.
    pub fn parameters(&self) -> Vec<StatePoly> {
        match self {
            Distribution::Bernoulli { p } | Distribution::Binomial { p, .. } => vec![p.clone()],
            Distribution::Categorical { probabilities } => probabilities
                .iter()
                .map(|p| StatePoly::constant(p.clone()))
                .collect(),
            Distribution::DiscreteUniform { .. } => Vec::new(),
            Distribution::Uniform { low, high } => vec![low.clone(), high.clone()],
            Distribution::Normal { mean, variance } => vec![mean.clone(), variance.clone()],
            Distribution::Laplace { location, scale } => vec![location.clone(), scale.clone()],
            Distribution::Exponential { rate } => vec![rate.clone()],
            Distribution::Gamma { shape, scale } => vec![shape.clone(), scale.clone()],
            Distribution::Beta { alpha, beta } => vec![alpha.clone(), beta.clone()],
        }
    }

    /// Raw moment `E[X^k]`.
    pub fn moment(&self, k: u32) -> Result<StatePoly> {
        if k == 0 {
            return Ok(StatePoly::one());
        }
        let moment = match self {
            Distribution::Bernoulli { p } => p.clone(),
            Distribution::Categorical { probabilities } => {
                let value = probabilities
                    .iter()
                    .enumerate()
                    .fold(RatFunc::zero(), |acc, (i, p)| {
                        acc.add(&p.mul(&RatFunc::integer(i as i64).powu(k.into())))
                    });
                StatePoly::constant(value)
            }
            Distribution::DiscreteUniform { low, high } => {
                if high < low {
                    return Err(MomentError::InvalidProgram(format!(
                        "empty support {low}..={high}"
                    )));
                }
                let total = (*low..=*high).fold(RatFunc::zero(), |acc, v| {
                    acc.add(&RatFunc::integer(v).powu(k.into()))
                });
                StatePoly::constant(total.div(&RatFunc::integer(high - low + 1)))
            }
            Distribution::Uniform { low, high } => {
                let mut sum = StatePoly::zero();
                for i in 0..=k {
                    sum = sum.add(&low.pow(i).mul(&high.pow(k - i)));
                }
                sum.scale(&RatFunc::one().div(&RatFunc::integer(i64::from(k) + 1)))
            }
            Distribution::Normal { mean, variance } => {
                let mut sum = StatePoly::zero();
                for j in (0..=k).step_by(2) {
                    let weight = binomial(k, j).mul(&double_factorial(j.saturating_sub(1)));
                    sum = sum.add(&mean.pow(k - j).mul(&variance.pow(j / 2)).scale(&weight));
                }
                sum
            }
            Distribution::Laplace { location, scale } => {
                let mut sum = StatePoly::zero();
                for j in (0..=k).step_by(2) {
                    let weight = binomial(k, j).mul(&factorial(j));
                    sum = sum.add(&location.pow(k - j).mul(&scale.pow(j)).scale(&weight));
                }
                sum
            }
            Distribution::Exponential { rate } => {
                let rate = constant_of(rate, "exponential rate")?;
                StatePoly::constant(factorial(k).div(&rate.powu(k.into())))
            }
            Distribution::Gamma { shape, scale } => {
                let mut rising = StatePoly::one();
                for i in 0..k {
                    rising = rising.mul(&shape.add(&StatePoly::constant(RatFunc::integer(i.into()))));
                }
                rising.mul(&scale.pow(k))
            }
            Distribution::Beta { alpha, beta } => {
                let alpha = constant_of(alpha, "beta shape")?;
                let beta = constant_of(beta, "beta shape")?;
                let mut value = RatFunc::one();
                for i in 0..k {
                    let i = RatFunc::integer(i.into());
                    value = value
                        .mul(&alpha.add(&i))
                        .div(&alpha.add(&beta).add(&i));
                }
                StatePoly::constant(value)
            }
            Distribution::Binomial { trials, p } => {
                // Σ_j S(k, j)·n(n-1)…(n-j+1)·p^j
                let mut sum = StatePoly::zero();
                for j in 1..=k.min(*trials) {
                    let falling = (0..j).fold(RatFunc::one(), |acc, i| {
                        acc.mul(&RatFunc::integer(i64::from(*trials) - i64::from(i)))
                    });
                    let weight = stirling_second(k, j).mul(&falling);
                    sum = sum.add(&p.pow(j).scale(&weight));
                }
                sum
            }
        };
        Ok(moment)
    }

    /// `(E[cos jX], E[sin jX])` for integer frequencies `j`. Only supported
    /// when every parameter is free of program variables; continuous
    /// distributions additionally need rational parameters.
    pub fn characteristic(&self, j: i64) -> Result<(RatFunc, RatFunc)> {
        if j == 0 {
            return Ok((RatFunc::one(), RatFunc::zero()));
        }
        let freq = Rational::from_integer(BigInt::from(j));
        match self {
            Distribution::Bernoulli { p } => {
                let p = constant_of(p, "bernoulli probability")?;
                let support = [
                    (Rational::from_integer(0.into()), RatFunc::one().sub(&p)),
                    (Rational::from_integer(1.into()), p),
                ];
                discrete_characteristic(&support, &freq)
            }
            Distribution::Categorical { probabilities } => {
                let support: Vec<_> = probabilities
                    .iter()
                    .enumerate()
                    .map(|(i, p)| (Rational::from_integer(BigInt::from(i)), p.clone()))
                    .collect();
                discrete_characteristic(&support, &freq)
            }
            Distribution::DiscreteUniform { low, high } => {
                if high < low {
                    return Err(MomentError::InvalidProgram(format!(
                        "empty support {low}..={high}"
                    )));
                }
                let weight = RatFunc::one().div(&RatFunc::integer(high - low + 1));
                let support: Vec<_> = (*low..=*high)
                    .map(|v| (Rational::from_integer(BigInt::from(v)), weight.clone()))
                    .collect();
                discrete_characteristic(&support, &freq)
            }
            Distribution::Binomial { trials, p } => {
                let p = constant_of(p, "binomial probability")?;
                let q = RatFunc::one().sub(&p);
                let support: Vec<_> = (0..=*trials)
                    .map(|v| {
                        let weight = binomial(*trials, v)
                            .mul(&p.powu(v.into()))
                            .mul(&q.powu((trials - v).into()));
                        (Rational::from_integer(BigInt::from(v)), weight)
                    })
                    .collect();
                discrete_characteristic(&support, &freq)
            }
            Distribution::Normal { mean, variance } => {
                let mean = rational_of(mean, "normal mean")?;
                let variance = rational_of(variance, "normal variance")?;
                let two = Rational::from_integer(2.into());
                let damping = exp_atom(-(variance * &freq * &freq) / two);
                let (c, s) = (cos_atom(&(&mean * &freq)), sin_atom(&(&mean * &freq)));
                Ok((damping.mul(&c), damping.mul(&s)))
            }
            Distribution::Laplace { location, scale } => {
                let location = rational_of(location, "laplace location")?;
                let scale = rational_of(scale, "laplace scale")?;
                let one = Rational::from_integer(1.into());
                let damping = RatFunc::constant(one.clone() / (one + &scale * &scale * &freq * &freq));
                let (c, s) = (
                    cos_atom(&(&location * &freq)),
                    sin_atom(&(&location * &freq)),
                );
                Ok((damping.mul(&c), damping.mul(&s)))
            }
            Distribution::Uniform { low, high } => {
                let low = rational_of(low, "uniform bound")?;
                let high = rational_of(high, "uniform bound")?;
                let width = RatFunc::constant((&high - &low) * &freq);
                if width.is_zero() {
                    let point = &low * &freq;
                    return Ok((cos_atom(&point), sin_atom(&point)));
                }
                let (a, b) = (&low * &freq, &high * &freq);
                let re = sin_atom(&b).sub(&sin_atom(&a)).div(&width);
                let im = cos_atom(&a).sub(&cos_atom(&b)).div(&width);
                Ok((re, im))
            }
            other => Err(MomentError::Unsupported(format!(
                "characteristic function of {}",
                other.name()
            ))),
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = match self {
            Distribution::DiscreteUniform { low, high } => vec![low.to_string(), high.to_string()],
            Distribution::Binomial { trials, p } => vec![trials.to_string(), super::render(p)],
            other => other.parameters().iter().map(super::render).collect(),
        };
        write!(f, "{}({})", self.name(), args.join(", "))
    }
}

fn discrete_characteristic(
    support: &[(Rational, RatFunc)],
    freq: &Rational,
) -> Result<(RatFunc, RatFunc)> {
    let mut re = RatFunc::zero();
    let mut im = RatFunc::zero();
    for (value, weight) in support {
        let angle = value * freq;
        re = re.add(&weight.mul(&cos_atom(&angle)));
        im = im.add(&weight.mul(&sin_atom(&angle)));
    }
    Ok((re, im))
}

fn rational_of(poly: &StatePoly, what: &str) -> Result<Rational> {
    constant_of(poly, what)?
        .as_rational()
        .ok_or_else(|| MomentError::Unsupported(format!("symbolic {what} in a characteristic function")))
}

fn integer_of(poly: &StatePoly, what: &str) -> Result<i64> {
    let value = rational_of(poly, what)?;
    if !value.is_integer() {
        return Err(MomentError::InvalidProgram(format!("{what} must be an integer, got {value}")));
    }
    num_traits::ToPrimitive::to_i64(&value.to_integer())
        .ok_or_else(|| MomentError::InvalidProgram(format!("{what} {value} is out of range")))
}

fn exp_atom(arg: Rational) -> RatFunc {
    RatFunc::atom(&Expr::Exp(Expr::Constant(arg).boxed()))
}

fn cos_atom(arg: &Rational) -> RatFunc {
    RatFunc::atom(&Expr::Cos(Expr::Constant(num_traits::Signed::abs(arg)).boxed()))
}

fn sin_atom(arg: &Rational) -> RatFunc {
    if num_traits::Signed::is_negative(arg) {
        return sin_atom(&-arg).neg();
    }
    RatFunc::atom(&Expr::Sin(Expr::Constant(arg.clone()).boxed()))
}

pub(crate) fn binomial(n: u32, k: u32) -> RatFunc {
    let value = num_integer::binomial(BigInt::from(n), BigInt::from(k));
    RatFunc::constant(Rational::from_integer(value))
}

fn factorial(n: u32) -> RatFunc {
    (1..=n).fold(RatFunc::one(), |acc, i| acc.mul(&RatFunc::integer(i.into())))
}

fn double_factorial(n: u32) -> RatFunc {
    (1..=n)
        .rev()
        .step_by(2)
        .fold(RatFunc::one(), |acc, i| acc.mul(&RatFunc::integer(i.into())))
}

/// Stirling number of the second kind.
fn stirling_second(n: u32, k: u32) -> RatFunc {
    let mut row = vec![BigInt::from(0); k as usize + 1];
    row[0] = BigInt::from(1);
    for _ in 0..n {
        for j in (1..=k as usize).rev() {
            row[j] = &row[j] * BigInt::from(j) + &row[j - 1];
        }
        row[0] = BigInt::from(0);
    }
    RatFunc::constant(Rational::from_integer(row[k as usize].clone()))
}
