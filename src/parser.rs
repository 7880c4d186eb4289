use crate::error::{MomentError, Result};
use crate::expr::{Expr, Rational};
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{alpha1, char, digit1, multispace0, satisfy};
use nom::combinator::{all_consuming, map, map_res, recognize};
use nom::error::VerboseError;
use nom::multi::{fold_many0, many0_count};
use nom::sequence::{delimited, pair, preceded, separated_pair, tuple};
use nom::IResult;
use num_bigint::BigInt;
use num_traits::{Num, Zero};

pub fn parse_expr(input: &str) -> Result<Expr> {
    match all_consuming(ws(parse_add_sub))(input) {
        Ok((_, expr)) => Ok(expr),
        Err(e) => Err(MomentError::Parse(format!("{input:?}: {e:?}"))),
    }
}

fn parse_add_sub(input: &str) -> IResult<&str, Expr, VerboseError<&str>> {
    let (rest, init) = parse_mul_div(input)?;
    fold_many0(
        pair(ws(alt((char('+'), char('-')))), parse_mul_div),
        move || init.clone(),
        |acc, (op, rhs)| match op {
            '+' => Expr::Add(acc.boxed(), rhs.boxed()),
            _ => Expr::Sub(acc.boxed(), rhs.boxed()),
        },
    )(rest)
}

fn parse_mul_div(input: &str) -> IResult<&str, Expr, VerboseError<&str>> {
    let (rest, init) = parse_unary(input)?;
    fold_many0(
        pair(ws(alt((char('*'), char('/')))), parse_unary),
        move || init.clone(),
        |acc, (op, rhs)| match op {
            '*' => Expr::Mul(acc.boxed(), rhs.boxed()),
            _ => Expr::Div(acc.boxed(), rhs.boxed()),
        },
    )(rest)
}

// Unary minus binds looser than `^`: `-y^2` is `-(y^2)`.
fn parse_unary(input: &str) -> IResult<&str, Expr, VerboseError<&str>> {
    if let Ok((rest, expr)) = preceded(ws(char('-')), parse_unary)(input) {
        Ok((rest, expr.negate()))
    } else {
        parse_pow(input)
    }
}

fn parse_pow(input: &str) -> IResult<&str, Expr, VerboseError<&str>> {
    let (rest, base) = parse_primary(input)?;
    if let Ok((next, exp)) = preceded(ws(alt((tag("^"), tag("**")))), parse_unary)(rest) {
        Ok((next, Expr::Pow(base.boxed(), exp.boxed())))
    } else {
        Ok((rest, base))
    }
}

fn parse_primary(input: &str) -> IResult<&str, Expr, VerboseError<&str>> {
    alt((
        parse_parens,
        parse_fraction,
        parse_function,
        parse_decimal,
        parse_number,
        parse_identifier,
    ))(input)
}

fn parse_parens(input: &str) -> IResult<&str, Expr, VerboseError<&str>> {
    delimited(ws(char('(')), parse_add_sub, ws(char(')')))(input)
}

fn parse_fraction(input: &str) -> IResult<&str, Expr, VerboseError<&str>> {
    map_res(
        separated_pair(parse_int, ws(char('/')), parse_int),
        |(n, d)| {
            if d.is_zero() {
                Err("zero denominator")
            } else {
                Ok(Expr::Constant(Rational::new(n, d)))
            }
        },
    )(input)
}

fn parse_decimal(input: &str) -> IResult<&str, Expr, VerboseError<&str>> {
    map_res(
        ws(recognize(tuple((digit1, char('.'), digit1)))),
        |s: &str| -> std::result::Result<Expr, num_bigint::ParseBigIntError> {
            let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
            let digits = BigInt::from_str_radix(&format!("{whole}{frac}"), 10)?;
            let scale = num_traits::pow(BigInt::from(10), frac.len());
            Ok(Expr::Constant(Rational::new(digits, scale)))
        },
    )(input)
}

fn parse_number(input: &str) -> IResult<&str, Expr, VerboseError<&str>> {
    map(parse_int, |n| Expr::Constant(Rational::from_integer(n)))(input)
}

fn parse_identifier(input: &str) -> IResult<&str, Expr, VerboseError<&str>> {
    map(
        ws(recognize(pair(
            alt((alpha1, tag("_"))),
            many0_count(satisfy(|c| c.is_alphanumeric() || c == '_')),
        ))),
        |s: &str| Expr::Variable(s.to_string()),
    )(input)
}

fn parse_function(input: &str) -> IResult<&str, Expr, VerboseError<&str>> {
    let (rest, (name, arg)) = pair(
        alt((tag("sin"), tag("cos"), tag("exp"), tag("log"))),
        delimited(ws(char('(')), parse_add_sub, ws(char(')'))),
    )(input)?;

    let expr = match name {
        "sin" => Expr::Sin(arg.boxed()),
        "cos" => Expr::Cos(arg.boxed()),
        "exp" => Expr::Exp(arg.boxed()),
        _ => Expr::Log(arg.boxed()),
    };

    Ok((rest, expr))
}

fn parse_int(input: &str) -> IResult<&str, BigInt, VerboseError<&str>> {
    map_res(ws(digit1), |s: &str| {
        BigInt::from_str_radix(s, 10)
    })(input)
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O, VerboseError<&'a str>>
where
    F: FnMut(&'a str) -> IResult<&'a str, O, VerboseError<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

/// Read a rational literal such as `3`, `-1/2` or `0.25`.
pub fn parse_rational(input: &str) -> Result<Rational> {
    fn fold(expr: &Expr) -> Option<Rational> {
        match expr {
            Expr::Constant(r) => Some(r.clone()),
            Expr::Neg(inner) => fold(inner).map(|r| -r),
            Expr::Div(a, b) => {
                let denom = fold(b)?;
                if denom.is_zero() {
                    None
                } else {
                    Some(fold(a)? / denom)
                }
            }
            Expr::Mul(a, b) => Some(fold(a)? * fold(b)?),
            _ => None,
        }
    }
    let expr = parse_expr(input)?;
    fold(&expr).ok_or_else(|| MomentError::Parse(format!("{input:?} is not a rational literal")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::rational;
    use crate::format::pretty;

    #[test]
    fn decimals_become_exact_rationals() {
        assert_eq!(parse_expr("0.5").unwrap(), Expr::Constant(rational(1, 2)));
        assert_eq!(parse_rational("-0.25").unwrap(), rational(-1, 4));
    }

    #[test]
    fn identifiers_accept_underscores_and_digits() {
        assert_eq!(parse_expr("x_1").unwrap(), Expr::var("x_1"));
    }

    #[test]
    fn minus_binds_looser_than_power() {
        let square = Expr::Pow(Expr::var("y").boxed(), Expr::integer(2).boxed());
        assert_eq!(parse_expr("-y^2").unwrap(), Expr::Neg(square.boxed()));
        assert_eq!(pretty(&parse_expr("-2^2").unwrap()), "-2^2");
        assert_eq!(
            parse_expr("2^-1").unwrap(),
            Expr::Pow(Expr::integer(2).boxed(), Expr::integer(-1).boxed())
        );
    }

    #[test]
    fn unit_fraction_is_a_literal() {
        assert_eq!(parse_rational("1/3").unwrap(), rational(1, 3));
        assert!(parse_rational("1/0").is_err());
    }
}
