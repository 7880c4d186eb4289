//! Normalised probabilistic loop programs: an initialisation block and a loop
//! body of single-assignment statements over polynomial state.

mod assignment;
mod distribution;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub use assignment::{Assignment, TrigFunction};
pub(crate) use assignment::ensure_symbol_free;
pub use distribution::Distribution;

use crate::error::{MomentError, Result};
use crate::expr::{Expr, Rational};
use crate::multipoly::MultiPoly;
use crate::parser::parse_expr;
use crate::polynomial::{CoeffOps, Poly};
use crate::ratfunc::{is_atom, RatFunc};

/// Polynomial in program variables with coefficients in the parameters.
pub type StatePoly = MultiPoly<RatFunc>;

#[derive(Clone, Debug)]
pub struct Statement {
    pub variable: String,
    pub assignment: Assignment,
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.assignment {
            Assignment::Distribution(_) => "~",
            _ => "=",
        };
        write!(f, "{} {op} {}", self.variable, self.assignment)
    }
}

#[derive(Clone, Debug)]
pub struct Program {
    initial: Vec<Statement>,
    body: Vec<Statement>,
    parameters: BTreeSet<String>,
}

impl Program {
    pub fn builder() -> ProgramBuilder {
        ProgramBuilder::default()
    }

    pub fn initial(&self) -> &[Statement] {
        &self.initial
    }

    pub fn body(&self) -> &[Statement] {
        &self.body
    }

    pub fn parameters(&self) -> &BTreeSet<String> {
        &self.parameters
    }

    pub fn is_parameter(&self, name: &str) -> bool {
        self.parameters.contains(name)
    }

    /// Every variable assigned in either block.
    pub fn variables(&self) -> BTreeSet<String> {
        self.initial
            .iter()
            .chain(&self.body)
            .map(|s| s.variable.clone())
            .collect()
    }

    /// Position of the body statement assigning `variable`.
    pub fn body_index(&self, variable: &str) -> Option<usize> {
        self.body.iter().position(|s| s.variable == variable)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.initial {
            writeln!(f, "{statement}")?;
        }
        writeln!(f, "while true:")?;
        for statement in &self.body {
            writeln!(f, "    {statement}")?;
        }
        Ok(())
    }
}

/// Collects statements; parameters must be declared before statements that use
/// them, since text is split into variables and parameters while parsing.
#[derive(Clone, Debug, Default)]
pub struct ProgramBuilder {
    initial: Vec<Statement>,
    body: Vec<Statement>,
    parameters: BTreeSet<String>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        ProgramBuilder::default()
    }

    pub fn parameter(mut self, name: impl Into<String>) -> Self {
        self.parameters.insert(name.into());
        self
    }

    pub fn parameters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters.extend(names.into_iter().map(Into::into));
        self
    }

    /// Parse a polynomial over the variables, with the declared parameters as
    /// coefficients.
    pub fn poly(&self, input: &str) -> Result<StatePoly> {
        state_poly_from_expr(&parse_expr(input)?, &self.parameters)
    }

    /// `variable = expr` before the loop.
    pub fn init(self, variable: &str, expr: &str) -> Result<Self> {
        let poly = self.poly(expr)?;
        Ok(self.init_with(variable, Assignment::Polynomial(poly)))
    }

    pub fn init_with(mut self, variable: &str, assignment: Assignment) -> Self {
        self.initial.push(Statement {
            variable: variable.to_string(),
            assignment,
        });
        self
    }

    /// `variable = expr` in the loop body.
    pub fn assign(self, variable: &str, expr: &str) -> Result<Self> {
        let poly = self.poly(expr)?;
        Ok(self.statement(variable, Assignment::Polynomial(poly)))
    }

    /// `variable ~ name(args…)` in the loop body.
    pub fn sample(self, variable: &str, name: &str, args: &[&str]) -> Result<Self> {
        let dist = self.distribution(name, args)?;
        Ok(self.statement(variable, Assignment::Distribution(dist)))
    }

    /// `variable = e1 {p1} e2 {p2} …` in the loop body.
    pub fn categorical(self, variable: &str, branches: &[(&str, &str)]) -> Result<Self> {
        let branches = branches
            .iter()
            .map(|(value, prob)| Ok((self.poly(value)?, self.poly(prob)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.statement(variable, Assignment::Categorical(branches)))
    }

    /// `variable = f(u)` with `u ~ name(args…)`; `function` is a polynomial in `u`.
    pub fn functional(
        self,
        variable: &str,
        function: &str,
        name: &str,
        args: &[&str],
    ) -> Result<Self> {
        let function = univariate_from_expr(&parse_expr(function)?, "u")?;
        let distribution = self.distribution(name, args)?;
        Ok(self.statement(
            variable,
            Assignment::Functional {
                function,
                distribution,
            },
        ))
    }

    /// `variable = sin(D)` or `variable = cos(D)`.
    pub fn trigonometric(
        self,
        variable: &str,
        function: TrigFunction,
        name: &str,
        args: &[&str],
    ) -> Result<Self> {
        let distribution = self.distribution(name, args)?;
        Ok(self.statement(
            variable,
            Assignment::Trigonometric {
                function,
                distribution,
            },
        ))
    }

    pub fn statement(mut self, variable: &str, assignment: Assignment) -> Self {
        self.body.push(Statement {
            variable: variable.to_string(),
            assignment,
        });
        self
    }

    fn distribution(&self, name: &str, args: &[&str]) -> Result<Distribution> {
        let args = args
            .iter()
            .map(|a| self.poly(a))
            .collect::<Result<Vec<_>>>()?;
        Distribution::from_parts(name, args)
    }

    pub fn build(self) -> Result<Program> {
        for (block, statements) in [("initialisation", &self.initial), ("loop body", &self.body)] {
            let mut seen = BTreeSet::new();
            for statement in statements {
                if self.parameters.contains(&statement.variable) {
                    return Err(MomentError::InvalidProgram(format!(
                        "parameter {} is assigned in the {block}",
                        statement.variable
                    )));
                }
                if !seen.insert(statement.variable.as_str()) {
                    return Err(MomentError::InvalidProgram(format!(
                        "{} is assigned more than once in the {block}",
                        statement.variable
                    )));
                }
            }
        }
        if let Some(name) = self.parameters.iter().find(|p| is_atom(p)) {
            return Err(MomentError::InvalidProgram(format!("invalid parameter name {name}")));
        }
        Ok(Program {
            initial: self.initial,
            body: self.body,
            parameters: self.parameters,
        })
    }
}

/// Convert an expression into a state polynomial. Identifiers in `parameters`
/// become coefficient symbols, transcendental functions of constants become
/// atoms, and division is allowed by anything free of program variables.
pub fn state_poly_from_expr(expr: &Expr, parameters: &BTreeSet<String>) -> Result<StatePoly> {
    let recurse = |e: &Expr| state_poly_from_expr(e, parameters);
    let poly = match expr {
        Expr::Variable(name) if parameters.contains(name) => {
            StatePoly::constant(RatFunc::symbol(name.clone()))
        }
        Expr::Variable(name) => StatePoly::var(name.clone()),
        Expr::Constant(c) => StatePoly::constant(RatFunc::constant(c.clone())),
        Expr::Add(a, b) => recurse(a)?.add(&recurse(b)?),
        Expr::Sub(a, b) => recurse(a)?.sub(&recurse(b)?),
        Expr::Mul(a, b) => recurse(a)?.mul(&recurse(b)?),
        Expr::Neg(a) => recurse(a)?.neg(),
        Expr::Div(a, b) => {
            let denominator = constant_of(&recurse(b)?, "divisor")?;
            if denominator.is_zero() {
                return Err(MomentError::DivisionByZero(expr.to_string()));
            }
            recurse(a)?.scale(&RatFunc::one().div(&denominator))
        }
        Expr::Pow(base, exp) => {
            let power = match &**exp {
                Expr::Constant(c) if c.is_integer() => u32::try_from(c.to_integer()).ok(),
                _ => None,
            }
            .ok_or_else(|| {
                MomentError::Unsupported(format!("non-natural exponent in {expr}"))
            })?;
            recurse(base)?.pow(power)
        }
        Expr::Sin(arg) | Expr::Cos(arg) | Expr::Exp(arg) | Expr::Log(arg) => match &**arg {
            Expr::Constant(_) => StatePoly::constant(RatFunc::atom(expr)),
            Expr::Neg(inner) if matches!(**inner, Expr::Constant(_)) => {
                StatePoly::constant(RatFunc::atom(expr))
            }
            _ => {
                return Err(MomentError::Unsupported(format!(
                    "transcendental function of a non-constant in {expr}"
                )))
            }
        },
    };
    Ok(poly)
}

fn univariate_from_expr(expr: &Expr, var: &str) -> Result<Poly> {
    let poly = MultiPoly::<Rational>::from_expr(expr)
        .ok_or_else(|| MomentError::Unsupported(format!("{expr} is not a polynomial")))?;
    poly.as_univariate(var)
        .ok_or_else(|| MomentError::InvalidProgram(format!("{expr} must be a polynomial in {var}")))
}

/// The coefficient of a polynomial that must not read program variables.
pub(crate) fn constant_of(poly: &StatePoly, what: &str) -> Result<RatFunc> {
    if poly.is_constant() {
        Ok(poly.constant_term())
    } else {
        Err(MomentError::Unsupported(format!(
            "{what} {} depends on program variables",
            render(poly)
        )))
    }
}

/// Program variables and parameters occurring in `poly`; atoms are skipped.
pub fn state_symbols(poly: &StatePoly) -> BTreeSet<String> {
    let mut symbols = poly.symbols();
    for (_, coeff) in poly.terms() {
        symbols.extend(coeff.symbols().into_iter().filter(|s| !is_atom(s)));
    }
    symbols
}

pub(crate) fn render(poly: &StatePoly) -> String {
    poly.to_expr_with(RatFunc::to_expr).to_string()
}

/// Values for every program variable and parameter, used to evaluate a
/// state polynomial numerically.
pub fn evaluate_state(poly: &StatePoly, values: &BTreeMap<String, f64>) -> Result<f64> {
    let lookup = |name: &str| values.get(name).copied();
    let mut total = 0.0;
    for (monomial, coeff) in poly.terms() {
        let mut term = coeff.to_f64(&lookup)?;
        for (name, exp) in monomial.powers() {
            let value = lookup(name).ok_or_else(|| MomentError::Unbound(name.to_string()))?;
            term *= value.powi(exp as i32);
        }
        total += term;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_become_coefficients() {
        let builder = ProgramBuilder::new().parameter("p");
        let poly = builder.poly("p*x + 1/2").unwrap();
        assert_eq!(poly.symbols().into_iter().collect::<Vec<_>>(), vec!["x"]);
        assert!(state_symbols(&poly).contains("p"));
    }

    #[test]
    fn division_by_parameters_is_allowed() {
        let builder = ProgramBuilder::new().parameter("p");
        let poly = builder.poly("x/(1 - p)").unwrap();
        let coeff = poly.coefficient(&crate::multipoly::Monomial::var("x"));
        assert_eq!(coeff, RatFunc::one().div(&RatFunc::one().sub(&RatFunc::symbol("p"))));
        assert!(builder.poly("1/x").is_err());
    }

    #[test]
    fn double_assignment_is_rejected() {
        let result = ProgramBuilder::new()
            .assign("x", "x + 1")
            .and_then(|b| b.assign("x", "x + 2"))
            .and_then(ProgramBuilder::build);
        assert!(matches!(result, Err(MomentError::InvalidProgram(_))));
    }

    #[test]
    fn constant_transcendentals_are_atoms() {
        let poly = ProgramBuilder::new().poly("cos(1)*x").unwrap();
        let coeff = poly.coefficient(&crate::multipoly::Monomial::var("x"));
        let value = coeff.to_f64(&|_| None).unwrap();
        assert!((value - 1f64.cos()).abs() < 1e-12);
        assert!(ProgramBuilder::new().poly("cos(x)").is_err());
    }
}
