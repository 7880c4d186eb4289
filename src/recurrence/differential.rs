use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::error::{MomentError, Result};
use crate::multipoly::Monomial;
use crate::program::{ensure_symbol_free, Program, StatePoly};
use crate::ratfunc::RatFunc;

use super::{MomentResolver, NameAllocator, Resolver};

/// Resolver for `∂/∂p E[m]` alongside the plain moments.
///
/// A monomial multiplied by the fresh tag symbol `δ` stands for the derivative
/// of its moment with respect to the parameter; untagged monomials resolve as
/// usual.
#[derive(Debug)]
pub struct DifferentialResolver<'p> {
    inner: Resolver<'p>,
    parameter: String,
    tag: String,
    dependent: BTreeSet<String>,
    recurrences: HashMap<Monomial, StatePoly>,
}

impl<'p> DifferentialResolver<'p> {
    pub fn new(program: &'p Program, parameter: &str, names: &mut NameAllocator) -> Result<Self> {
        if !program.is_parameter(parameter) {
            return Err(MomentError::InvalidProgram(format!(
                "{parameter} is not a parameter of the program"
            )));
        }
        for name in program.variables().into_iter().chain(program.parameters().iter().cloned()) {
            names.reserve(name);
        }
        let tag = names.fresh(&format!("d{parameter}_"));
        let dependent = dependent_variables(program, parameter);
        for statement in program.initial().iter().chain(program.body()) {
            ensure_symbol_free(&statement.assignment, parameter, &dependent)?;
        }
        debug!(parameter, tag = %tag, dependent = dependent.len(), "differential resolver ready");
        Ok(DifferentialResolver {
            inner: Resolver::new(program),
            parameter: parameter.to_string(),
            tag,
            dependent,
            recurrences: HashMap::new(),
        })
    }

    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Variables whose distribution varies with the parameter.
    pub fn dependent_variables(&self) -> &BTreeSet<String> {
        &self.dependent
    }

    /// The monomial standing for `∂/∂p E[monomial]`.
    pub fn tagged(&self, monomial: &Monomial) -> Monomial {
        monomial.mul(&Monomial::var(self.tag.clone()))
    }

    fn is_dependent(&self, monomial: &Monomial) -> bool {
        monomial.symbols().any(|s| self.dependent.contains(s))
    }

    fn untag(&self, monomial: &Monomial) -> Result<Option<Monomial>> {
        match monomial.split(&self.tag) {
            (0, _) => Ok(None),
            (1, plain) => Ok(Some(plain)),
            (exp, _) => Err(MomentError::Unsupported(format!(
                "derivative tag raised to power {exp} in {monomial}"
            ))),
        }
    }
}

impl MomentResolver for DifferentialResolver<'_> {
    fn get_recurrence(&mut self, monomial: &Monomial) -> Result<StatePoly> {
        let Some(plain) = self.untag(monomial)? else {
            return self.inner.get_recurrence(monomial);
        };
        if let Some(cached) = self.recurrences.get(monomial) {
            return Ok(cached.clone());
        }
        let raw = self.inner.get_recurrence(&plain)?;
        let mut result = StatePoly::zero();
        let involves_parameter = raw.terms().any(|(term, coeff)| {
            coeff.contains_symbol(&self.parameter) || self.is_dependent(term)
        });
        if involves_parameter {
            // d/dp (c·E[m]) = c'·E[m] + c·d/dp E[m]
            for (term, coeff) in raw.terms() {
                result.add_term(term.clone(), coeff.derivative(&self.parameter));
                if self.is_dependent(term) {
                    result.add_term(self.tagged(term), coeff.clone());
                }
            }
        }
        self.recurrences.insert(monomial.clone(), result.clone());
        Ok(result)
    }

    fn get_initial_value(&mut self, monomial: &Monomial) -> Result<RatFunc> {
        match self.untag(monomial)? {
            Some(plain) => Ok(self
                .inner
                .get_initial_value(&plain)?
                .derivative(&self.parameter)),
            None => self.inner.get_initial_value(monomial),
        }
    }
}

/// Variables reading the parameter or another such variable, in either block.
fn dependent_variables(program: &Program, parameter: &str) -> BTreeSet<String> {
    let mut dependent = BTreeSet::new();
    loop {
        let before = dependent.len();
        for statement in program.initial().iter().chain(program.body()) {
            if dependent.contains(&statement.variable) {
                continue;
            }
            let reads = statement.assignment.free_symbols();
            if reads.contains(parameter) || reads.iter().any(|s| dependent.contains(s)) {
                dependent.insert(statement.variable.clone());
            }
        }
        if dependent.len() == before {
            return dependent;
        }
    }
}
