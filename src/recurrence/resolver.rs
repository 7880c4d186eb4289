use std::collections::HashMap;

use tracing::trace;

use crate::error::Result;
use crate::multipoly::Monomial;
use crate::polynomial::CoeffOps;
use crate::program::{Assignment, Program, StatePoly, Statement};
use crate::ratfunc::RatFunc;

use super::MomentResolver;

/// Derives recurrences by substituting the loop body backwards into a monomial.
#[derive(Debug)]
pub struct Resolver<'p> {
    program: &'p Program,
    recurrences: HashMap<Monomial, StatePoly>,
    initial_values: HashMap<Monomial, RatFunc>,
}

impl<'p> Resolver<'p> {
    pub fn new(program: &'p Program) -> Self {
        Resolver {
            program,
            recurrences: HashMap::new(),
            initial_values: HashMap::new(),
        }
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }
}

impl MomentResolver for Resolver<'_> {
    fn get_recurrence(&mut self, monomial: &Monomial) -> Result<StatePoly> {
        if let Some(cached) = self.recurrences.get(monomial) {
            return Ok(cached.clone());
        }
        let body = self.program.body();
        let last = monomial
            .symbols()
            .filter_map(|var| self.program.body_index(var))
            .max();
        let start = StatePoly::term(RatFunc::one(), monomial.clone());
        let rhs = match last {
            Some(last) => substitute_backwards(&body[..=last], start)?,
            None => start,
        };
        trace!(monomial = %monomial, terms = rhs.len(), "recurrence resolved");
        self.recurrences.insert(monomial.clone(), rhs.clone());
        Ok(rhs)
    }

    fn get_initial_value(&mut self, monomial: &Monomial) -> Result<RatFunc> {
        if let Some(cached) = self.initial_values.get(monomial) {
            return Ok(cached.clone());
        }
        let start = StatePoly::term(RatFunc::one(), monomial.clone());
        // Variables the initialisation block leaves unassigned start at zero.
        let value = substitute_backwards(self.program.initial(), start)?.constant_term();
        self.initial_values.insert(monomial.clone(), value.clone());
        Ok(value)
    }
}

/// Walk `statements` in reverse, replacing each assigned variable by its
/// definition, or its powers by the moments of its distribution.
fn substitute_backwards(statements: &[Statement], mut expr: StatePoly) -> Result<StatePoly> {
    for statement in statements.iter().rev() {
        let var = statement.variable.as_str();
        if !expr.contains_symbol(var) {
            continue;
        }
        expr = match &statement.assignment {
            Assignment::Polynomial(definition) => expr.substitute(var, definition),
            assignment => {
                let mut result = StatePoly::zero();
                for (power, rest) in expr.group_by_power(var) {
                    result = result.add(&rest.mul(&assignment.get_moment(power)?));
                }
                result
            }
        };
    }
    Ok(expr)
}
