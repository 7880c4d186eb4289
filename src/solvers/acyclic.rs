use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::closed_form::{sum_power_geometric, sum_powers, ClosedForm, ExpPoly};
use crate::error::{MomentError, Result};
use crate::polynomial::{CoeffOps, Polynomial};
use crate::ratfunc::RatFunc;
use crate::recurrence::{Recurrences, Trajectory};

/// Solves a system without cycles one first-order scalar recurrence at a time,
/// dependencies first.
#[derive(Debug)]
pub struct AcyclicSolver<'r> {
    recurrences: &'r Recurrences,
    trajectory: Trajectory<'r>,
    solutions: HashMap<usize, ClosedForm<RatFunc>>,
}

impl<'r> AcyclicSolver<'r> {
    pub fn new(recurrences: &'r Recurrences) -> Result<Self> {
        if !recurrences.is_acyclic() {
            return Err(MomentError::Unsupported(
                "recurrence system has a cyclic dependency".into(),
            ));
        }
        Ok(AcyclicSolver {
            recurrences,
            trajectory: Trajectory::new(recurrences),
            solutions: HashMap::new(),
        })
    }

    pub fn recurrences(&self) -> &'r Recurrences {
        self.recurrences
    }

    pub fn solve(&mut self, row: usize) -> Result<ClosedForm<RatFunc>> {
        if let Some(done) = self.solutions.get(&row) {
            return Ok(done.clone());
        }
        let needed = self.reachable(row);
        let topological = self.recurrences.topological_order().ok_or_else(|| {
            MomentError::Unsupported("recurrence system has a cyclic dependency".into())
        })?;
        let order: Vec<usize> = topological
            .iter()
            .copied()
            .filter(|r| needed.contains(r) && !self.solutions.contains_key(r))
            .collect();
        for next in order {
            let form = self.solve_row(next);
            trace!(
                monomial = %self.recurrences.monomials()[next],
                threshold = form.threshold(),
                "solved"
            );
            self.solutions.insert(next, form);
        }
        self.solutions
            .get(&row)
            .cloned()
            .ok_or_else(|| MomentError::Unsupported(format!("row {row} left unsolved")))
    }

    fn reachable(&self, row: usize) -> HashSet<usize> {
        let mut seen = HashSet::from([row]);
        let mut stack = vec![row];
        while let Some(next) = stack.pop() {
            for &dep in self.recurrences.dependencies(next) {
                if seen.insert(dep) {
                    stack.push(dep);
                }
            }
        }
        seen
    }

    /// `f(n+1) = r·f(n) + P(n)` where `P` collects the inhomogeneous part and
    /// the already solved dependencies.
    fn solve_row(&mut self, row: usize) -> ClosedForm<RatFunc> {
        let rate = self.recurrences.coefficient(row, row).clone();
        let mut forcing = ExpPoly::constant(self.recurrences.inhomogeneous()[row].clone());
        // P matches the concrete forcing from this index on.
        let mut valid_from = 0;
        for &dep in self.recurrences.dependencies(row) {
            let form = &self.solutions[&dep];
            forcing = forcing.add(&form.formula().scale(self.recurrences.coefficient(row, dep)));
            valid_from = valid_from.max(form.threshold());
        }

        let (start, formula) = if rate.is_zero() {
            (valid_from + 1, forcing.shift(-1))
        } else {
            let start = valid_from.max(1);
            let anchor = self.trajectory.value(start, row);
            (start, first_order(&rate, &forcing, start, &anchor))
        };
        let prefix = (0..start).map(|n| self.trajectory.value(n, row)).collect();
        ClosedForm::new(prefix, formula)
    }
}

/// Closed form of `f(n+1) = r·f(n) + P(n)` for `n ≥ t` with `f(t) = anchor`:
/// `f(n) = anchor·r^{n-t} + Σ_{k=t}^{n-1} r^{n-1-k}·P(k)`.
fn first_order(
    rate: &RatFunc,
    forcing: &ExpPoly<RatFunc>,
    t: usize,
    anchor: &RatFunc,
) -> ExpPoly<RatFunc> {
    let t_exp = t as i64;
    let t_value = RatFunc::from_integer(t_exp);
    let mut result = ExpPoly::term(
        rate.clone(),
        Polynomial::from_constant(anchor.div(&rate.powi(t_exp))),
    );
    for (base, poly) in forcing.terms() {
        let ratio = base.div(rate);
        for (j, coeff) in poly.coeff_entries() {
            let weight = coeff.div(rate);
            if ratio.is_one() {
                let sum = sum_powers::<RatFunc>(j);
                let at_start = sum.evaluate(&t_value);
                let shifted = sum - Polynomial::from_constant(at_start);
                result.add_term(rate.clone(), shifted.scale(&weight));
            } else {
                let sum = sum_power_geometric(j, &ratio);
                let at_start = sum.evaluate(&t_value).mul(&ratio.powi(t_exp));
                result.add_term(base.clone(), sum.scale(&weight));
                result.add_term(
                    rate.clone(),
                    Polynomial::from_constant(weight.mul(&at_start).neg()),
                );
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipoly::Monomial;
    use crate::program::StatePoly;

    fn var(name: &str) -> StatePoly {
        StatePoly::var(name)
    }

    #[test]
    fn geometric_approach_to_a_fixed_point() {
        // x(n+1) = x(n)/2 + 1, x(0) = 0  =>  x(n) = 2 - 2·(1/2)^n
        let system = Recurrences::new(
            vec![(
                Monomial::var("x"),
                var("x")
                    .scale(&RatFunc::ratio(1, 2))
                    .add(&StatePoly::constant(RatFunc::one())),
            )],
            vec![RatFunc::zero()],
        )
        .unwrap();
        let mut solver = AcyclicSolver::new(&system).unwrap();
        let form = solver.solve(0).unwrap();
        assert_eq!(form.threshold(), 0);
        let expected = ExpPoly::constant(RatFunc::integer(2)).add(&ExpPoly::term(
            RatFunc::ratio(1, 2),
            Polynomial::from_constant(RatFunc::integer(-2)),
        ));
        assert_eq!(form.formula(), &expected);
    }

    #[test]
    fn chained_sums_become_polynomials() {
        // x' = x + 1, y' = x + y  =>  y(n) = n(n-1)/2
        let system = Recurrences::new(
            vec![
                (Monomial::var("x"), var("x").add(&StatePoly::constant(RatFunc::one()))),
                (Monomial::var("y"), var("x").add(&var("y"))),
            ],
            vec![RatFunc::zero(), RatFunc::zero()],
        )
        .unwrap();
        let mut solver = AcyclicSolver::new(&system).unwrap();
        let y = solver.solve(1).unwrap();
        for n in 0..8u64 {
            let expected = RatFunc::integer((n * n.saturating_sub(1) / 2) as i64);
            assert_eq!(y.value_at(n), expected, "n = {n}");
        }
    }

    #[test]
    fn zero_rate_shifts_the_forcing() {
        // x' = 3, x(0) = 7  =>  x(0) = 7, x(n) = 3 for n >= 1
        let system = Recurrences::new(
            vec![(Monomial::var("x"), StatePoly::constant(RatFunc::integer(3)))],
            vec![RatFunc::integer(7)],
        )
        .unwrap();
        let mut solver = AcyclicSolver::new(&system).unwrap();
        let form = solver.solve(0).unwrap();
        assert_eq!(form.threshold(), 1);
        assert_eq!(form.value_at(0), RatFunc::integer(7));
        assert_eq!(form.value_at(5), RatFunc::integer(3));
    }
}
