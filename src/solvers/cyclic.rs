use std::collections::HashMap;

use num_complex::Complex64;
use tracing::{debug, warn};

use crate::closed_form::{ClosedForm, ExpPoly, Solution};
use crate::config::SolverConfig;
use crate::error::{MomentError, Result};
use crate::matrix::Matrix;
use crate::polynomial::{CoeffOps, Polynomial};
use crate::ratfunc::RatFunc;
use crate::recurrence::{Recurrences, Trajectory};
use crate::roots::{find_roots, CharacteristicRoots};
use crate::solver::{solve_linear, LinearResult};

/// Relative pivot threshold when fitting numeric coefficients.
const NUMERIC_FIT_TOLERANCE: f64 = 1e-12;

/// Solves any system through the characteristic polynomial of its lifted
/// matrix: every component is `Σ_ρ Σ_{j<m(ρ)} c·nʲ·ρⁿ` from some index on,
/// and the coefficients are fitted against forward-iterated values.
#[derive(Debug)]
pub struct CyclicSolver<'r> {
    recurrences: &'r Recurrences,
    config: SolverConfig,
    roots: CharacteristicRoots,
    degree: usize,
    trajectory: Trajectory<'r>,
    solutions: HashMap<usize, Solution>,
}

impl<'r> CyclicSolver<'r> {
    pub fn new(recurrences: &'r Recurrences, config: SolverConfig) -> Result<Self> {
        let lifted = recurrences.lifted_matrix();
        let characteristic = lifted.characteristic_polynomial();
        let mut candidates: Vec<RatFunc> = Vec::new();
        for value in lifted.diagonal() {
            if !candidates.iter().any(|c| c.equals(&value)) {
                candidates.push(value);
            }
        }
        let roots = find_roots(
            &characteristic,
            &candidates,
            config.root_mode,
            config.fallback_epsilon,
        )?;
        debug!(
            degree = lifted.rows(),
            exact = roots.is_exact(),
            "characteristic roots found"
        );
        Ok(CyclicSolver {
            recurrences,
            config,
            roots,
            degree: lifted.rows(),
            trajectory: Trajectory::new(recurrences),
            solutions: HashMap::new(),
        })
    }

    pub fn recurrences(&self) -> &'r Recurrences {
        self.recurrences
    }

    pub fn is_exact(&self) -> bool {
        self.roots.is_exact()
    }

    pub fn roots(&self) -> &CharacteristicRoots {
        &self.roots
    }

    pub fn solve(&mut self, row: usize) -> Result<Solution> {
        if let Some(done) = self.solutions.get(&row) {
            return Ok(done.clone());
        }
        let solution = match self.roots.clone() {
            CharacteristicRoots::Exact(roots) => {
                let values = |trajectory: &mut Trajectory<'_>, n: usize| -> Result<RatFunc> {
                    Ok(trajectory.value(n, row))
                };
                Solution::Exact(self.fit(row, &roots, 0.0, values)?)
            }
            CharacteristicRoots::Numeric(roots) => {
                let values = |trajectory: &mut Trajectory<'_>, n: usize| -> Result<Complex64> {
                    trajectory
                        .value(n, row)
                        .to_f64(&|_| None)
                        .map(|v| Complex64::new(v, 0.0))
                };
                Solution::Approximate(self.fit(row, &roots, NUMERIC_FIT_TOLERANCE, values)?)
            }
        };
        self.solutions.insert(row, solution.clone());
        Ok(solution)
    }

    /// Fit the ansatz over `roots` to the trajectory of `row`, adding
    /// equations while the system stays underdetermined.
    fn fit<C, F>(
        &mut self,
        row: usize,
        roots: &[(C, usize)],
        tolerance: f64,
        mut value: F,
    ) -> Result<ClosedForm<C>>
    where
        C: CoeffOps,
        F: FnMut(&mut Trajectory<'r>, usize) -> Result<C>,
    {
        let basis: Vec<(C, usize)> = roots
            .iter()
            .filter(|(root, _)| !root.is_zero())
            .flat_map(|(root, multiplicity)| (0..*multiplicity).map(move |j| (root.clone(), j)))
            .collect();
        let zero_multiplicity = roots
            .iter()
            .find(|(root, _)| root.is_zero())
            .map(|(_, m)| *m)
            .unwrap_or(0);
        let start = zero_multiplicity.max(1);
        let recurrences = self.recurrences;
        let monomial = &recurrences.monomials()[row];

        let mut equations = basis.len();
        let mut coefficients = None;
        for _ in 0..self.config.max_fit_rounds {
            let mut rows: Vec<Vec<C>> = Vec::with_capacity(equations);
            let mut rhs = Vec::with_capacity(equations);
            for n in start..start + equations {
                let point = C::from_integer(n as i64);
                rows.push(
                    basis
                        .iter()
                        .map(|(root, j)| point.powu(*j as u64).mul(&root.powu(n as u64)))
                        .collect(),
                );
                rhs.push(value(&mut self.trajectory, n)?);
            }
            match solve_linear(&Matrix::from_rows(rows), &rhs, tolerance) {
                LinearResult::Unique(solution) => {
                    coefficients = Some(solution.values);
                    break;
                }
                LinearResult::Infinite(family) => {
                    warn!(
                        monomial = %monomial,
                        rank = family.diagnostics.rank,
                        equations,
                        "coefficient fit underdetermined; adding an equation"
                    );
                    equations += 1;
                }
                LinearResult::Inconsistent(failure) => {
                    return Err(MomentError::RootFinding(format!(
                        "closed form ansatz for {monomial} is inconsistent at equation {} (rank {})",
                        failure.inconsistent_row, failure.rank
                    )));
                }
            }
        }
        let Some(coefficients) = coefficients else {
            return Err(MomentError::Underdetermined {
                monomial: monomial.to_string(),
                equations,
            });
        };

        let mut formula = ExpPoly::zero();
        for ((root, j), coeff) in basis.into_iter().zip(coefficients) {
            formula.add_term(root, Polynomial::monomial(coeff, j));
        }
        let prefix = (0..self.degree)
            .map(|n| value(&mut self.trajectory, n))
            .collect::<Result<Vec<_>>>()?;
        Ok(ClosedForm::new(prefix, formula))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipoly::Monomial;
    use crate::program::StatePoly;

    #[test]
    fn alternating_swap_fits_both_roots() {
        // x' = y, y' = x, x(0) = 1, y(0) = 0  =>  x(n) = (1 + (-1)^n)/2
        let system = Recurrences::new(
            vec![
                (Monomial::var("x"), StatePoly::var("y")),
                (Monomial::var("y"), StatePoly::var("x")),
            ],
            vec![RatFunc::one(), RatFunc::zero()],
        )
        .unwrap();
        let mut solver = CyclicSolver::new(&system, SolverConfig::default()).unwrap();
        assert!(solver.is_exact());
        let Solution::Exact(x) = solver.solve(0).unwrap() else {
            panic!("expected an exact solution");
        };
        assert_eq!(x.threshold(), 0);
        let expected = ExpPoly::constant(RatFunc::ratio(1, 2)).add(&ExpPoly::term(
            RatFunc::integer(-1),
            Polynomial::from_constant(RatFunc::ratio(1, 2)),
        ));
        assert_eq!(x.formula(), &expected);
    }

    #[test]
    fn irrational_roots_fall_back_to_numeric() {
        // Fibonacci: x' = x + y, y' = x
        let system = Recurrences::new(
            vec![
                (Monomial::var("x"), StatePoly::var("x").add(&StatePoly::var("y"))),
                (Monomial::var("y"), StatePoly::var("x")),
            ],
            vec![RatFunc::one(), RatFunc::zero()],
        )
        .unwrap();
        let mut solver = CyclicSolver::new(&system, SolverConfig::default()).unwrap();
        assert!(!solver.is_exact());
        let x = solver.solve(0).unwrap();
        assert!(!x.is_exact());
        // 1, 1, 2, 3, 5, 8, 13, 21, 34, 55, 89
        assert!((x.value_at(10).unwrap() - 89.0).abs() < 1e-6);
    }
}
