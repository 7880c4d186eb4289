use std::collections::HashMap;
use std::fmt;

use crate::error::{MomentError, Result};
use crate::matrix::Matrix;
use crate::multipoly::Monomial;
use crate::polynomial::CoeffOps;
use crate::program::StatePoly;
use crate::ratfunc::RatFunc;

/// Linear system `x(n+1) = A·x(n) + b`, `x(0) = x₀`, over a closed set of
/// monomials.
#[derive(Clone, Debug)]
pub struct Recurrences {
    monomials: Vec<Monomial>,
    index: HashMap<Monomial, usize>,
    matrix: Matrix<RatFunc>,
    inhomogeneous: Vec<RatFunc>,
    initial_values: Vec<RatFunc>,
    dependencies: Vec<Vec<usize>>,
    /// Sinks-first order, present iff the dependency graph has no cycle
    /// besides self-loops.
    order: Option<Vec<usize>>,
}

impl Recurrences {
    /// Assemble the system from `(monomial, E[monomial](n+1))` rows. Every
    /// non-constant monomial on a right-hand side needs a row of its own.
    pub fn new(entries: Vec<(Monomial, StatePoly)>, initial_values: Vec<RatFunc>) -> Result<Self> {
        if entries.len() != initial_values.len() {
            return Err(MomentError::InvalidProgram(format!(
                "{} recurrences but {} initial values",
                entries.len(),
                initial_values.len()
            )));
        }
        let monomials: Vec<Monomial> = entries.iter().map(|(m, _)| m.clone()).collect();
        let index: HashMap<Monomial, usize> = monomials
            .iter()
            .enumerate()
            .map(|(i, m)| (m.clone(), i))
            .collect();

        let size = monomials.len();
        let mut matrix = Matrix::zeros(size, size);
        let mut inhomogeneous = vec![RatFunc::zero(); size];
        let mut dependencies = vec![Vec::new(); size];
        for (row, (monomial, rhs)) in entries.iter().enumerate() {
            for (term, coeff) in rhs.terms() {
                if term.is_one() {
                    inhomogeneous[row] = coeff.clone();
                    continue;
                }
                let col = *index.get(term).ok_or_else(|| MomentError::IncompleteClosure {
                    monomial: monomial.to_string(),
                    missing: term.to_string(),
                })?;
                matrix.set(row, col, coeff.clone());
                if col != row {
                    dependencies[row].push(col);
                }
            }
        }

        let order = sink_order(&dependencies);
        Ok(Recurrences {
            monomials,
            index,
            matrix,
            inhomogeneous,
            initial_values,
            dependencies,
            order,
        })
    }

    pub fn monomials(&self) -> &[Monomial] {
        &self.monomials
    }

    pub fn len(&self) -> usize {
        self.monomials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monomials.is_empty()
    }

    pub fn index_of(&self, monomial: &Monomial) -> Option<usize> {
        self.index.get(monomial).copied()
    }

    pub fn coefficient(&self, row: usize, col: usize) -> &RatFunc {
        self.matrix.get(row, col)
    }

    pub fn matrix(&self) -> &Matrix<RatFunc> {
        &self.matrix
    }

    pub fn inhomogeneous(&self) -> &[RatFunc] {
        &self.inhomogeneous
    }

    pub fn initial_values(&self) -> &[RatFunc] {
        &self.initial_values
    }

    pub fn is_inhomogeneous(&self) -> bool {
        self.inhomogeneous.iter().any(|b| !b.is_zero())
    }

    /// Indices whose values row `row` reads, excluding itself.
    pub fn dependencies(&self, row: usize) -> &[usize] {
        &self.dependencies[row]
    }

    pub fn is_acyclic(&self) -> bool {
        self.order.is_some()
    }

    /// Rows ordered so that each comes after everything it depends on.
    pub fn topological_order(&self) -> Option<&[usize]> {
        self.order.as_deref()
    }

    /// Size of the homogeneous form returned by [`Self::lifted_matrix`].
    pub fn lifted_dimension(&self) -> usize {
        self.len() + usize::from(self.is_inhomogeneous())
    }

    /// `A`, or `[[A, b], [0, 1]]` when `b ≠ 0`.
    pub fn lifted_matrix(&self) -> Matrix<RatFunc> {
        if !self.is_inhomogeneous() {
            return self.matrix.clone();
        }
        let size = self.len();
        let mut lifted = Matrix::zeros(size + 1, size + 1);
        for row in 0..size {
            for col in 0..size {
                lifted.set(row, col, self.matrix.get(row, col).clone());
            }
            lifted.set(row, size, self.inhomogeneous[row].clone());
        }
        lifted.set(size, size, RatFunc::one());
        lifted
    }

    pub fn lifted_initial_values(&self) -> Vec<RatFunc> {
        let mut values = self.initial_values.clone();
        if self.is_inhomogeneous() {
            values.push(RatFunc::one());
        }
        values
    }

    /// `A·state + b`.
    pub fn step(&self, state: &[RatFunc]) -> Vec<RatFunc> {
        self.matrix
            .mul_vec(state)
            .into_iter()
            .zip(&self.inhomogeneous)
            .map(|(value, b)| value.add(b))
            .collect()
    }

    /// `x(0), …, x(steps)` by forward iteration.
    pub fn trajectory(&self, steps: usize) -> Vec<Vec<RatFunc>> {
        let mut trajectory = Trajectory::new(self);
        trajectory.extend_to(steps);
        trajectory.states
    }
}

/// Iteratively peel off rows whose remaining dependencies are all removed.
fn sink_order(dependencies: &[Vec<usize>]) -> Option<Vec<usize>> {
    let size = dependencies.len();
    let mut removed = vec![false; size];
    let mut order = Vec::with_capacity(size);
    while order.len() < size {
        let sinks: Vec<usize> = (0..size)
            .filter(|&row| !removed[row] && dependencies[row].iter().all(|&dep| removed[dep]))
            .collect();
        if sinks.is_empty() {
            return None;
        }
        for row in sinks {
            removed[row] = true;
            order.push(row);
        }
    }
    Some(order)
}

impl fmt::Display for Recurrences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, monomial) in self.monomials.iter().enumerate() {
            let mut terms: Vec<String> = self
                .matrix
                .row(row)
                .iter()
                .zip(&self.monomials)
                .filter(|(coeff, _)| !coeff.is_zero())
                .map(|(coeff, m)| format!("({coeff})*{m}(n)"))
                .collect();
            if !self.inhomogeneous[row].is_zero() {
                terms.push(format!("{}", self.inhomogeneous[row]));
            }
            if terms.is_empty() {
                terms.push("0".to_string());
            }
            writeln!(
                f,
                "{monomial}(n+1) = {}; {monomial}(0) = {}",
                terms.join(" + "),
                self.initial_values[row]
            )?;
        }
        Ok(())
    }
}

/// Forward-iterated exact values of a system, extended on demand.
#[derive(Debug)]
pub struct Trajectory<'r> {
    recurrences: &'r Recurrences,
    states: Vec<Vec<RatFunc>>,
}

impl<'r> Trajectory<'r> {
    pub fn new(recurrences: &'r Recurrences) -> Self {
        Trajectory {
            recurrences,
            states: vec![recurrences.initial_values().to_vec()],
        }
    }

    fn extend_to(&mut self, n: usize) {
        while self.states.len() <= n {
            let next = match self.states.last() {
                Some(last) => self.recurrences.step(last),
                None => self.recurrences.initial_values().to_vec(),
            };
            self.states.push(next);
        }
    }

    /// `x(n)`.
    pub fn state(&mut self, n: usize) -> &[RatFunc] {
        self.extend_to(n);
        &self.states[n]
    }

    /// Component `row` of `x(n)`.
    pub fn value(&mut self, n: usize, row: usize) -> RatFunc {
        self.state(n)[row].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poly(terms: &[(&str, i64)], constant: i64) -> StatePoly {
        let mut p = StatePoly::constant(RatFunc::integer(constant));
        for (name, coeff) in terms {
            p = p.add(&StatePoly::var(*name).scale(&RatFunc::integer(*coeff)));
        }
        p
    }

    #[test]
    fn assembles_matrix_and_vector() {
        let system = Recurrences::new(
            vec![
                (Monomial::var("x"), poly(&[("x", 1)], 1)),
                (Monomial::var("y"), poly(&[("x", 1), ("y", 1)], 0)),
            ],
            vec![RatFunc::zero(), RatFunc::zero()],
        )
        .unwrap();
        assert!(system.is_inhomogeneous());
        assert!(system.is_acyclic());
        assert_eq!(system.topological_order().unwrap(), &[0, 1]);
        assert_eq!(system.dependencies(1), &[0]);
        assert_eq!(system.lifted_dimension(), 3);
        assert_eq!(*system.lifted_matrix().get(0, 2), RatFunc::one());

        let trajectory = system.trajectory(3);
        let y: Vec<RatFunc> = trajectory.iter().map(|state| state[1].clone()).collect();
        assert_eq!(
            y,
            vec![
                RatFunc::integer(0),
                RatFunc::integer(0),
                RatFunc::integer(1),
                RatFunc::integer(3)
            ]
        );
    }

    #[test]
    fn mutual_dependency_is_cyclic() {
        let system = Recurrences::new(
            vec![
                (Monomial::var("x"), poly(&[("y", 1)], 0)),
                (Monomial::var("y"), poly(&[("x", 1)], 0)),
            ],
            vec![RatFunc::one(), RatFunc::zero()],
        )
        .unwrap();
        assert!(!system.is_acyclic());
        assert!(!system.is_inhomogeneous());
        assert_eq!(system.lifted_dimension(), 2);
    }

    #[test]
    fn missing_row_is_reported() {
        let err = Recurrences::new(
            vec![(Monomial::var("x"), poly(&[("y", 1)], 0))],
            vec![RatFunc::zero()],
        )
        .unwrap_err();
        assert!(matches!(err, MomentError::IncompleteClosure { .. }));
    }
}
