//! Closed forms for every monomial of a recurrence system.

mod acyclic;
mod cyclic;

use tracing::debug;

pub use acyclic::AcyclicSolver;
pub use cyclic::CyclicSolver;

use crate::closed_form::Solution;
use crate::config::SolverConfig;
use crate::error::{MomentError, Result};
use crate::multipoly::Monomial;
use crate::recurrence::Recurrences;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverKind {
    Acyclic,
    Cyclic,
}

/// Picks the acyclic solver when the dependency graph allows it, the cyclic
/// one otherwise or when forced.
#[derive(Debug)]
pub enum RecurrenceSolver<'r> {
    Acyclic(AcyclicSolver<'r>),
    Cyclic(CyclicSolver<'r>),
}

impl<'r> RecurrenceSolver<'r> {
    pub fn new(recurrences: &'r Recurrences, config: SolverConfig) -> Result<Self> {
        let solver = if recurrences.is_acyclic() && !config.force_cyclic {
            RecurrenceSolver::Acyclic(AcyclicSolver::new(recurrences)?)
        } else {
            RecurrenceSolver::Cyclic(CyclicSolver::new(recurrences, config)?)
        };
        debug!(kind = ?solver.kind(), monomials = recurrences.len(), "solver selected");
        Ok(solver)
    }

    pub fn kind(&self) -> SolverKind {
        match self {
            RecurrenceSolver::Acyclic(_) => SolverKind::Acyclic,
            RecurrenceSolver::Cyclic(_) => SolverKind::Cyclic,
        }
    }

    /// Whether every closed form this solver produces is exact.
    pub fn is_exact(&self) -> bool {
        match self {
            RecurrenceSolver::Acyclic(_) => true,
            RecurrenceSolver::Cyclic(solver) => solver.is_exact(),
        }
    }

    /// Closed form of `E[monomial]` as a function of the iteration count.
    pub fn get(&mut self, monomial: &Monomial) -> Result<Solution> {
        let recurrences = self.recurrences();
        let row = recurrences
            .index_of(monomial)
            .ok_or_else(|| MomentError::UnknownMonomial(monomial.to_string()))?;
        match self {
            RecurrenceSolver::Acyclic(solver) => solver.solve(row).map(Solution::Exact),
            RecurrenceSolver::Cyclic(solver) => solver.solve(row),
        }
    }

    fn recurrences(&self) -> &'r Recurrences {
        match self {
            RecurrenceSolver::Acyclic(solver) => solver.recurrences(),
            RecurrenceSolver::Cyclic(solver) => solver.recurrences(),
        }
    }
}
