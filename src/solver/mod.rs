//! Linear algebra used by the recurrence solvers.

pub mod linear;

pub use linear::{
    solve_linear, LinearDiagnostics, LinearFamily, LinearInconsistent, LinearResult,
    LinearSolution,
};
