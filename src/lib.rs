//! Closed-form moments of probabilistic loops: programs are turned into linear
//! recurrences over monomials of their variables, which are then solved
//! symbolically in the iteration count.

pub mod closed_form;
pub mod config;
pub mod error;
pub mod expr;
pub mod format;
pub mod matrix;
pub mod multipoly;
pub mod parser;
pub mod polynomial;
pub mod program;
pub mod ratfunc;
pub mod recurrence;
pub mod roots;
pub mod solver;
pub mod solvers;

pub use closed_form::{ClosedForm, ExpPoly, Solution, ITERATION_VAR};
pub use config::{RecurrenceConfig, RootMode, SolverConfig};
pub use error::{MomentError, Result};
pub use expr::{Expr, Rational};
pub use format::pretty;
pub use multipoly::{Monomial, MultiPoly};
pub use parser::parse_expr;
pub use polynomial::{CoeffOps, Poly, Polynomial};
pub use program::{
    Assignment, Distribution, Program, ProgramBuilder, StatePoly, Statement, TrigFunction,
};
pub use ratfunc::RatFunc;
pub use recurrence::{
    get_recurrences, DifferentialResolver, MomentResolver, NameAllocator, Recurrences, Resolver,
};
pub use roots::CharacteristicRoots;
pub use solvers::{RecurrenceSolver, SolverKind};
