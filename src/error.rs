use thiserror::Error;

pub type Result<T> = std::result::Result<T, MomentError>;

#[derive(Debug, Error)]
pub enum MomentError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("invalid program: {0}")]
    InvalidProgram(String),
    #[error("monomial {0} is not part of this recurrence system")]
    UnknownMonomial(String),
    #[error("recurrence of {monomial} references {missing}, which has no recurrence of its own")]
    IncompleteClosure { monomial: String, missing: String },
    #[error("closure discovery exceeded {limit} monomials; is the goal moment-computable?")]
    ClosureLimit { limit: usize },
    #[error("root finding failed: {0}")]
    RootFinding(String),
    #[error("ansatz for {monomial} still underdetermined after {equations} equations")]
    Underdetermined { monomial: String, equations: usize },
    #[error("division by zero while evaluating {0}")]
    DivisionByZero(String),
    #[error("symbol {0} has no numeric value")]
    Unbound(String),
}
