use crv_solver::SolverError;

use crate::pool::VarId;

/// Errors surfaced by variables, entities and randomization.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Invalid width, enum width too small, or a value outside a fixed set.
    #[error("domain error: {0}")]
    Domain(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("operation '{op}' is not supported for {kind} variables")]
    UnsupportedOperation { op: String, kind: String },

    #[error("failed to randomize {target}: constraints are unsatisfiable")]
    SolveFailure { target: String },

    #[error("variable {0} does not exist")]
    NotFound(VarId),

    #[error("division by zero")]
    DivisionByZero,

    #[error("solver error: {0}")]
    Solver(#[from] SolverError),
}
