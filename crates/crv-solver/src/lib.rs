//! Exact bit-vector / integer / fixed-point solver built on the varisat SAT
//! backend.

mod circuit;
mod encode;
pub mod error;
pub mod solver;

pub use error::SolverError;
pub use solver::{Model, Solver, SolverConfig, SymbolValue};
