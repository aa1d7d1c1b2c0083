//! Constrained-random variables and entities.
//!
//! Variables live in a [`Pool`] and carry a [`Kind`] that fixes their
//! value set. [`Entity`] groups variables, nested entities and containers
//! under constraints that may span any of them; `randomize` hands the
//! whole set to an exact solver and assigns a fresh, feasible draw.

pub mod config;
pub mod constraint;
pub mod entity;
pub mod error;
pub mod format;
pub mod kind;
pub mod pool;
mod randomize;
mod rng;
pub mod scalar;
pub mod structure;
pub mod value;
pub mod variable;

pub use config::RandomizeConfig;
pub use constraint::{AdHoc, Arg, Constraint, ConstraintSet, Strength};
pub use entity::{Entity, Field, FieldAttributes};
pub use error::CoreError;
pub use format::Format;
pub use kind::{EnumDomain, Kind, Precision};
pub use pool::{Operand, Pool, VarId, VarSpec};
pub use scalar::{Op, Scalar, Unary};
pub use structure::Struct;
pub use value::Value;
pub use variable::{VarHook, Variable};
