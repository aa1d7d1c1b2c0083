pub mod expr;
pub mod sort;

pub use expr::{and, implies, ite, not, one_of, or, BinaryOp, CmpOp, Const, Expr, UnaryOp};
pub use sort::{Sort, SortError, SymbolId};
