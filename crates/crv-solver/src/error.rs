use crv_ir::sort::{SortError, SymbolId};

/// Errors raised while encoding or solving.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("expected a boolean expression, found {0}")]
    NotBoolean(String),

    #[error("unknown symbol {0}")]
    UnknownSymbol(SymbolId),

    #[error("unsupported expression: {0}")]
    Unsupported(String),

    #[error("intermediate word of {width} bits exceeds the limit of {limit}")]
    WidthLimit { width: u32, limit: u32 },

    #[error("invalid sort: {0}")]
    InvalidSort(#[from] SortError),

    #[error("pop without a matching push")]
    NoScope,

    #[error("SAT backend error: {0}")]
    Backend(String),
}
