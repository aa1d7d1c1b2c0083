use std::fmt;

use serde::{Deserialize, Serialize};

/// Largest width a declared symbol may have.
pub const MAX_SYMBOL_WIDTH: u32 = 127;

/// Identifier of a symbol declared in a solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// The domain a symbol ranges over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "sort", rename_all = "snake_case")]
pub enum Sort {
    /// A single truth value.
    Bool,
    /// Unsigned machine word; arithmetic wraps modulo `2^width`.
    BitVec { width: u32 },
    /// Two's-complement integer; arithmetic on it is exact.
    Int { width: u32 },
    /// Signed fixed-point number with `frac_bits` fractional bits.
    Real { int_bits: u32, frac_bits: u32 },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SortError {
    #[error("sort width must be in 1..={MAX_SYMBOL_WIDTH}, got {0}")]
    InvalidWidth(u32),
}

impl Sort {
    /// Number of bits the symbol occupies once encoded.
    pub fn width(&self) -> u32 {
        match self {
            Sort::Bool => 1,
            Sort::BitVec { width } | Sort::Int { width } => *width,
            Sort::Real {
                int_bits,
                frac_bits,
            } => 1 + int_bits + frac_bits,
        }
    }

    /// Fractional bits carried by values of this sort.
    pub fn scale(&self) -> u32 {
        match self {
            Sort::Real { frac_bits, .. } => *frac_bits,
            _ => 0,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Sort::Int { .. } | Sort::Real { .. })
    }

    pub fn validate(&self) -> Result<(), SortError> {
        let width = self.width();
        if width == 0 || width > MAX_SYMBOL_WIDTH {
            return Err(SortError::InvalidWidth(width));
        }
        Ok(())
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "bool"),
            Sort::BitVec { width } => write!(f, "bv{width}"),
            Sort::Int { width } => write!(f, "int{width}"),
            Sort::Real {
                int_bits,
                frac_bits,
            } => write!(f, "real{int_bits}.{frac_bits}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths() {
        assert_eq!(Sort::Bool.width(), 1);
        assert_eq!(Sort::BitVec { width: 8 }.width(), 8);
        assert_eq!(Sort::Int { width: 33 }.width(), 33);
        assert_eq!(
            Sort::Real {
                int_bits: 40,
                frac_bits: 16
            }
            .width(),
            57
        );
    }

    #[test]
    fn test_validate_rejects_zero_and_huge() {
        assert!(Sort::BitVec { width: 0 }.validate().is_err());
        assert!(Sort::Int { width: 200 }.validate().is_err());
        assert!(Sort::Int { width: 65 }.validate().is_ok());
    }

    #[test]
    fn test_display() {
        assert_eq!(Sort::Int { width: 9 }.to_string(), "int9");
        assert_eq!(Sort::BitVec { width: 32 }.to_string(), "bv32");
    }
}
