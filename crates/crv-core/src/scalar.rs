//! Value arithmetic with hardware semantics.
//!
//! Integer operations are evaluated on wide intermediates and then cast back
//! through the kind, so results wrap exactly like the declared width.
//! Floating operations follow IEEE754 and round to the kind's precision.

use std::cmp::Ordering;
use std::fmt;

use crate::error::CoreError;
use crate::kind::Kind;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Add,
    Sub,
    Mul,
    /// Truncates toward zero for integer kinds.
    Div,
    Rem,
    Pow,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl Op {
    fn is_bitwise(self) -> bool {
        matches!(self, Op::And | Op::Or | Op::Xor | Op::Shl | Op::Shr)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Rem => "%",
            Op::Pow => "**",
            Op::And => "&",
            Op::Or => "|",
            Op::Xor => "^",
            Op::Shl => "<<",
            Op::Shr => ">>",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unary {
    Neg,
    Pos,
    Abs,
    Invert,
}

/// A value together with the kind that gives it meaning.
#[derive(Debug, Clone)]
pub struct Scalar {
    kind: Kind,
    value: Value,
}

impl Scalar {
    pub fn new(kind: Kind, value: impl Into<Value>) -> Result<Self, CoreError> {
        let value = kind.cast(value.into())?;
        Ok(Self { kind, value })
    }

    /// Wraps a value that is already canonical for `kind`.
    pub(crate) fn canonical(kind: Kind, value: Value) -> Self {
        Self { kind, value }
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn value(&self) -> Value {
        self.value
    }

    pub fn is_nan(&self) -> bool {
        self.value.is_nan()
    }

    fn unsupported(&self, op: impl fmt::Display) -> CoreError {
        CoreError::UnsupportedOperation {
            op: op.to_string(),
            kind: self.kind.to_string(),
        }
    }

    /// `self <op> rhs`, cast back into this scalar's kind.
    pub fn apply(&self, op: Op, rhs: impl Into<Value>) -> Result<Scalar, CoreError> {
        let rhs = rhs.into();
        if self.kind.is_float() || matches!(rhs, Value::Float(_)) {
            if op.is_bitwise() {
                return Err(self.unsupported(op));
            }
            let (a, b) = (self.value.as_f64(), rhs.as_f64());
            let result = match op {
                Op::Add => a + b,
                Op::Sub => a - b,
                Op::Mul => a * b,
                Op::Div if !self.kind.is_float() && b == 0.0 => return Err(CoreError::DivisionByZero),
                Op::Div => a / b,
                Op::Rem if !self.kind.is_float() && b == 0.0 => return Err(CoreError::DivisionByZero),
                Op::Rem => a % b,
                Op::Pow => a.powf(b),
                _ => return Err(self.unsupported(op)),
            };
            return Scalar::new(self.kind.clone(), Value::Float(result));
        }

        let a = self.value.as_int().unwrap_or_default();
        let b = rhs.as_int().unwrap_or_default();
        let result = match op {
            Op::Add => a.wrapping_add(b),
            Op::Sub => a.wrapping_sub(b),
            Op::Mul => a.wrapping_mul(b),
            Op::Div | Op::Rem if b == 0 => return Err(CoreError::DivisionByZero),
            Op::Div => a.wrapping_div(b),
            Op::Rem => a.wrapping_rem(b),
            Op::Pow => {
                let exp = u32::try_from(b).map_err(|_| {
                    CoreError::Domain(format!("exponent {b} must be a non-negative 32-bit integer"))
                })?;
                a.wrapping_pow(exp)
            }
            Op::And => a & b,
            Op::Or => a | b,
            Op::Xor => a ^ b,
            Op::Shl | Op::Shr if b < 0 => {
                return Err(CoreError::Domain(format!("negative shift amount {b}")))
            }
            Op::Shl if b >= 128 => 0,
            Op::Shl => a.wrapping_shl(b as u32),
            Op::Shr => a >> b.min(127),
        };
        Scalar::new(self.kind.clone(), Value::Int(result))
    }

    pub fn unary(&self, op: Unary) -> Result<Scalar, CoreError> {
        let value = match (op, self.value) {
            (Unary::Pos, v) => v,
            (Unary::Neg, Value::Float(f)) => Value::Float(-f),
            (Unary::Abs, Value::Float(f)) => Value::Float(f.abs()),
            (Unary::Invert, Value::Float(_)) => return Err(self.unsupported("~")),
            (op, v) => {
                let i = v.as_int().unwrap_or_default();
                Value::Int(match op {
                    Unary::Neg => i.wrapping_neg(),
                    Unary::Abs => i.wrapping_abs(),
                    _ => !i,
                })
            }
        };
        Scalar::new(self.kind.clone(), value)
    }

    fn canonical_rhs(&self, other: Value) -> Value {
        // floats compare after rounding the other side to the same precision
        if self.kind.is_float() {
            self.kind.cast(other).unwrap_or(other)
        } else {
            other
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.default_format().render(&self.value, &self.kind))
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Scalar) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Scalar) -> Option<Ordering> {
        self.value.compare(&other.value)
    }
}

impl PartialEq<Value> for Scalar {
    fn eq(&self, other: &Value) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd<Value> for Scalar {
    fn partial_cmp(&self, other: &Value) -> Option<Ordering> {
        self.value.compare(&self.canonical_rhs(*other))
    }
}

macro_rules! scalar_cmp {
    ($($t:ty),*) => {
        $(
            impl PartialEq<$t> for Scalar {
                fn eq(&self, other: &$t) -> bool {
                    *self == Value::from(*other)
                }
            }

            impl PartialOrd<$t> for Scalar {
                fn partial_cmp(&self, other: &$t) -> Option<Ordering> {
                    self.partial_cmp(&Value::from(*other))
                }
            }
        )*
    };
}

scalar_cmp!(i32, i64, i128, u32, u64, f64, bool);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapping_arithmetic() {
        let x = Scalar::new(Kind::uint8(), 250).unwrap();
        assert_eq!(x.apply(Op::Add, 10).unwrap(), 4);
        let y = Scalar::new(Kind::int8(), 127).unwrap();
        assert_eq!(y.apply(Op::Add, 1).unwrap(), -128);
        assert_eq!(y.apply(Op::Mul, 2).unwrap(), -2);
    }

    #[test]
    fn test_division_truncates_and_checks_zero() {
        let x = Scalar::new(Kind::int8(), -7).unwrap();
        assert_eq!(x.apply(Op::Div, 2).unwrap(), -3);
        assert_eq!(x.apply(Op::Rem, 2).unwrap(), -1);
        assert!(matches!(x.apply(Op::Div, 0), Err(CoreError::DivisionByZero)));
    }

    #[test]
    fn test_pow_and_shifts() {
        let x = Scalar::new(Kind::uint8(), 3).unwrap();
        assert_eq!(x.apply(Op::Pow, 5).unwrap(), 243);
        assert!(x.apply(Op::Pow, -1).is_err());
        assert_eq!(x.apply(Op::Shl, 7).unwrap(), 128);
        let y = Scalar::new(Kind::int8(), -8).unwrap();
        assert_eq!(y.apply(Op::Shr, 1).unwrap(), -4);
    }

    #[test]
    fn test_float_bitwise_unsupported() {
        let f = Scalar::new(Kind::single(), 1.5).unwrap();
        assert!(matches!(
            f.apply(Op::And, 1),
            Err(CoreError::UnsupportedOperation { .. })
        ));
        assert!(f.unary(Unary::Invert).is_err());
        assert_eq!(f.apply(Op::Mul, 2.0).unwrap(), 3.0);
    }

    #[test]
    fn test_unary() {
        let x = Scalar::new(Kind::uint8(), 1).unwrap();
        assert_eq!(x.unary(Unary::Neg).unwrap(), 255);
        assert_eq!(x.unary(Unary::Invert).unwrap(), 254);
        let y = Scalar::new(Kind::int8(), -128).unwrap();
        assert_eq!(y.unary(Unary::Abs).unwrap(), -128);
    }

    #[test]
    fn test_nan_comparisons() {
        let nan = Scalar::new(Kind::double(), f64::NAN).unwrap();
        assert!(nan != nan);
        assert!(nan != f64::NAN);
        assert!(!(nan < 1.0));
        assert!(!(nan >= 1.0));
        assert!(!(nan == 0.0));
    }

    #[test]
    fn test_float_compare_rounds_rhs() {
        let h = Scalar::new(Kind::half(), 0.1).unwrap();
        assert!(h == 0.1);
    }

    #[test]
    fn test_bool_wraps() {
        let b = Scalar::new(Kind::Bool, true).unwrap();
        assert_eq!(b.apply(Op::Add, 1).unwrap(), false);
    }
}
