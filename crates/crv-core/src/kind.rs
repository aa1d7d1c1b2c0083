//! Variable kinds: domains, canonical casts and solver encodings.
//!
//! Every kind defines a cast that maps arbitrary input onto its canonical
//! value set. Casting is idempotent, and every value stored in a variable
//! has been through it.

use std::fmt;
use std::sync::Arc;

use crv_ir::expr::{one_of, Expr};
use crv_ir::sort::Sort;
use crv_solver::SymbolValue;
use serde::{Deserialize, Serialize};

use crate::config::RandomizeConfig;
use crate::error::CoreError;
use crate::format::Format;
use crate::value::Value;

/// Widest integer variable.
pub const MAX_INT_WIDTH: u32 = 64;

/// Magnitude bound used for double-precision domains.
pub const DOUBLE_RANGE: f64 = 1e100;

/// IEEE754 storage precision of a floating variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Half,
    Single,
    Double,
}

impl Precision {
    pub fn width(self) -> u32 {
        match self {
            Precision::Half => 16,
            Precision::Single => 32,
            Precision::Double => 64,
        }
    }

    /// Largest magnitude of the randomizable domain.
    pub fn max(self) -> f64 {
        match self {
            Precision::Half => half::f16::MAX.to_f64(),
            Precision::Single => f64::from(f32::MAX),
            Precision::Double => DOUBLE_RANGE,
        }
    }

    /// Integer bits a fixed-point encoding needs to cover `max()`.
    fn int_bits(self) -> u32 {
        match self {
            Precision::Half => 16,
            Precision::Single => 128,
            Precision::Double => 333,
        }
    }

    /// Rounds to the nearest representable value. Overflow saturates to
    /// infinity; tiny values follow the format's subnormal rules.
    pub fn round(self, x: f64) -> f64 {
        match self {
            Precision::Half => half::f16::from_f64(x).to_f64(),
            Precision::Single => f64::from(x as f32),
            Precision::Double => x,
        }
    }

    pub fn to_bits(self, x: f64) -> u64 {
        match self {
            Precision::Half => u64::from(half::f16::from_f64(x).to_bits()),
            Precision::Single => u64::from((x as f32).to_bits()),
            Precision::Double => x.to_bits(),
        }
    }

    pub fn from_bits(self, raw: u64) -> f64 {
        match self {
            Precision::Half => half::f16::from_bits(raw as u16).to_f64(),
            Precision::Single => f64::from(f32::from_bits(raw as u32)),
            Precision::Double => f64::from_bits(raw),
        }
    }
}

/// The labelled value set of an enumeration, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDomain {
    entries: Vec<(String, i128)>,
}

impl EnumDomain {
    pub fn new<S: Into<String>>(entries: impl IntoIterator<Item = (S, i128)>) -> Result<Self, CoreError> {
        let mut out: Vec<(String, i128)> = Vec::new();
        for (label, value) in entries {
            let label = label.into();
            if out.iter().any(|(l, _)| *l == label) {
                return Err(CoreError::Domain(format!("duplicate enum label '{label}'")));
            }
            out.push((label, value));
        }
        if out.is_empty() {
            return Err(CoreError::Domain("enum needs at least one value".to_string()));
        }
        Ok(Self { entries: out })
    }

    pub fn value_of(&self, label: &str) -> Option<i128> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| *v)
    }

    pub fn label_of(&self, value: i128) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(l, _)| l.as_str())
    }

    pub fn contains(&self, value: i128) -> bool {
        self.entries.iter().any(|(_, v)| *v == value)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, i128)> {
        self.entries.iter().map(|(l, v)| (l.as_str(), *v))
    }

    pub fn values(&self) -> impl Iterator<Item = i128> + '_ {
        self.entries.iter().map(|(_, v)| *v)
    }

    pub fn min(&self) -> i128 {
        self.values().min().unwrap_or_default()
    }

    pub fn max(&self) -> i128 {
        self.values().max().unwrap_or_default()
    }

    /// Fewest bits representing every value: unsigned when no value is
    /// negative, two's complement otherwise.
    pub fn min_width(&self) -> u32 {
        let (lo, hi) = (self.min(), self.max());
        if lo >= 0 {
            (128 - hi.leading_zeros()).max(1)
        } else {
            signed_bits(lo).max(signed_bits(hi))
        }
    }
}

fn signed_bits(value: i128) -> u32 {
    let magnitude = if value < 0 { !value } else { value };
    128 - magnitude.leading_zeros() + 1
}

#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    /// Unsigned bit vector, modulo `2^width`, solved as a machine word.
    Logic { width: u32 },
    /// Unsigned integer, modulo `2^width`, solved exactly.
    Uint { width: u32 },
    /// Two's-complement signed integer.
    Int { width: u32 },
    Bool,
    Enum { domain: Arc<EnumDomain>, width: u32 },
    Float(Precision),
}

impl Kind {
    pub fn logic(width: u32) -> Result<Self, CoreError> {
        check_width(width)?;
        Ok(Kind::Logic { width })
    }

    pub fn uint(width: u32) -> Result<Self, CoreError> {
        check_width(width)?;
        Ok(Kind::Uint { width })
    }

    pub fn int(width: u32) -> Result<Self, CoreError> {
        check_width(width)?;
        Ok(Kind::Int { width })
    }

    /// An enumeration; `width` defaults to the domain's minimal width and
    /// may only widen it.
    pub fn enumeration(domain: EnumDomain, width: Option<u32>) -> Result<Self, CoreError> {
        let needed = domain.min_width();
        let width = match width {
            Some(w) if w < needed => {
                return Err(CoreError::Domain(format!(
                    "width {w} is less than the {needed} bits required to represent the enum values"
                )))
            }
            Some(w) => w,
            None => needed,
        };
        check_width(width)?;
        Ok(Kind::Enum {
            domain: Arc::new(domain),
            width,
        })
    }

    pub fn uint8() -> Self {
        Kind::Uint { width: 8 }
    }

    pub fn uint16() -> Self {
        Kind::Uint { width: 16 }
    }

    pub fn uint32() -> Self {
        Kind::Uint { width: 32 }
    }

    pub fn uint64() -> Self {
        Kind::Uint { width: 64 }
    }

    pub fn int8() -> Self {
        Kind::Int { width: 8 }
    }

    pub fn int16() -> Self {
        Kind::Int { width: 16 }
    }

    pub fn int32() -> Self {
        Kind::Int { width: 32 }
    }

    pub fn int64() -> Self {
        Kind::Int { width: 64 }
    }

    pub fn byte() -> Self {
        Kind::int8()
    }

    pub fn half() -> Self {
        Kind::Float(Precision::Half)
    }

    pub fn single() -> Self {
        Kind::Float(Precision::Single)
    }

    pub fn double() -> Self {
        Kind::Float(Precision::Double)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Kind::Logic { width } | Kind::Uint { width } | Kind::Int { width } => check_width(*width),
            Kind::Enum { domain, width } => {
                check_width(*width)?;
                if *width < domain.min_width() {
                    return Err(CoreError::Domain(format!(
                        "width {width} is too small for the enum values"
                    )));
                }
                Ok(())
            }
            Kind::Bool | Kind::Float(_) => Ok(()),
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            Kind::Logic { width }
            | Kind::Uint { width }
            | Kind::Int { width }
            | Kind::Enum { width, .. } => *width,
            Kind::Bool => 1,
            Kind::Float(p) => p.width(),
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Kind::Float(_))
    }

    pub fn domain(&self) -> Option<&EnumDomain> {
        match self {
            Kind::Enum { domain, .. } => Some(domain),
            _ => None,
        }
    }

    fn mask(&self) -> u128 {
        let width = self.width();
        if width >= 128 {
            u128::MAX
        } else {
            (1u128 << width) - 1
        }
    }

    fn integer_input(&self, input: Value) -> Result<i128, CoreError> {
        input
            .as_int()
            .ok_or_else(|| CoreError::Domain(format!("{input} cannot be converted to {self}")))
    }

    /// Maps `input` onto this kind's canonical value set.
    pub fn cast(&self, input: Value) -> Result<Value, CoreError> {
        match self {
            Kind::Logic { .. } | Kind::Uint { .. } => {
                let v = self.integer_input(input)?;
                Ok(Value::Int(((v as u128) & self.mask()) as i128))
            }
            Kind::Int { width } => {
                let v = self.integer_input(input)?;
                Ok(Value::Int(sign_extend((v as u128) & self.mask(), *width)))
            }
            Kind::Bool => match input {
                Value::Bool(b) => Ok(Value::Bool(b)),
                other => Ok(Value::Bool(self.integer_input(other)? & 1 == 1)),
            },
            Kind::Enum { domain, .. } => {
                let v = match input {
                    Value::Float(f) if f.fract() != 0.0 => None,
                    other => other.as_int(),
                };
                match v {
                    Some(v) if domain.contains(v) => Ok(Value::Int(v)),
                    _ => Err(CoreError::Domain(format!(
                        "value {input} is not one of the enum values"
                    ))),
                }
            }
            Kind::Float(p) => Ok(Value::Float(p.round(input.as_f64()))),
        }
    }

    /// Casts an enum label.
    pub fn cast_label(&self, label: &str) -> Result<Value, CoreError> {
        match self {
            Kind::Enum { domain, .. } => domain
                .value_of(label)
                .map(Value::Int)
                .ok_or_else(|| CoreError::Domain(format!("'{label}' is not an enum label"))),
            _ => Err(CoreError::Domain(format!(
                "{self} variables have no label '{label}'"
            ))),
        }
    }

    /// Intrinsic `(min, max)` of the domain.
    pub fn range(&self) -> (Value, Value) {
        match self {
            Kind::Logic { .. } | Kind::Uint { .. } => (Value::Int(0), Value::Int(self.mask() as i128)),
            Kind::Int { width } => {
                let half = 1i128 << (width - 1);
                (Value::Int(-half), Value::Int(half - 1))
            }
            Kind::Bool => (Value::Bool(false), Value::Bool(true)),
            Kind::Enum { domain, .. } => (Value::Int(domain.min()), Value::Int(domain.max())),
            Kind::Float(p) => (Value::Float(-p.max()), Value::Float(p.max())),
        }
    }

    /// Integer bits of the fixed-point encoding of a floating domain.
    fn real_int_bits(p: Precision, config: &RandomizeConfig) -> u32 {
        p.int_bits().min(config.real_int_bits)
    }

    /// Finite magnitude bound a floating domain is solved within.
    pub fn float_bound(p: Precision, config: &RandomizeConfig) -> f64 {
        let grid = 2f64.powi(Self::real_int_bits(p, config) as i32) - 1.0;
        p.max().min(grid)
    }

    pub fn sort(&self, config: &RandomizeConfig) -> Sort {
        match self {
            Kind::Logic { width } => Sort::BitVec { width: *width },
            Kind::Bool => Sort::BitVec { width: 1 },
            Kind::Uint { width } | Kind::Enum { width, .. } => Sort::Int { width: width + 1 },
            Kind::Int { width } => Sort::Int { width: *width },
            Kind::Float(p) => Sort::Real {
                int_bits: Self::real_int_bits(*p, config),
                frac_bits: config.real_frac_bits,
            },
        }
    }

    /// The always-present hard constraint on a solver term of this kind, if
    /// the sort alone does not already enforce the domain.
    pub fn domain_constraint(&self, term: &Expr, config: &RandomizeConfig) -> Option<Expr> {
        match self {
            Kind::Uint { .. } => Some(term.within(0, self.mask() as i128)),
            Kind::Enum { domain, .. } => Some(one_of(term, domain.values())),
            Kind::Float(p) => {
                let bound = Self::float_bound(*p, config);
                Some(term.within(-bound, bound))
            }
            Kind::Logic { .. } | Kind::Int { .. } | Kind::Bool => None,
        }
    }

    /// Converts a solved symbol back into an (uncast) value.
    pub fn from_solver(&self, value: SymbolValue) -> Value {
        match self {
            Kind::Float(_) => Value::Float(value.as_f64()),
            _ => Value::Int(value.as_int()),
        }
    }

    /// Literal for `value` in this kind's solver encoding.
    pub fn to_solver(&self, value: Value, config: &RandomizeConfig) -> Expr {
        match self {
            Kind::Float(_) => {
                let scale = 2f64.powi(config.real_frac_bits as i32);
                Expr::real((value.as_f64() * scale).round() / scale)
            }
            Kind::Bool => Expr::int(i128::from(value.as_bool())),
            _ => Expr::int(value.as_int().unwrap_or_default()),
        }
    }

    /// Raw bit pattern: two's complement for integers, IEEE754 for floats.
    pub fn to_bits(&self, value: Value) -> u128 {
        match self {
            Kind::Float(p) => u128::from(p.to_bits(value.as_f64())),
            Kind::Bool => u128::from(value.as_bool()),
            _ => (value.as_int().unwrap_or_default() as u128) & self.mask(),
        }
    }

    pub fn from_bits(&self, raw: u128) -> Result<Value, CoreError> {
        let raw = raw & self.mask();
        match self {
            Kind::Float(p) => Ok(Value::Float(p.from_bits(raw as u64))),
            Kind::Enum { width, .. } => {
                let signed = self.domain().is_some_and(|d| d.min() < 0);
                let v = if signed {
                    sign_extend(raw, *width)
                } else {
                    raw as i128
                };
                self.cast(Value::Int(v))
            }
            _ => self.cast(Value::Int(raw as i128)),
        }
    }

    pub fn default_format(&self) -> Format {
        match self {
            Kind::Logic { .. } => Format::Hex,
            _ => Format::Dec,
        }
    }
}

fn check_width(width: u32) -> Result<(), CoreError> {
    if width == 0 || width > MAX_INT_WIDTH {
        return Err(CoreError::Domain(format!(
            "width must be in 1..={MAX_INT_WIDTH}, got {width}"
        )));
    }
    Ok(())
}

fn sign_extend(raw: u128, width: u32) -> i128 {
    let shift = 128 - width;
    ((raw << shift) as i128) >> shift
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Logic { width } => write!(f, "logic{width}"),
            Kind::Uint { width } => write!(f, "uint{width}"),
            Kind::Int { width } => write!(f, "int{width}"),
            Kind::Bool => write!(f, "bool"),
            Kind::Enum { width, .. } => write!(f, "enum{width}"),
            Kind::Float(p) => write!(f, "fp{}", p.width()),
        }
    }
}
