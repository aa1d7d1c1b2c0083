use std::fmt;
use std::sync::Arc;

use crate::kind::Kind;
use crate::value::Value;

pub type Render = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Presentation of a variable's value. Never affects semantics.
#[derive(Clone)]
pub enum Format {
    Dec,
    Hex,
    Bin,
    Oct,
    Custom(Render),
}

impl Format {
    pub fn custom(render: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        Format::Custom(Arc::new(render))
    }

    /// Renders `value` of `kind`. Radix formats print the raw bit pattern;
    /// enum values print their label in decimal format.
    pub fn render(&self, value: &Value, kind: &Kind) -> String {
        match self {
            Format::Custom(render) => render(value),
            Format::Dec => match (kind.domain(), value.as_int()) {
                (Some(domain), Some(v)) => domain
                    .label_of(v)
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string()),
                _ => value.to_string(),
            },
            Format::Hex => format!("{:#x}", kind.to_bits(*value)),
            Format::Bin => format!("{:#b}", kind.to_bits(*value)),
            Format::Oct => format!("{:#o}", kind.to_bits(*value)),
        }
    }
}

impl fmt::Debug for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Dec => write!(f, "Dec"),
            Format::Hex => write!(f, "Hex"),
            Format::Bin => write!(f, "Bin"),
            Format::Oct => write!(f, "Oct"),
            Format::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}
