//! Typed random variables.

use std::fmt;
use std::sync::Arc;

use crate::constraint::ConstraintSet;
use crate::error::CoreError;
use crate::format::Format;
use crate::kind::Kind;
use crate::pool::{Pool, VarId};
use crate::scalar::Scalar;
use crate::value::Value;

/// Called with the variable's handle before or after it is randomized.
pub type VarHook = Arc<dyn Fn(VarId, &mut Pool) -> Result<(), CoreError> + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub(crate) pre_randomize: Option<VarHook>,
    pub(crate) post_randomize: Option<VarHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("pre_randomize", &self.pre_randomize.is_some())
            .field("post_randomize", &self.post_randomize.is_some())
            .finish()
    }
}

/// A typed value, its randomization flag and its own named constraints.
///
/// Variables are owned by a [`Pool`](crate::pool::Pool) and addressed by
/// [`VarId`](crate::pool::VarId). The stored value is always canonical for
/// the kind.
#[derive(Debug, Clone)]
pub struct Variable {
    name: Option<String>,
    kind: Kind,
    value: Value,
    auto_random: bool,
    format: Option<Format>,
    pub(crate) constraints: ConstraintSet,
    pub(crate) hooks: Hooks,
}

impl Variable {
    pub(crate) fn new(
        kind: Kind,
        value: Value,
        auto_random: bool,
        name: Option<String>,
        format: Option<Format>,
    ) -> Self {
        Self {
            name,
            kind,
            value,
            auto_random,
            format,
            constraints: ConstraintSet::new(),
            hooks: Hooks::default(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn value(&self) -> Value {
        self.value
    }

    pub fn is_random(&self) -> bool {
        self.auto_random
    }

    pub fn width(&self) -> u32 {
        self.kind.width()
    }

    /// Display format: the explicit one, else the kind's default.
    pub fn format(&self) -> Format {
        self.format.clone().unwrap_or_else(|| self.kind.default_format())
    }

    pub fn set_format(&mut self, format: Format) {
        self.format = Some(format);
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn scalar(&self) -> Scalar {
        Scalar::canonical(self.kind.clone(), self.value)
    }

    pub fn min(&self) -> Value {
        self.kind.range().0
    }

    pub fn max(&self) -> Value {
        self.kind.range().1
    }

    pub fn to_bits(&self) -> u128 {
        self.kind.to_bits(self.value)
    }

    pub fn render(&self) -> String {
        self.render_with(&self.format())
    }

    pub fn render_with(&self, format: &Format) -> String {
        format.render(&self.value, &self.kind)
    }

    pub(crate) fn assign(&mut self, input: Value) -> Result<(), CoreError> {
        self.value = self.kind.cast(input)?;
        Ok(())
    }

    pub(crate) fn assign_label(&mut self, label: &str) -> Result<(), CoreError> {
        self.value = self.kind.cast_label(label)?;
        Ok(())
    }

    /// Same name, kind, flags and hooks with `value` and no constraints.
    pub(crate) fn derive(&self, value: Value) -> Variable {
        let mut var = Variable::new(
            self.kind.clone(),
            value,
            self.auto_random,
            self.name.clone(),
            self.format.clone(),
        );
        var.hooks = self.hooks.clone();
        var
    }
}
