//! Named constraints and their argument bindings.
//!
//! A constraint is a pure predicate plus an ordered list of arguments.
//! Variable arguments are captured by handle and substituted with their
//! solver terms (or current values) at solve time, so copying a constraint
//! only ever rewrites handles; the predicate itself is shared.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crv_ir::expr::{Const, Expr};

use crate::pool::VarId;

/// Builds a boolean expression from one term per argument.
pub type Predicate = Arc<dyn Fn(&[Expr]) -> Expr + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arg {
    Var(VarId),
    Const(Const),
}

impl From<VarId> for Arg {
    fn from(id: VarId) -> Self {
        Arg::Var(id)
    }
}

impl From<Const> for Arg {
    fn from(c: Const) -> Self {
        Arg::Const(c)
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Const(Const::Bool(b))
    }
}

impl From<f64> for Arg {
    fn from(r: f64) -> Self {
        Arg::Const(Const::Real(r))
    }
}

macro_rules! int_into_arg {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Arg {
                fn from(i: $t) -> Self {
                    Arg::Const(Const::Int(i as i128))
                }
            }
        )*
    };
}

int_into_arg!(i32, i64, i128, u32, u64);

impl Arg {
    pub fn var(&self) -> Option<VarId> {
        match self {
            Arg::Var(id) => Some(*id),
            Arg::Const(_) => None,
        }
    }

    fn relocate(&self, map: &BTreeMap<VarId, VarId>) -> Arg {
        match self {
            Arg::Var(id) => Arg::Var(map.get(id).copied().unwrap_or(*id)),
            other => *other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strength {
    Hard,
    Soft,
}

#[derive(Clone)]
pub struct Constraint {
    name: String,
    predicate: Predicate,
    args: Vec<Arg>,
}

impl Constraint {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&[Expr]) -> Expr + Send + Sync + 'static,
        args: impl IntoIterator<Item = Arg>,
    ) -> Self {
        Self::shared(name, Arc::new(predicate), args)
    }

    pub fn shared(name: impl Into<String>, predicate: Predicate, args: impl IntoIterator<Item = Arg>) -> Self {
        Self {
            name: name.into(),
            predicate,
            args: args.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn apply(&self, terms: &[Expr]) -> Expr {
        (self.predicate)(terms)
    }

    /// Same predicate, with variable arguments rewritten through `map`.
    /// Handles missing from `map` are kept.
    pub fn relocate(&self, map: &BTreeMap<VarId, VarId>) -> Constraint {
        Constraint {
            name: self.name.clone(),
            predicate: Arc::clone(&self.predicate),
            args: self.args.iter().map(|a| a.relocate(map)).collect(),
        }
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Hard and soft constraints keyed by name. A name lives in at most one of
/// the two maps; re-adding it replaces the previous entry.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    hard: BTreeMap<String, Constraint>,
    soft: BTreeMap<String, Constraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, strength: Strength, constraint: Constraint) -> Option<Constraint> {
        let name = constraint.name.clone();
        let (target, other) = match strength {
            Strength::Hard => (&mut self.hard, &mut self.soft),
            Strength::Soft => (&mut self.soft, &mut self.hard),
        };
        let previous = other.remove(&name);
        target.insert(name, constraint).or(previous)
    }

    pub fn remove(&mut self, name: &str) -> Option<Constraint> {
        self.hard.remove(name).or_else(|| self.soft.remove(name))
    }

    pub fn get(&self, name: &str) -> Option<(Strength, &Constraint)> {
        self.hard
            .get(name)
            .map(|c| (Strength::Hard, c))
            .or_else(|| self.soft.get(name).map(|c| (Strength::Soft, c)))
    }

    pub fn hard(&self) -> impl Iterator<Item = &Constraint> {
        self.hard.values()
    }

    pub fn soft(&self) -> impl Iterator<Item = &Constraint> {
        self.soft.values()
    }

    pub fn len(&self) -> usize {
        self.hard.len() + self.soft.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hard.is_empty() && self.soft.is_empty()
    }

    pub fn relocate(&self, map: &BTreeMap<VarId, VarId>) -> ConstraintSet {
        let relocate = |m: &BTreeMap<String, Constraint>| {
            m.iter()
                .map(|(k, c)| (k.clone(), c.relocate(map)))
                .collect()
        };
        ConstraintSet {
            hard: relocate(&self.hard),
            soft: relocate(&self.soft),
        }
    }

    /// Every variable handle referenced by an argument.
    pub fn referenced(&self) -> impl Iterator<Item = VarId> + '_ {
        self.hard
            .values()
            .chain(self.soft.values())
            .flat_map(|c| c.args.iter().filter_map(Arg::var))
    }
}

/// A one-off constraint passed to a single `randomize` call.
#[derive(Clone)]
pub struct AdHoc {
    predicate: Predicate,
    args: Vec<Arg>,
}

impl AdHoc {
    pub fn new(
        predicate: impl Fn(&[Expr]) -> Expr + Send + Sync + 'static,
        args: impl IntoIterator<Item = Arg>,
    ) -> Self {
        Self {
            predicate: Arc::new(predicate),
            args: args.into_iter().collect(),
        }
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    pub fn apply(&self, terms: &[Expr]) -> Expr {
        (self.predicate)(terms)
    }

    pub(crate) fn prepend(&self, first: Arg) -> AdHoc {
        AdHoc {
            predicate: Arc::clone(&self.predicate),
            args: std::iter::once(first).chain(self.args.iter().copied()).collect(),
        }
    }
}

impl fmt::Debug for AdHoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdHoc")
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}
