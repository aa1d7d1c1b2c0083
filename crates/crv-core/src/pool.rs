//! Arena of variables addressed by generational handles.
//!
//! Removing a variable bumps its slot's generation, so handles that outlive
//! their variable are detected on lookup and reported as `NotFound` instead
//! of aliasing whatever reuses the slot.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::RandomizeConfig;
use crate::constraint::{AdHoc, Arg, Constraint, Strength};
use crate::error::CoreError;
use crate::format::Format;
use crate::kind::Kind;
use crate::randomize::Prepared;
use crate::rng::pool_rng;
use crate::scalar::{Op, Scalar, Unary};
use crate::value::Value;
use crate::variable::{Hooks, Variable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VarId {
    index: u32,
    generation: u32,
}

impl VarId {
    pub const fn from_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
enum Init {
    Value(Value),
    Label(String),
}

/// Construction parameters of a variable.
#[derive(Debug, Clone)]
pub struct VarSpec {
    kind: Kind,
    init: Init,
    name: Option<String>,
    auto_random: bool,
    format: Option<Format>,
    hooks: Hooks,
}

impl VarSpec {
    pub fn new(kind: Kind, value: impl Into<Value>) -> Self {
        Self {
            kind,
            init: Init::Value(value.into()),
            name: None,
            auto_random: true,
            format: None,
            hooks: Hooks::default(),
        }
    }

    /// An enum variable initialized by label.
    pub fn labeled(kind: Kind, label: impl Into<String>) -> Self {
        Self {
            init: Init::Label(label.into()),
            ..Self::new(kind, 0)
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn auto_random(mut self, auto_random: bool) -> Self {
        self.auto_random = auto_random;
        self
    }

    /// Excludes the variable from randomization.
    pub fn fixed(self) -> Self {
        self.auto_random(false)
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Runs before every `Pool::randomize` of the variable.
    pub fn pre_randomize(
        mut self,
        hook: impl Fn(VarId, &mut Pool) -> Result<(), CoreError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.pre_randomize = Some(Arc::new(hook));
        self
    }

    /// Runs after every successful `Pool::randomize` of the variable.
    pub fn post_randomize(
        mut self,
        hook: impl Fn(VarId, &mut Pool) -> Result<(), CoreError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.post_randomize = Some(Arc::new(hook));
        self
    }

    fn build(self) -> Result<Variable, CoreError> {
        self.kind.validate()?;
        let value = match &self.init {
            Init::Value(v) => self.kind.cast(*v)?,
            Init::Label(label) => self.kind.cast_label(label)?,
        };
        let mut var = Variable::new(
            self.kind,
            value,
            self.auto_random,
            self.name,
            self.format,
        );
        var.hooks = self.hooks;
        Ok(var)
    }
}

/// Right-hand side of an arithmetic operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Var(VarId),
    Value(Value),
}

impl From<VarId> for Operand {
    fn from(id: VarId) -> Self {
        Operand::Var(id)
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

macro_rules! value_into_operand {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Operand::Value(Value::from(v))
                }
            }
        )*
    };
}

value_into_operand!(bool, f32, f64, i32, i64, i128, u32, u64);

#[derive(Debug)]
struct Slot {
    generation: u32,
    var: Option<Variable>,
}

/// Owner of every variable and of the RNG used by randomization.
#[derive(Debug)]
pub struct Pool {
    slots: Vec<Slot>,
    free: Vec<u32>,
    rng: ChaCha8Rng,
    config: RandomizeConfig,
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

impl Pool {
    pub fn new() -> Self {
        let config = RandomizeConfig::default();
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            rng: pool_rng(config.seed),
            config,
        }
    }

    pub fn with_config(config: RandomizeConfig) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            slots: Vec::new(),
            free: Vec::new(),
            rng: pool_rng(config.seed),
            config,
        })
    }

    pub fn seeded(seed: u64) -> Self {
        let config = RandomizeConfig::seeded(seed);
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            rng: pool_rng(config.seed),
            config,
        }
    }

    pub fn config(&self) -> &RandomizeConfig {
        &self.config
    }

    pub fn reseed(&mut self, seed: u64) {
        self.config.seed = Some(seed);
        self.rng = pool_rng(Some(seed));
    }

    pub(crate) fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn create(&mut self, spec: VarSpec) -> Result<VarId, CoreError> {
        let var = spec.build()?;
        Ok(self.insert(var))
    }

    fn insert(&mut self, var: Variable) -> VarId {
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.var = Some(var);
                VarId::from_parts(index, slot.generation)
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    var: Some(var),
                });
                VarId::from_parts(self.slots.len() as u32 - 1, 0)
            }
        };
        trace!(var = %id, "created variable");
        id
    }

    pub fn contains(&self, id: VarId) -> bool {
        self.get(id).is_ok()
    }

    pub fn get(&self, id: VarId) -> Result<&Variable, CoreError> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.var.as_ref())
            .ok_or(CoreError::NotFound(id))
    }

    pub fn get_mut(&mut self, id: VarId) -> Result<&mut Variable, CoreError> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.var.as_mut())
            .ok_or(CoreError::NotFound(id))
    }

    /// Destroys the variable; its handle and every copy of it go stale.
    pub fn remove(&mut self, id: VarId) -> Result<Variable, CoreError> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation && slot.var.is_some())
            .ok_or(CoreError::NotFound(id))?;
        let var = slot.var.take().ok_or(CoreError::NotFound(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        trace!(var = %id, "removed variable");
        Ok(var)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.var.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> impl Iterator<Item = VarId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.var
                .as_ref()
                .map(|_| VarId::from_parts(index as u32, slot.generation))
        })
    }

    pub fn value(&self, id: VarId) -> Result<Value, CoreError> {
        Ok(self.get(id)?.value())
    }

    pub fn scalar(&self, id: VarId) -> Result<Scalar, CoreError> {
        Ok(self.get(id)?.scalar())
    }

    /// Casts `input` through the variable's kind and stores it.
    pub fn assign(&mut self, id: VarId, input: impl Into<Value>) -> Result<(), CoreError> {
        self.get_mut(id)?.assign(input.into())
    }

    pub fn assign_label(&mut self, id: VarId, label: &str) -> Result<(), CoreError> {
        self.get_mut(id)?.assign_label(label)
    }

    /// Stores the value whose bit pattern is `raw`: two's complement for
    /// integers, IEEE754 for floats. Bits above the kind's width are ignored.
    pub fn from_bits(&mut self, id: VarId, raw: u128) -> Result<(), CoreError> {
        let value = self.get(id)?.kind().from_bits(raw)?;
        self.get_mut(id)?.assign(value)
    }

    fn operand(&self, rhs: Operand) -> Result<Value, CoreError> {
        match rhs {
            Operand::Var(id) => self.value(id),
            Operand::Value(v) => Ok(v),
        }
    }

    /// `id <op> rhs` as a new variable of the same kind. The result
    /// inherits name, format and randomization flag but no constraints.
    pub fn apply(&mut self, id: VarId, op: Op, rhs: impl Into<Operand>) -> Result<VarId, CoreError> {
        let rhs = self.operand(rhs.into())?;
        let var = self.get(id)?;
        let result = var.scalar().apply(op, rhs)?;
        let derived = var.derive(result.value());
        Ok(self.insert(derived))
    }

    /// `id <op>= rhs`, in place.
    pub fn apply_assign(&mut self, id: VarId, op: Op, rhs: impl Into<Operand>) -> Result<(), CoreError> {
        let rhs = self.operand(rhs.into())?;
        let result = self.scalar(id)?.apply(op, rhs)?;
        self.get_mut(id)?.assign(result.value())
    }

    pub fn unary(&mut self, id: VarId, op: Unary) -> Result<VarId, CoreError> {
        let var = self.get(id)?;
        let result = var.scalar().unary(op)?;
        let derived = var.derive(result.value());
        Ok(self.insert(derived))
    }

    /// Registers a hard constraint on `id`. The predicate receives the
    /// variable's own term first, followed by one term per argument.
    pub fn add_constraint(&mut self, id: VarId, constraint: Constraint) -> Result<(), CoreError> {
        self.constrain(id, Strength::Hard, constraint)
    }

    pub fn add_soft_constraint(&mut self, id: VarId, constraint: Constraint) -> Result<(), CoreError> {
        self.constrain(id, Strength::Soft, constraint)
    }

    fn constrain(&mut self, id: VarId, strength: Strength, constraint: Constraint) -> Result<(), CoreError> {
        let var = self.get_mut(id)?;
        if !var.is_random() {
            return Err(CoreError::Configuration(format!(
                "cannot constrain {id}: variable is not randomized"
            )));
        }
        var.constraints.insert(strength, constraint);
        Ok(())
    }

    pub fn remove_constraint(&mut self, id: VarId, name: &str) -> Result<Option<Constraint>, CoreError> {
        let var = self.get_mut(id)?;
        if !var.is_random() {
            return Err(CoreError::Configuration(format!(
                "cannot remove constraint '{name}' from {id}: variable is not randomized"
            )));
        }
        Ok(var.constraints.remove(name))
    }

    pub fn randomize(&mut self, id: VarId) -> Result<(), CoreError> {
        self.randomize_with(id, &[], &[])
    }

    /// Randomizes one variable under its own constraints plus one-off hard
    /// and soft constraints. Ad-hoc predicates receive the variable's term
    /// first, followed by their own arguments. The variable's pre and post
    /// hooks run around the draw.
    pub fn randomize_with(&mut self, id: VarId, hard: &[AdHoc], soft: &[AdHoc]) -> Result<(), CoreError> {
        let var = self.get(id)?;
        if !var.is_random() {
            return Err(CoreError::Configuration(format!(
                "cannot randomize {id}: variable is not randomized"
            )));
        }
        let hooks = var.hooks.clone();
        if let Some(hook) = &hooks.pre_randomize {
            hook(id, self)?;
        }

        let hard: Vec<AdHoc> = hard.iter().map(|c| c.prepend(Arg::Var(id))).collect();
        let soft: Vec<AdHoc> = soft.iter().map(|c| c.prepend(Arg::Var(id))).collect();
        let target = id.to_string();
        let mut prepared = Prepared::build(self, &[id], &[], &target)?;
        prepared.randomize(self, &hard, &soft, &target)?;

        if let Some(hook) = &hooks.post_randomize {
            hook(id, self)?;
        }
        Ok(())
    }

    /// A new variable with the same kind, value, flags and constraints.
    /// Constraint arguments referring to `id` itself are rewritten to the
    /// copy; arguments referring to other variables are kept.
    pub fn copy(&mut self, id: VarId) -> Result<VarId, CoreError> {
        let new = self.duplicate(id)?;
        self.relocate_constraints(new, &BTreeMap::from([(id, new)]))?;
        Ok(new)
    }

    pub(crate) fn duplicate(&mut self, id: VarId) -> Result<VarId, CoreError> {
        let var = self.get(id)?.clone();
        Ok(self.insert(var))
    }

    pub(crate) fn relocate_constraints(&mut self, id: VarId, map: &BTreeMap<VarId, VarId>) -> Result<(), CoreError> {
        let var = self.get_mut(id)?;
        var.constraints = var.constraints.relocate(map);
        Ok(())
    }
}
