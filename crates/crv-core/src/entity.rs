//! Composite entities: named trees of variables, nested entities and
//! containers, with constraints spanning any of their variables.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::constraint::{AdHoc, Constraint, ConstraintSet, Strength};
use crate::error::CoreError;
use crate::format::Format;
use crate::pool::{Pool, VarId};
use crate::randomize::Prepared;
use crate::structure::Struct;

/// Called with the entity before or after randomization.
pub type Hook = Arc<dyn Fn(&Entity, &mut Pool) -> Result<(), CoreError> + Send + Sync>;

/// A field of an entity.
#[derive(Debug)]
pub enum Field {
    Var(VarId),
    Entity(Box<Entity>),
    Struct(Struct),
    /// Ordered sequence.
    Seq(Vec<Field>),
    /// Fixed-arity tuple.
    Tuple(Vec<Field>),
    /// Unordered collection; compared without regard to order.
    Set(Vec<Field>),
    Map(BTreeMap<String, Field>),
    /// Opaque data carried along but never randomized.
    Plain(Arc<serde_json::Value>),
}

impl From<VarId> for Field {
    fn from(id: VarId) -> Self {
        Field::Var(id)
    }
}

impl From<Entity> for Field {
    fn from(e: Entity) -> Self {
        Field::Entity(Box::new(e))
    }
}

impl From<Struct> for Field {
    fn from(s: Struct) -> Self {
        Field::Struct(s)
    }
}

impl From<serde_json::Value> for Field {
    fn from(v: serde_json::Value) -> Self {
        Field::Plain(Arc::new(v))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Depth {
    Shallow,
    Deep,
}

impl Field {
    fn collect_vars(&self, out: &mut Vec<VarId>) {
        match self {
            Field::Var(id) => out.push(*id),
            Field::Entity(e) => e.collect_into(out),
            Field::Struct(s) => out.extend(s.fields().iter().map(|(_, id)| *id)),
            Field::Seq(items) | Field::Tuple(items) | Field::Set(items) => {
                items.iter().for_each(|f| f.collect_vars(out))
            }
            Field::Map(items) => items.values().for_each(|f| f.collect_vars(out)),
            Field::Plain(_) => {}
        }
    }

    fn collect_owners<'a>(&'a self, out: &mut Vec<&'a ConstraintSet>) {
        match self {
            Field::Entity(e) => e.collect_owners(out),
            Field::Seq(items) | Field::Tuple(items) | Field::Set(items) => {
                items.iter().for_each(|f| f.collect_owners(out))
            }
            Field::Map(items) => items.values().for_each(|f| f.collect_owners(out)),
            Field::Var(_) | Field::Struct(_) | Field::Plain(_) => {}
        }
    }

    fn copy_with(&self, pool: &mut Pool, map: &mut BTreeMap<VarId, VarId>, depth: Depth) -> Result<Field, CoreError> {
        let copy_all = |items: &[Field], pool: &mut Pool, map: &mut BTreeMap<VarId, VarId>| {
            items
                .iter()
                .map(|f| f.copy_with(pool, map, depth))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(match self {
            Field::Var(id) => Field::Var(match map.get(id) {
                Some(new) => *new,
                None => {
                    let new = pool.duplicate(*id)?;
                    map.insert(*id, new);
                    new
                }
            }),
            Field::Entity(e) => Field::Entity(Box::new(e.copy_with(pool, map, depth)?)),
            Field::Struct(s) => Field::Struct(s.copy_with(pool, map)?),
            Field::Seq(items) => Field::Seq(copy_all(items, pool, map)?),
            Field::Tuple(items) => Field::Tuple(copy_all(items, pool, map)?),
            Field::Set(items) => Field::Set(copy_all(items, pool, map)?),
            Field::Map(items) => {
                let mut out = BTreeMap::new();
                for (k, f) in items {
                    out.insert(k.clone(), f.copy_with(pool, map, depth)?);
                }
                Field::Map(out)
            }
            Field::Plain(v) => match depth {
                Depth::Shallow => Field::Plain(Arc::clone(v)),
                Depth::Deep => Field::Plain(Arc::new(v.as_ref().clone())),
            },
        })
    }

    fn relocate(&mut self, map: &BTreeMap<VarId, VarId>) {
        match self {
            Field::Entity(e) => e.relocate(map),
            Field::Seq(items) | Field::Tuple(items) | Field::Set(items) => {
                items.iter_mut().for_each(|f| f.relocate(map))
            }
            Field::Map(items) => items.values_mut().for_each(|f| f.relocate(map)),
            Field::Var(_) | Field::Struct(_) | Field::Plain(_) => {}
        }
    }

    /// Structural equality on values.
    fn equivalent(&self, pool: &Pool, other: &Field) -> Result<bool, CoreError> {
        match (self, other) {
            (Field::Var(a), Field::Var(b)) => Ok(pool.scalar(*a)? == pool.scalar(*b)?),
            (Field::Entity(a), Field::Entity(b)) => a.equivalent(pool, b),
            (Field::Struct(a), Field::Struct(b)) => {
                if a.fields().len() != b.fields().len() {
                    return Ok(false);
                }
                for ((na, ia), (nb, ib)) in a.fields().iter().zip(b.fields()) {
                    if na != nb || pool.scalar(*ia)? != pool.scalar(*ib)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Field::Seq(a), Field::Seq(b)) | (Field::Tuple(a), Field::Tuple(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b) {
                    if !x.equivalent(pool, y)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Field::Set(a), Field::Set(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                let mut used = vec![false; b.len()];
                'outer: for x in a {
                    for (i, y) in b.iter().enumerate() {
                        if !used[i] && x.equivalent(pool, y)? {
                            used[i] = true;
                            continue 'outer;
                        }
                    }
                    return Ok(false);
                }
                Ok(true)
            }
            (Field::Map(a), Field::Map(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (k, x) in a {
                    match b.get(k) {
                        Some(y) if x.equivalent(pool, y)? => {}
                        _ => return Ok(false),
                    }
                }
                Ok(true)
            }
            (Field::Plain(a), Field::Plain(b)) => Ok(a == b),
            _ => Ok(false),
        }
    }

    fn render(&self, pool: &Pool, format: Option<&Format>) -> Result<String, CoreError> {
        match self {
            Field::Var(id) => {
                let var = pool.get(*id)?;
                Ok(match format {
                    Some(f) => var.render_with(f),
                    None => var.render(),
                })
            }
            Field::Entity(e) => Ok(e.name().to_string()),
            Field::Struct(s) => {
                let parts = s
                    .fields()
                    .iter()
                    .map(|(n, id)| Ok(format!("{n}: {}", pool.get(*id)?.render())))
                    .collect::<Result<Vec<_>, CoreError>>()?;
                Ok(format!("{} {{{}}}", s.name(), parts.join(", ")))
            }
            Field::Seq(items) => render_all(items, pool, format, "[", "]"),
            Field::Tuple(items) => render_all(items, pool, format, "(", ")"),
            Field::Set(items) => render_all(items, pool, format, "{", "}"),
            Field::Map(items) => {
                let parts = items
                    .iter()
                    .map(|(k, f)| Ok(format!("{k}: {}", f.render(pool, format)?)))
                    .collect::<Result<Vec<_>, CoreError>>()?;
                Ok(format!("{{{}}}", parts.join(", ")))
            }
            Field::Plain(v) => Ok(v.to_string()),
        }
    }
}

fn render_all(
    items: &[Field],
    pool: &Pool,
    format: Option<&Format>,
    open: &str,
    close: &str,
) -> Result<String, CoreError> {
    let parts = items
        .iter()
        .map(|f| f.render(pool, format))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("{open}{}{close}", parts.join(", ")))
}

/// Per-field presentation and comparison settings.
#[derive(Debug, Clone)]
pub struct FieldAttributes {
    /// Overrides each variable's own format when rendering.
    pub format: Option<Format>,
    /// Participates in `compare`.
    pub compare: bool,
    /// Shown by `display`.
    pub display: bool,
}

impl Default for FieldAttributes {
    fn default() -> Self {
        Self {
            format: None,
            compare: true,
            display: true,
        }
    }
}

pub struct Entity {
    name: String,
    fields: Vec<(String, Field)>,
    attributes: BTreeMap<String, FieldAttributes>,
    constraints: ConstraintSet,
    frozen: bool,
    cache: Option<Prepared>,
    pre_randomize: Option<Hook>,
    post_randomize: Option<Hook>,
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("constraints", &self.constraints)
            .field("frozen", &self.frozen)
            .finish_non_exhaustive()
    }
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            attributes: BTreeMap::new(),
            constraints: ConstraintSet::new(),
            frozen: false,
            cache: None,
            pre_randomize: None,
            post_randomize: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a field, replacing any field of the same name in place.
    pub fn add_field(&mut self, name: impl Into<String>, field: impl Into<Field>) {
        let name = name.into();
        let field = field.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = field,
            None => self.fields.push((name, field)),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, field: impl Into<Field>) -> Self {
        self.add_field(name, field);
        self
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Field> {
        let index = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(index).1)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// The variable held directly by field `name`.
    pub fn var(&self, name: &str) -> Option<VarId> {
        match self.field(name)? {
            Field::Var(id) => Some(*id),
            _ => None,
        }
    }

    pub fn set_attributes(&mut self, field: impl Into<String>, attributes: FieldAttributes) {
        self.attributes.insert(field.into(), attributes);
    }

    pub fn attributes(&self, field: &str) -> FieldAttributes {
        self.attributes.get(field).cloned().unwrap_or_default()
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// Registers a hard constraint over the entity's variables. The
    /// predicate receives one term per argument.
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.insert(Strength::Hard, constraint);
    }

    pub fn add_soft_constraint(&mut self, constraint: Constraint) {
        self.constraints.insert(Strength::Soft, constraint);
    }

    pub fn remove_constraint(&mut self, name: &str) -> Option<Constraint> {
        self.constraints.remove(name)
    }

    /// Caches the solver and feasible intervals built by the next
    /// `randomize`; later changes to constraints or to non-random values
    /// are ignored until `unfreeze_constraints`.
    ///
    /// Every draw against the cached solver leaves its retired clauses
    /// behind, so memory grows with the number of draws. Unfreezing drops
    /// the cache and with it the accumulated clauses.
    pub fn freeze_constraints(&mut self) {
        self.frozen = true;
    }

    pub fn unfreeze_constraints(&mut self) {
        self.frozen = false;
        self.cache = None;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn set_pre_randomize(&mut self, hook: impl Fn(&Entity, &mut Pool) -> Result<(), CoreError> + Send + Sync + 'static) {
        self.pre_randomize = Some(Arc::new(hook));
    }

    pub fn set_post_randomize(&mut self, hook: impl Fn(&Entity, &mut Pool) -> Result<(), CoreError> + Send + Sync + 'static) {
        self.post_randomize = Some(Arc::new(hook));
    }

    /// Every variable reachable from the entity, each once, in field order.
    pub fn collect_vars(&self) -> Vec<VarId> {
        let mut all = Vec::new();
        self.collect_into(&mut all);
        let mut seen = BTreeSet::new();
        all.retain(|id| seen.insert(*id));
        all
    }

    fn collect_into(&self, out: &mut Vec<VarId>) {
        for (_, field) in &self.fields {
            field.collect_vars(out);
        }
    }

    fn collect_owners<'a>(&'a self, out: &mut Vec<&'a ConstraintSet>) {
        out.push(&self.constraints);
        for (_, field) in &self.fields {
            field.collect_owners(out);
        }
    }

    pub fn randomize(&mut self, pool: &mut Pool) -> Result<(), CoreError> {
        self.randomize_with(pool, &[], &[])
    }

    /// Randomizes every random variable reachable from the entity under
    /// all registered constraints plus the given one-off constraints.
    pub fn randomize_with(&mut self, pool: &mut Pool, hard: &[AdHoc], soft: &[AdHoc]) -> Result<(), CoreError> {
        if let Some(hook) = self.pre_randomize.clone() {
            hook(self, pool)?;
        }

        let mut vars = Vec::new();
        for id in self.collect_vars() {
            if pool.get(id)?.is_random() {
                vars.push(id);
            }
        }

        let target = self.name.clone();
        if self.frozen {
            if self.cache.is_none() {
                let mut prepared = self.prepare(pool, &vars)?;
                prepared.compute_bounds(&target)?;
                debug!(entity = %target, "froze solver");
                self.cache = Some(prepared);
            }
            if let Some(prepared) = self.cache.as_mut() {
                prepared.randomize_scoped(pool, hard, soft, &target)?;
            }
        } else {
            let mut prepared = self.prepare(pool, &vars)?;
            prepared.randomize(pool, hard, soft, &target)?;
        }

        if let Some(hook) = self.post_randomize.clone() {
            hook(self, pool)?;
        }
        Ok(())
    }

    fn prepare(&self, pool: &Pool, vars: &[VarId]) -> Result<Prepared, CoreError> {
        let mut owners = Vec::new();
        self.collect_owners(&mut owners);
        Prepared::build(pool, vars, &owners, &self.name)
    }

    /// Copy with fresh variables; plain data is shared with the original.
    pub fn shallow_copy(&self, pool: &mut Pool) -> Result<Entity, CoreError> {
        self.copy(pool, Depth::Shallow)
    }

    /// Copy with fresh variables and duplicated plain data.
    pub fn deep_copy(&self, pool: &mut Pool) -> Result<Entity, CoreError> {
        self.copy(pool, Depth::Deep)
    }

    fn copy(&self, pool: &mut Pool, depth: Depth) -> Result<Entity, CoreError> {
        let mut map = BTreeMap::new();
        let mut copied = self.copy_with(pool, &mut map, depth)?;
        copied.relocate(&map);
        for new in map.values() {
            pool.relocate_constraints(*new, &map)?;
        }
        debug!(entity = %self.name, vars = map.len(), ?depth, "copied entity");
        Ok(copied)
    }

    fn copy_with(&self, pool: &mut Pool, map: &mut BTreeMap<VarId, VarId>, depth: Depth) -> Result<Entity, CoreError> {
        let mut fields = Vec::with_capacity(self.fields.len());
        for (name, field) in &self.fields {
            fields.push((name.clone(), field.copy_with(pool, map, depth)?));
        }
        Ok(Entity {
            name: self.name.clone(),
            fields,
            attributes: self.attributes.clone(),
            constraints: self.constraints.clone(),
            frozen: self.frozen,
            cache: None,
            pre_randomize: self.pre_randomize.clone(),
            post_randomize: self.post_randomize.clone(),
        })
    }

    fn relocate(&mut self, map: &BTreeMap<VarId, VarId>) {
        self.constraints = self.constraints.relocate(map);
        for (_, field) in &mut self.fields {
            field.relocate(map);
        }
    }

    fn compared_fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields()
            .filter(|(name, _)| !name.starts_with('_') && self.attributes(name).compare)
    }

    fn equivalent(&self, pool: &Pool, other: &Entity) -> Result<bool, CoreError> {
        for (name, field) in self.compared_fields() {
            match other.field(name) {
                Some(rhs) if field.equivalent(pool, rhs)? => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Compares same-named public fields, logging every mismatch. With
    /// `bidirectional`, fields only `other` has are caught as well.
    pub fn compare(&self, pool: &Pool, other: &Entity, verbose: bool, bidirectional: bool) -> Result<bool, CoreError> {
        let mut result = true;
        for (name, field) in self.compared_fields() {
            let Some(rhs) = other.field(name) else {
                error!(entity = %self.name, field = name, "field not found in rhs");
                result = false;
                continue;
            };
            let equal = match (field, rhs) {
                (Field::Entity(a), Field::Entity(b)) => a.compare(pool, b, verbose, false)?,
                _ => field.equivalent(pool, rhs)?,
            };
            if !equal {
                error!(
                    entity = %self.name,
                    field = name,
                    lhs = %field.render(pool, None)?,
                    rhs = %rhs.render(pool, None)?,
                    "comparison failed"
                );
                result = false;
            } else if verbose {
                info!(entity = %self.name, field = name, "comparison passed");
            }
        }
        if bidirectional {
            result &= other.compare(pool, self, verbose, false)?;
        }
        Ok(result)
    }

    /// Destroys every variable the entity owns.
    pub fn release(self, pool: &mut Pool) -> Result<(), CoreError> {
        for id in self.collect_vars() {
            if pool.contains(id) {
                pool.remove(id)?;
            }
        }
        Ok(())
    }

    /// Text view of the visible fields, one per line; nested entities are
    /// indented below their field.
    pub fn display(&self, pool: &Pool) -> Result<String, CoreError> {
        let mut out = String::new();
        self.display_into(pool, 0, &mut out)?;
        Ok(out)
    }

    fn display_into(&self, pool: &Pool, indent: usize, out: &mut String) -> Result<(), CoreError> {
        let pad = "  ".repeat(indent);
        let _ = writeln!(out, "{pad}{}", self.name);
        for (name, field) in &self.fields {
            let attributes = self.attributes(name);
            if !attributes.display {
                continue;
            }
            match field {
                Field::Entity(e) => {
                    let _ = writeln!(out, "{pad}  {name}:");
                    e.display_into(pool, indent + 2, out)?;
                }
                _ => {
                    let text = field.render(pool, attributes.format.as_ref())?;
                    let _ = writeln!(out, "{pad}  {name}: {text}");
                }
            }
        }
        Ok(())
    }
}
