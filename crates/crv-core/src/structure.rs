//! Fixed-layout packing of variables into a single bit vector.
//!
//! The last field occupies the least significant bits; each earlier field
//! sits directly above the one after it.

use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::pool::{Pool, VarId};

/// Widest packed struct.
pub const MAX_STRUCT_WIDTH: u32 = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Struct {
    name: String,
    fields: Vec<(String, VarId)>,
}

impl Struct {
    pub fn new<S: Into<String>>(
        pool: &Pool,
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (S, VarId)>,
    ) -> Result<Self, CoreError> {
        let s = Struct {
            name: name.into(),
            fields: fields.into_iter().map(|(n, id)| (n.into(), id)).collect(),
        };
        let width = s.width(pool)?;
        if width > MAX_STRUCT_WIDTH {
            return Err(CoreError::Domain(format!(
                "struct '{}' is {width} bits wide, the limit is {MAX_STRUCT_WIDTH}",
                s.name
            )));
        }
        Ok(s)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[(String, VarId)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<VarId> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, id)| *id)
    }

    pub fn width(&self, pool: &Pool) -> Result<u32, CoreError> {
        self.fields
            .iter()
            .try_fold(0u32, |acc, (_, id)| Ok(acc + pool.get(*id)?.width()))
    }

    pub fn to_bits(&self, pool: &Pool) -> Result<u128, CoreError> {
        let mut value = 0u128;
        let mut offset = 0u32;
        for (_, id) in self.fields.iter().rev() {
            let var = pool.get(*id)?;
            value |= var.to_bits() << offset;
            offset += var.width();
        }
        Ok(value)
    }

    /// Unpacks `raw` into the fields, casting each slice through its kind.
    /// Either every field is assigned or, on error, none is.
    pub fn from_bits(&self, pool: &mut Pool, raw: u128) -> Result<(), CoreError> {
        let mut decoded = Vec::with_capacity(self.fields.len());
        let mut offset = 0u32;
        for (_, id) in self.fields.iter().rev() {
            let kind = pool.get(*id)?.kind();
            let slice = raw.checked_shr(offset).unwrap_or(0);
            decoded.push((*id, kind.from_bits(slice)?));
            offset += kind.width();
        }
        for (id, value) in decoded {
            pool.assign(id, value)?;
        }
        Ok(())
    }

    /// Same layout over fresh copies of the fields.
    pub fn copy(&self, pool: &mut Pool) -> Result<Struct, CoreError> {
        let mut map = BTreeMap::new();
        let copied = self.copy_with(pool, &mut map)?;
        for new in map.values() {
            pool.relocate_constraints(*new, &map)?;
        }
        Ok(copied)
    }

    pub(crate) fn copy_with(&self, pool: &mut Pool, map: &mut BTreeMap<VarId, VarId>) -> Result<Struct, CoreError> {
        let mut fields = Vec::with_capacity(self.fields.len());
        for (name, id) in &self.fields {
            let new = match map.get(id) {
                Some(new) => *new,
                None => {
                    let new = pool.duplicate(*id)?;
                    map.insert(*id, new);
                    new
                }
            };
            fields.push((name.clone(), new));
        }
        Ok(Struct {
            name: self.name.clone(),
            fields,
        })
    }
}
