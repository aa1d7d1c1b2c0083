//! Incremental optimizing solver over bit-blasted expressions.
//!
//! Hard assertions are exact. Soft assertions are resolved greedily: they
//! are tried one at a time in descending weight (insertion order within a
//! weight) and each one that is consistent with everything already kept is
//! kept. `maximize`/`minimize` fix the bits of one symbol from the most
//! significant down, so the optimum they return is exact.

use std::collections::BTreeMap;

use crv_ir::expr::Expr;
use crv_ir::sort::{Sort, SymbolId};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use varisat::Lit;

use crate::circuit::Circuit;
use crate::encode::{Encoder, SymbolEntry};
use crate::error::SolverError;

/// Encoding limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Fractional bits given to real literals that meet integer operands in
    /// arithmetic.
    pub real_frac_bits: u32,
    /// Widest intermediate word an expression may produce.
    pub max_word_width: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            real_frac_bits: 16,
            max_word_width: 256,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Soft {
    lit: Lit,
    weight: u32,
    depth: usize,
}

/// A decoded symbol value; `raw` is the two's-complement (or unsigned)
/// bit pattern read as an integer, before fixed-point scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolValue {
    pub raw: i128,
    pub sort: Sort,
}

impl SymbolValue {
    /// Integer value, rounding fixed-point values toward negative infinity.
    pub fn as_int(&self) -> i128 {
        self.raw >> self.sort.scale()
    }

    pub fn as_f64(&self) -> f64 {
        self.raw as f64 / 2f64.powi(self.sort.scale() as i32)
    }

    pub fn as_bool(&self) -> bool {
        self.raw != 0
    }
}

/// Assignment of every declared symbol.
#[derive(Debug, Clone, Default)]
pub struct Model {
    values: BTreeMap<SymbolId, SymbolValue>,
}

impl Model {
    pub fn get(&self, id: SymbolId) -> Option<SymbolValue> {
        self.values.get(&id).copied()
    }

    pub fn value_of(&self, expr: &Expr) -> Option<SymbolValue> {
        expr.as_symbol().and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub struct Solver {
    circuit: Circuit,
    config: SolverConfig,
    symbols: Vec<SymbolEntry>,
    scopes: Vec<Lit>,
    soft: Vec<Soft>,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl Solver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            circuit: Circuit::new(),
            config,
            symbols: Vec::new(),
            scopes: Vec::new(),
            soft: Vec::new(),
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Declares a fresh symbol and returns it as an expression.
    pub fn declare(&mut self, sort: Sort) -> Result<Expr, SolverError> {
        sort.validate()?;
        let bits = (0..sort.width()).map(|_| self.circuit.input()).collect();
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(SymbolEntry { sort, bits });
        trace!(symbol = %id, %sort, "declared symbol");
        Ok(Expr::Symbol(id))
    }

    pub fn sort_of(&self, id: SymbolId) -> Option<Sort> {
        self.symbols.get(id.0 as usize).map(|s| s.sort)
    }

    pub fn num_symbols(&self) -> usize {
        self.symbols.len()
    }

    /// Number of scopes currently open.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn lower(&mut self, expr: &Expr) -> Result<Lit, SolverError> {
        let mut encoder = Encoder {
            circuit: &mut self.circuit,
            symbols: &self.symbols,
            config: &self.config,
        };
        encoder.encode_bool(expr)
    }

    /// Adds a hard constraint, retracted by the `pop` matching the innermost
    /// open scope.
    pub fn assert(&mut self, expr: &Expr) -> Result<(), SolverError> {
        let lit = self.lower(expr)?;
        match self.scopes.last() {
            Some(&act) => self.circuit.add_clause(&[lit, !act]),
            None => self.circuit.add_clause(&[lit]),
        }
        Ok(())
    }

    pub fn assert_soft(&mut self, expr: &Expr, weight: u32) -> Result<(), SolverError> {
        let lit = self.lower(expr)?;
        self.push_soft(lit, weight);
        Ok(())
    }

    fn push_soft(&mut self, lit: Lit, weight: u32) {
        self.soft.push(Soft {
            lit,
            weight,
            depth: self.scopes.len(),
        });
    }

    /// Adds one soft preference per bit of `id` toward the pattern `raw`.
    pub fn prefer_bits(&mut self, id: SymbolId, raw: i128, weight: u32) -> Result<(), SolverError> {
        let bits = self
            .symbols
            .get(id.0 as usize)
            .map(|s| s.bits.clone())
            .ok_or(SolverError::UnknownSymbol(id))?;
        for (i, bit) in bits.into_iter().enumerate() {
            let set = (raw >> i.min(127)) & 1 == 1;
            self.push_soft(if set { bit } else { !bit }, weight);
        }
        Ok(())
    }

    pub fn push(&mut self) {
        let act = self.circuit.input();
        self.scopes.push(act);
    }

    /// Retracts the innermost scope. Its clauses become satisfied but stay
    /// in the backend, so a long-lived solver grows with every scope opened.
    pub fn pop(&mut self) -> Result<(), SolverError> {
        let act = self.scopes.pop().ok_or(SolverError::NoScope)?;
        // permanently satisfies every clause guarded by this scope
        self.circuit.add_clause(&[!act]);
        let depth = self.scopes.len();
        self.soft.retain(|s| s.depth <= depth);
        Ok(())
    }

    /// Checks hard constraints only.
    pub fn is_satisfiable(&mut self) -> Result<bool, SolverError> {
        let assumptions = self.scopes.clone();
        Ok(self.circuit.solve(&assumptions)?.is_some())
    }

    /// Solves hard constraints and then keeps as many soft constraints as
    /// the greedy order allows. `None` when the hard constraints conflict.
    pub fn check(&mut self) -> Result<Option<Model>, SolverError> {
        let mut assumptions = self.scopes.clone();
        let Some(mut assignment) = self.circuit.solve(&assumptions)? else {
            return Ok(None);
        };

        let mut order: Vec<Soft> = self.soft.clone();
        order.sort_by(|a, b| b.weight.cmp(&a.weight));
        let mut kept = 0usize;
        for soft in &order {
            if lit_value(&assignment, soft.lit) {
                assumptions.push(soft.lit);
                kept += 1;
                continue;
            }
            assumptions.push(soft.lit);
            match self.circuit.solve(&assumptions)? {
                Some(next) => {
                    assignment = next;
                    kept += 1;
                }
                None => {
                    assumptions.pop();
                }
            }
        }
        debug!(
            soft = order.len(),
            kept,
            vars = self.circuit.num_vars(),
            "check complete"
        );
        Ok(Some(self.decode(&assignment)))
    }

    pub fn maximize(&mut self, id: SymbolId) -> Result<Option<SymbolValue>, SolverError> {
        self.optimize(id, true)
    }

    pub fn minimize(&mut self, id: SymbolId) -> Result<Option<SymbolValue>, SolverError> {
        self.optimize(id, false)
    }

    /// Exact optimum of `id` under hard constraints, fixing bits from the
    /// most significant down. Soft constraints are ignored.
    fn optimize(&mut self, id: SymbolId, maximize: bool) -> Result<Option<SymbolValue>, SolverError> {
        let entry = self
            .symbols
            .get(id.0 as usize)
            .cloned()
            .ok_or(SolverError::UnknownSymbol(id))?;
        let mut assumptions = self.scopes.clone();
        let Some(mut assignment) = self.circuit.solve(&assumptions)? else {
            return Ok(None);
        };
        let signed = entry.sort.is_signed();
        let top = entry.bits.len() - 1;
        for (i, &bit) in entry.bits.iter().enumerate().rev() {
            // the sign bit orders the other way round
            let want = if signed && i == top { !maximize } else { maximize };
            let lit = if want { bit } else { !bit };
            if lit_value(&assignment, lit) {
                assumptions.push(lit);
                continue;
            }
            assumptions.push(lit);
            match self.circuit.solve(&assumptions)? {
                Some(next) => assignment = next,
                None => {
                    assumptions.pop();
                    assumptions.push(!lit);
                }
            }
        }
        let value = decode_symbol(&entry, &assignment);
        trace!(symbol = %id, raw = value.raw, maximize, "optimized");
        Ok(Some(value))
    }

    fn decode(&self, assignment: &[bool]) -> Model {
        let values = self
            .symbols
            .iter()
            .enumerate()
            .map(|(i, entry)| (SymbolId(i as u32), decode_symbol(entry, assignment)))
            .collect();
        Model { values }
    }
}

fn lit_value(assignment: &[bool], lit: Lit) -> bool {
    assignment
        .get(lit.var().index())
        .is_some_and(|&v| v == lit.is_positive())
}

fn decode_symbol(entry: &SymbolEntry, assignment: &[bool]) -> SymbolValue {
    let mut raw: i128 = 0;
    for (i, &bit) in entry.bits.iter().enumerate() {
        if lit_value(assignment, bit) {
            raw |= 1i128 << i;
        }
    }
    let width = entry.bits.len();
    if entry.sort.is_signed() && width < 128 && (raw >> (width - 1)) & 1 == 1 {
        raw |= -1i128 << width;
    }
    SymbolValue {
        raw,
        sort: entry.sort,
    }
}
