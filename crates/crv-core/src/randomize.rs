//! Solver-backed randomization.
//!
//! A [`Prepared`] solver holds the domain and registered constraints of a
//! set of variables plus the feasible interval of each one. Every draw picks
//! a candidate per variable inside its interval, states it as a weighted
//! preference, and assigns whatever model the solver returns. Preferences
//! are scoped, so a prepared solver can be reused for any number of draws.

use std::collections::BTreeMap;

use crv_ir::expr::Expr;
use crv_ir::sort::SymbolId;
use crv_solver::Solver;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, trace};

use crate::config::RandomizeConfig;
use crate::constraint::{AdHoc, Arg, ConstraintSet};
use crate::error::CoreError;
use crate::kind::Kind;
use crate::pool::{Pool, VarId};
use crate::value::Value;

struct Target {
    id: VarId,
    kind: Kind,
    symbol: SymbolId,
    bounds: (Value, Value),
}

pub(crate) struct Prepared {
    solver: Solver,
    targets: Vec<Target>,
    terms: BTreeMap<VarId, Expr>,
    config: RandomizeConfig,
}

impl Prepared {
    /// Declares every variable in `vars` and asserts its domain, its own
    /// constraints and the constraints of every owner in `owners`.
    pub(crate) fn build(
        pool: &Pool,
        vars: &[VarId],
        owners: &[&ConstraintSet],
        target: &str,
    ) -> Result<Self, CoreError> {
        let config = pool.config().clone();
        let mut prepared = Prepared {
            solver: Solver::new(config.solver_config()),
            targets: Vec::with_capacity(vars.len()),
            terms: BTreeMap::new(),
            config,
        };

        for &id in vars {
            if prepared.terms.contains_key(&id) {
                continue;
            }
            let kind = pool.get(id)?.kind().clone();
            let term = prepared.solver.declare(kind.sort(&prepared.config))?;
            let symbol = term
                .as_symbol()
                .ok_or_else(|| CoreError::Configuration(format!("no solver symbol for {id}")))?;
            if let Some(domain) = kind.domain_constraint(&term, &prepared.config) {
                prepared.solver.assert(&domain)?;
            }
            prepared.terms.insert(id, term);
            prepared.targets.push(Target {
                id,
                bounds: kind.range(),
                kind,
                symbol,
            });
        }

        let ids: Vec<VarId> = prepared.targets.iter().map(|t| t.id).collect();
        for id in ids {
            let var = pool.get(id)?;
            let own = std::iter::once(Arg::Var(id));
            for c in var.constraints().hard() {
                let terms = prepared.resolve(pool, own.clone().chain(c.args().iter().copied()))?;
                prepared.solver.assert(&c.apply(&terms))?;
            }
            for c in var.constraints().soft() {
                let terms = prepared.resolve(pool, own.clone().chain(c.args().iter().copied()))?;
                prepared
                    .solver
                    .assert_soft(&c.apply(&terms), prepared.config.soft_weight)?;
            }
        }
        for owner in owners {
            for c in owner.hard() {
                let terms = prepared.resolve(pool, c.args().iter().copied())?;
                prepared.solver.assert(&c.apply(&terms))?;
            }
            for c in owner.soft() {
                let terms = prepared.resolve(pool, c.args().iter().copied())?;
                prepared
                    .solver
                    .assert_soft(&c.apply(&terms), prepared.config.soft_weight)?;
            }
        }

        debug!(
            owner = target,
            vars = prepared.targets.len(),
            owners = owners.len(),
            "built solver"
        );
        Ok(prepared)
    }

    /// Terms for `args`: the solver term of every variable being solved,
    /// the current value of any other variable.
    fn resolve(&self, pool: &Pool, args: impl Iterator<Item = Arg>) -> Result<Vec<Expr>, CoreError> {
        args.map(|arg| match arg {
            Arg::Const(c) => Ok(Expr::Const(c)),
            Arg::Var(id) => match self.terms.get(&id) {
                Some(term) => Ok(term.clone()),
                None => {
                    let var = pool.get(id)?;
                    Ok(var.kind().to_solver(var.value(), &self.config))
                }
            },
        })
        .collect()
    }

    fn assert_adhoc(&mut self, pool: &Pool, hard: &[AdHoc], soft: &[AdHoc]) -> Result<(), CoreError> {
        for c in hard {
            let terms = self.resolve(pool, c.args().iter().copied())?;
            self.solver.assert(&c.apply(&terms))?;
        }
        for c in soft {
            let terms = self.resolve(pool, c.args().iter().copied())?;
            self.solver
                .assert_soft(&c.apply(&terms), self.config.adhoc_soft_weight)?;
        }
        Ok(())
    }

    /// Tightens each variable's interval to its feasible minimum and
    /// maximum under the hard constraints asserted so far.
    pub(crate) fn compute_bounds(&mut self, target: &str) -> Result<(), CoreError> {
        for t in &mut self.targets {
            let hi = self.solver.maximize(t.symbol)?;
            let lo = self.solver.minimize(t.symbol)?;
            let (Some(lo), Some(hi)) = (lo, hi) else {
                return Err(CoreError::SolveFailure {
                    target: target.to_string(),
                });
            };
            t.bounds = (t.kind.from_solver(lo), t.kind.from_solver(hi));
            trace!(var = %t.id, lo = %t.bounds.0, hi = %t.bounds.1, "feasible interval");
        }
        Ok(())
    }

    /// One-shot randomization: ad-hoc constraints join the base solver
    /// before the intervals are computed.
    pub(crate) fn randomize(
        &mut self,
        pool: &mut Pool,
        hard: &[AdHoc],
        soft: &[AdHoc],
        target: &str,
    ) -> Result<(), CoreError> {
        self.assert_adhoc(pool, hard, &[])?;
        self.compute_bounds(target)?;
        self.draw(pool, soft, target)
    }

    /// Randomization against a cached solver whose intervals are already
    /// known; ad-hoc constraints live in a scope of their own.
    pub(crate) fn randomize_scoped(
        &mut self,
        pool: &mut Pool,
        hard: &[AdHoc],
        soft: &[AdHoc],
        target: &str,
    ) -> Result<(), CoreError> {
        self.solver.push();
        let result = self
            .assert_adhoc(pool, hard, &[])
            .and_then(|()| self.draw(pool, soft, target));
        self.solver.pop()?;
        result
    }

    fn draw(&mut self, pool: &mut Pool, soft: &[AdHoc], target: &str) -> Result<(), CoreError> {
        self.solver.push();
        let result = self.solve_with_preferences(pool, soft, target);
        self.solver.pop()?;
        for (id, value) in result? {
            pool.assign(id, value)?;
        }
        Ok(())
    }

    fn solve_with_preferences(
        &mut self,
        pool: &mut Pool,
        soft: &[AdHoc],
        target: &str,
    ) -> Result<Vec<(VarId, Value)>, CoreError> {
        self.assert_adhoc(pool, &[], soft)?;

        let config = &self.config;
        for t in &self.targets {
            let term = Expr::Symbol(t.symbol);
            let current = pool.value(t.id)?;
            let candidate = sample(&t.kind, t.bounds, pool.rng())?;
            trace!(var = %t.id, %candidate, "drawn candidate");
            self.solver
                .assert_soft(&term.eq(t.kind.to_solver(candidate, config)), config.preference_weight)?;

            if pool.rng().gen_bool(config.avoid_repeat_probability) && within(current, t.bounds) {
                self.solver
                    .assert_soft(&term.ne(t.kind.to_solver(current, config)), config.preference_weight)?;
            }

            if config.bit_hints {
                let raw = raw_pattern(&t.kind, candidate, config);
                self.solver.prefer_bits(t.symbol, raw, config.bit_hint_weight)?;
            }
        }

        let model = self.solver.check()?.ok_or_else(|| CoreError::SolveFailure {
            target: target.to_string(),
        })?;
        let mut values = Vec::with_capacity(self.targets.len());
        for t in &self.targets {
            let solved = model.get(t.symbol).ok_or_else(|| CoreError::SolveFailure {
                target: target.to_string(),
            })?;
            let value = t.kind.cast(t.kind.from_solver(solved))?;
            values.push((t.id, value));
        }
        debug!(owner = target, vars = values.len(), "randomized");
        Ok(values)
    }
}

/// Finite values inside `bounds`; NaN and infinities never are.
fn within(value: Value, (lo, hi): (Value, Value)) -> bool {
    let finite = !matches!(value, Value::Float(f) if !f.is_finite());
    finite && value.compare(&lo).is_some_and(|o| o.is_ge()) && value.compare(&hi).is_some_and(|o| o.is_le())
}

/// Uniform candidate within `bounds`, cast to the kind.
fn sample(kind: &Kind, (lo, hi): (Value, Value), rng: &mut impl Rng) -> Result<Value, CoreError> {
    match kind {
        Kind::Float(_) => {
            let (lo, hi) = (lo.as_f64(), hi.as_f64());
            let x = if lo < hi { rng.gen_range(lo..=hi) } else { lo };
            kind.cast(Value::Float(x))
        }
        Kind::Enum { domain, .. } => {
            let (lo, hi) = (lo.as_int().unwrap_or_default(), hi.as_int().unwrap_or_default());
            let feasible: Vec<i128> = domain.values().filter(|v| (lo..=hi).contains(v)).collect();
            Ok(Value::Int(feasible.choose(rng).copied().unwrap_or(lo)))
        }
        _ => {
            let lo = lo.as_int().unwrap_or_default();
            let hi = hi.as_int().unwrap_or_default();
            let x = if lo < hi { rng.gen_range(lo..=hi) } else { lo };
            kind.cast(Value::Int(x))
        }
    }
}

/// Bit pattern of `value` in the kind's solver encoding.
fn raw_pattern(kind: &Kind, value: Value, config: &RandomizeConfig) -> i128 {
    match kind {
        Kind::Float(_) => {
            let scaled = value.as_f64() * 2f64.powi(config.real_frac_bits as i32);
            scaled.round() as i128
        }
        _ => value.as_int().unwrap_or_default(),
    }
}
