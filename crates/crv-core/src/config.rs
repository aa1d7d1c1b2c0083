//! Randomizer configuration.

use crv_ir::sort::MAX_SYMBOL_WIDTH;
use crv_solver::SolverConfig;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Weights and encodings used by `randomize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomizeConfig {
    /// Seed of the pool's RNG. None = seeded from OS entropy.
    pub seed: Option<u64>,
    /// Weight of soft constraints registered on variables and entities.
    pub soft_weight: u32,
    /// Weight of soft constraints passed to a single `randomize` call.
    pub adhoc_soft_weight: u32,
    /// Weight of the "prefer the drawn value" clause.
    pub preference_weight: u32,
    /// Probability of also preferring a value different from the current one.
    pub avoid_repeat_probability: f64,
    /// Add per-bit preferences toward the drawn value.
    pub bit_hints: bool,
    pub bit_hint_weight: u32,
    /// Integer bits of the fixed-point encoding of floating variables.
    pub real_int_bits: u32,
    /// Fractional bits of the fixed-point encoding of floating variables.
    pub real_frac_bits: u32,
}

impl Default for RandomizeConfig {
    fn default() -> Self {
        Self {
            seed: None,
            soft_weight: 100,
            adhoc_soft_weight: 1000,
            preference_weight: 100,
            avoid_repeat_probability: 0.5,
            bit_hints: true,
            bit_hint_weight: 1,
            real_int_bits: 40,
            real_frac_bits: 16,
        }
    }
}

impl RandomizeConfig {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CoreError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            real_frac_bits: self.real_frac_bits,
            ..SolverConfig::default()
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !(0.0..=1.0).contains(&self.avoid_repeat_probability) {
            return Err(CoreError::Configuration(format!(
                "avoid_repeat_probability must be within [0, 1], got {}",
                self.avoid_repeat_probability
            )));
        }
        if self.real_int_bits == 0 {
            return Err(CoreError::Configuration(
                "real_int_bits must be positive".to_string(),
            ));
        }
        let width = 1 + self.real_int_bits + self.real_frac_bits;
        if width > MAX_SYMBOL_WIDTH {
            return Err(CoreError::Configuration(format!(
                "fixed-point encoding of {width} bits exceeds {MAX_SYMBOL_WIDTH}"
            )));
        }
        Ok(())
    }
}
