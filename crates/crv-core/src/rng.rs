//! Deterministic RNG seeding with ChaCha8.
//!
//! A pool created with a seed replays the same draws, and therefore the
//! same randomized values, on every run.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// RNG for `seed`, or from OS entropy when there is none.
pub fn pool_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}
