//! Uniform-random routing policy.

use crate::traits::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Picks a server uniformly at random on every arrival.
///
/// Owns a seeded RNG so runs are reproducible.
pub struct Random {
    rng: ChaCha8Rng,
}

impl Random {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RoutingPolicy for Random {
    fn route(&mut self, _request: &RequestInfo, servers: &[ServerSnapshot]) -> Option<u32> {
        if servers.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..servers.len());
        Some(servers[idx].id)
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
