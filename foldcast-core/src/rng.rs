//! Deterministic seed derivation for stochastic forecasters.
//!
//! A configured master seed is expanded into per-(scope, key) sub-seeds via
//! BLAKE3. Derivation is hash-based, so each fold gets the same seed whatever
//! thread or order it runs in, and no forecaster ever touches ambient RNG state.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Seed hierarchy rooted at one master seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive a sub-seed for `scope` (usually a model name) and `key` (usually
    /// the day number of the training window's last date, which identifies the fold).
    pub fn sub_seed(&self, scope: &str, key: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(scope.as_bytes());
        hasher.update(&key.to_le_bytes());
        let hash = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(head)
    }

    /// Seeded `StdRng` for `(scope, key)`.
    pub fn rng_for(&self, scope: &str, key: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(scope, key))
    }
}
