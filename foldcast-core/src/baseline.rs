//! Baseline set — the reference models every backtest is compared against.
//!
//! The two mandatory baselines (naive and seasonal-naive) are always present
//! and always first. Extra baselines may be appended under unique keys.

use crate::forecast::{FactoryError, ModelConfig, ModelSpec};

pub const NAIVE_KEY: &str = "naive";
pub const SEASONAL_NAIVE_KEY: &str = "seasonal_naive";

/// Default season length (weekly pattern in daily data).
pub const DEFAULT_SEASON_LENGTH: usize = 7;

#[derive(Debug, Clone)]
pub struct BaselineSet {
    specs: Vec<ModelSpec>,
}

impl BaselineSet {
    /// The mandatory pair: last value carried forward and same position of the
    /// previous season of `season_length` steps.
    pub fn standard(season_length: usize) -> Result<Self, FactoryError> {
        Ok(Self {
            specs: vec![
                ModelSpec::builtin(NAIVE_KEY, ModelConfig::Naive)?,
                ModelSpec::builtin(
                    SEASONAL_NAIVE_KEY,
                    ModelConfig::SeasonalNaive { season_length },
                )?,
            ],
        })
    }

    /// Append an extra baseline. Keys must be unique.
    pub fn with_extra(mut self, spec: ModelSpec) -> Result<Self, FactoryError> {
        if self.contains(spec.key()) {
            return Err(FactoryError::DuplicateKey(spec.key().to_string()));
        }
        self.specs.push(spec);
        Ok(self)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.specs.iter().any(|s| s.key() == key)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelSpec> {
        self.specs.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(ModelSpec::key)
    }
}
