//! Split configuration — validated fold plan parameters.
//!
//! A `SplitConfig` can only exist in a valid state: fields are private and
//! every construction path (constructors and deserialization) goes through
//! [`SplitConfig::new`].

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Allowed number of folds.
pub const N_SPLITS_RANGE: RangeInclusive<usize> = 2..=20;

/// Largest allowed gap between training end and test start.
pub const MAX_GAP: usize = 30;

/// How the training window moves between folds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Training always starts at the series origin and grows by `horizon` per fold.
    #[default]
    Expanding,
    /// Training window has constant length `min_train_size` and slides by `horizon`.
    Sliding,
}

impl SplitStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expanding => "expanding",
            Self::Sliding => "sliding",
        }
    }
}

/// Rejected split configuration, naming the offending field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("n_splits must be in [{min}, {max}], got {value}")]
    NSplitsOutOfRange { value: usize, min: usize, max: usize },
    #[error("min_train_size must be at least 1, got {0}")]
    MinTrainSizeTooSmall(usize),
    #[error("gap must be in [0, {max}], got {value}")]
    GapOutOfRange { value: usize, max: usize },
    #[error("horizon must be at least 1, got {0}")]
    HorizonTooSmall(usize),
    #[error("horizon ({horizon}) must be greater than gap ({gap})")]
    HorizonNotAfterGap { horizon: usize, gap: usize },
}

impl ConfigError {
    /// Name of the field that failed validation.
    pub fn field(&self) -> &'static str {
        match self {
            Self::NSplitsOutOfRange { .. } => "n_splits",
            Self::MinTrainSizeTooSmall(_) => "min_train_size",
            Self::GapOutOfRange { .. } => "gap",
            Self::HorizonTooSmall(_) | Self::HorizonNotAfterGap { .. } => "horizon",
        }
    }
}

/// Fold plan parameters. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "SplitConfigFields")]
pub struct SplitConfig {
    strategy: SplitStrategy,
    n_splits: usize,
    min_train_size: usize,
    gap: usize,
    horizon: usize,
}

#[derive(Deserialize)]
struct SplitConfigFields {
    #[serde(default)]
    strategy: SplitStrategy,
    n_splits: usize,
    min_train_size: usize,
    #[serde(default)]
    gap: usize,
    horizon: usize,
}

impl TryFrom<SplitConfigFields> for SplitConfig {
    type Error = ConfigError;

    fn try_from(f: SplitConfigFields) -> Result<Self, Self::Error> {
        SplitConfig::new(f.strategy, f.n_splits, f.min_train_size, f.gap, f.horizon)
    }
}

impl SplitConfig {
    pub fn new(
        strategy: SplitStrategy,
        n_splits: usize,
        min_train_size: usize,
        gap: usize,
        horizon: usize,
    ) -> Result<Self, ConfigError> {
        if !N_SPLITS_RANGE.contains(&n_splits) {
            return Err(ConfigError::NSplitsOutOfRange {
                value: n_splits,
                min: *N_SPLITS_RANGE.start(),
                max: *N_SPLITS_RANGE.end(),
            });
        }
        if min_train_size < 1 {
            return Err(ConfigError::MinTrainSizeTooSmall(min_train_size));
        }
        if gap > MAX_GAP {
            return Err(ConfigError::GapOutOfRange {
                value: gap,
                max: MAX_GAP,
            });
        }
        if horizon < 1 {
            return Err(ConfigError::HorizonTooSmall(horizon));
        }
        if horizon <= gap {
            return Err(ConfigError::HorizonNotAfterGap { horizon, gap });
        }
        Ok(Self {
            strategy,
            n_splits,
            min_train_size,
            gap,
            horizon,
        })
    }

    pub fn expanding(
        n_splits: usize,
        min_train_size: usize,
        gap: usize,
        horizon: usize,
    ) -> Result<Self, ConfigError> {
        Self::new(SplitStrategy::Expanding, n_splits, min_train_size, gap, horizon)
    }

    pub fn sliding(
        n_splits: usize,
        min_train_size: usize,
        gap: usize,
        horizon: usize,
    ) -> Result<Self, ConfigError> {
        Self::new(SplitStrategy::Sliding, n_splits, min_train_size, gap, horizon)
    }

    pub fn strategy(&self) -> SplitStrategy {
        self.strategy
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    pub fn min_train_size(&self) -> usize {
        self.min_train_size
    }

    pub fn gap(&self) -> usize {
        self.gap
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Minimum series length that fits this plan:
    /// `min_train_size + gap + horizon * n_splits`. Saturates instead of overflowing.
    pub fn required_len(&self) -> usize {
        self.min_train_size
            .saturating_add(self.gap)
            .saturating_add(self.horizon.saturating_mul(self.n_splits))
    }

    /// Deterministic content hash for deduplication by a run registry.
    pub fn config_hash(&self) -> String {
        use serde_json::json;

        // Canonical serialization (sorted keys)
        let canonical = json!({
            "gap": self.gap,
            "horizon": self.horizon,
            "min_train_size": self.min_train_size,
            "n_splits": self.n_splits,
            "strategy": self.strategy.as_str(),
        });
        blake3::hash(canonical.to_string().as_bytes())
            .to_hex()
            .to_string()
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            strategy: SplitStrategy::Expanding,
            n_splits: 5,
            min_train_size: 30,
            gap: 0,
            horizon: 14,
        }
    }
}
