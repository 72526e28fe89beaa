//! Fold generation — deterministic train/test partitions of a series.
//!
//! Folds are anchored at the series origin and laid out earliest first:
//!
//! - Expanding: fold `i` trains on `[0, min_train + i*horizon)`.
//! - Sliding: fold `i` trains on `[i*horizon, i*horizon + min_train)`.
//! - Both: test window is `[train_end + gap, train_end + gap + horizon)`.
//!
//! Test windows of consecutive folds are contiguous and never overlap. There
//! is no randomness anywhere in this module: the plan is a pure function of
//! `(series length, config)`.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::series::{DateSpan, Series};
use crate::split::{SplitConfig, SplitStrategy};

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors from fold planning.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SplitError {
    #[error("insufficient data: fold plan needs {required} observations, series has {available}")]
    InsufficientData { required: usize, available: usize },
}

/// Violated leakage invariant. Always a defect in fold construction, never a user error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LeakageError {
    #[error("fold {fold_index}: empty train or test window")]
    EmptyWindow { fold_index: usize },
    #[error(
        "fold {fold_index}: last train index {train_max} + gap {gap} is not before first test index {test_min}"
    )]
    TrainReachesTest {
        fold_index: usize,
        train_max: usize,
        test_min: usize,
        gap: usize,
    },
    #[error("fold {fold_index}: window ends at {end} beyond series length {series_len}")]
    OutOfBounds {
        fold_index: usize,
        end: usize,
        series_len: usize,
    },
    #[error("fold at position {position} has index {fold_index}")]
    FoldOrder { position: usize, fold_index: usize },
}

// ─── Fold types ──────────────────────────────────────────────────────

/// Index bounds of one fold. All ranges are half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FoldBounds {
    pub fold_index: usize,
    /// Train start index (inclusive).
    pub train_start: usize,
    /// Train end index (exclusive).
    pub train_end: usize,
    /// Test start index (inclusive).
    pub test_start: usize,
    /// Test end index (exclusive).
    pub test_end: usize,
}

impl FoldBounds {
    pub fn train_indices(&self) -> Range<usize> {
        self.train_start..self.train_end
    }

    pub fn test_indices(&self) -> Range<usize> {
        self.test_start..self.test_end
    }

    pub fn train_len(&self) -> usize {
        self.train_end.saturating_sub(self.train_start)
    }

    pub fn test_len(&self) -> usize {
        self.test_end.saturating_sub(self.test_start)
    }

    /// Check the per-fold invariants: non-empty windows, `max(train) + gap < min(test)`,
    /// both windows inside the series.
    pub fn check(&self, gap: usize, series_len: usize) -> Result<(), LeakageError> {
        if self.train_len() == 0 || self.test_len() == 0 {
            return Err(LeakageError::EmptyWindow {
                fold_index: self.fold_index,
            });
        }
        let train_max = self.train_end - 1;
        if train_max.saturating_add(gap) >= self.test_start {
            return Err(LeakageError::TrainReachesTest {
                fold_index: self.fold_index,
                train_max,
                test_min: self.test_start,
                gap,
            });
        }
        let end = self.train_end.max(self.test_end);
        if end > series_len {
            return Err(LeakageError::OutOfBounds {
                fold_index: self.fold_index,
                end,
                series_len,
            });
        }
        Ok(())
    }
}

/// One train/test partition of a series, with the dates each window covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesSplit {
    pub bounds: FoldBounds,
    pub train_dates: DateSpan,
    pub test_dates: DateSpan,
}

impl TimeSeriesSplit {
    pub fn fold_index(&self) -> usize {
        self.bounds.fold_index
    }

    pub fn train_indices(&self) -> Range<usize> {
        self.bounds.train_indices()
    }

    pub fn test_indices(&self) -> Range<usize> {
        self.bounds.test_indices()
    }

    pub fn train_len(&self) -> usize {
        self.bounds.train_len()
    }

    pub fn test_len(&self) -> usize {
        self.bounds.test_len()
    }
}

// ─── Planning ────────────────────────────────────────────────────────

/// Plan fold bounds for a series of `series_len` observations.
///
/// Fails with `InsufficientData` when
/// `series_len < min_train_size + gap + horizon * n_splits`; otherwise returns
/// exactly `n_splits` folds.
pub fn plan_folds(series_len: usize, config: &SplitConfig) -> Result<Vec<FoldBounds>, SplitError> {
    let required = config.required_len();
    if series_len < required {
        return Err(SplitError::InsufficientData {
            required,
            available: series_len,
        });
    }

    let horizon = config.horizon();
    let min_train = config.min_train_size();

    let folds = (0..config.n_splits())
        .map(|i| {
            let advance = i * horizon;
            let (train_start, train_end) = match config.strategy() {
                SplitStrategy::Expanding => (0, min_train + advance),
                SplitStrategy::Sliding => (advance, advance + min_train),
            };
            let test_start = train_end + config.gap();
            FoldBounds {
                fold_index: i,
                train_start,
                train_end,
                test_start,
                test_end: test_start + horizon,
            }
        })
        .collect();

    Ok(folds)
}

/// Produces the folds of one `(Series, SplitConfig)` pair.
#[derive(Debug, Clone)]
pub struct FoldGenerator {
    config: SplitConfig,
}

impl FoldGenerator {
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Eagerly generate all folds, earliest first.
    pub fn split(&self, series: &Series) -> Result<Vec<TimeSeriesSplit>, SplitError> {
        let bounds = plan_folds(series.len(), &self.config)?;
        debug!(
            entity = series.entity(),
            series_len = series.len(),
            n_folds = bounds.len(),
            strategy = self.config.strategy().as_str(),
            "planned folds"
        );

        let mut folds = Vec::with_capacity(bounds.len());
        for b in bounds {
            // plan_folds keeps every window inside the series, so both spans exist.
            let (Some(train_dates), Some(test_dates)) = (
                series.date_span(b.train_indices()),
                series.date_span(b.test_indices()),
            ) else {
                return Err(SplitError::InsufficientData {
                    required: self.config.required_len(),
                    available: series.len(),
                });
            };
            folds.push(TimeSeriesSplit {
                bounds: b,
                train_dates,
                test_dates,
            });
        }
        Ok(folds)
    }
}

// ─── Leakage validation ──────────────────────────────────────────────

/// Post-condition check over a generated fold set.
///
/// Every fold must satisfy [`FoldBounds::check`] and folds must be numbered
/// `0, 1, 2, ...` in output order. Violations are logged at error level.
pub fn validate_no_leakage(
    folds: &[TimeSeriesSplit],
    gap: usize,
    series_len: usize,
) -> Result<(), LeakageError> {
    for (position, fold) in folds.iter().enumerate() {
        let result = if fold.fold_index() != position {
            Err(LeakageError::FoldOrder {
                position,
                fold_index: fold.fold_index(),
            })
        } else {
            fold.bounds.check(gap, series_len)
        };

        if let Err(e) = result {
            error!(
                fold_index = fold.fold_index(),
                train_start = fold.bounds.train_start,
                train_end = fold.bounds.train_end,
                test_start = fold.bounds.test_start,
                test_end = fold.bounds.test_end,
                gap,
                series_len,
                error = %e,
                "leakage invariant violated"
            );
            return Err(e);
        }
    }
    Ok(())
}
