//! Accuracy metrics — pure functions scoring forecasts against actuals.
//!
//! Every metric takes equal-length `actual` / `predicted` slices and returns
//! a scalar. Edge cases never panic: they resolve to NaN and push a
//! [`MetricWarning`] so aggregation can decide how to treat the gap.
//!
//! - MAE   = mean(|a - p|)
//! - sMAPE = 100/n · Σ 2|a - p| / (|a| + |p|), scale 0–200, `a = p = 0` scores 0
//! - WAPE  = 100 · Σ|a - p| / Σ|a|
//! - Bias  = mean(a - p), positive means under-forecasting

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Below this magnitude a mean is treated as zero for stability and improvement ratios.
pub const ZERO_EPSILON: f64 = 1e-12;

/// Precondition violation on metric inputs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetricsError {
    #[error("length mismatch: {actual} actual values vs {predicted} predicted values")]
    LengthMismatch { actual: usize, predicted: usize },
}

/// Structured record of a metric edge case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricWarning {
    /// No observations to score; every metric is NaN.
    EmptyInput,
    /// sMAPE term at `position` had an undefined denominator and was left out.
    SmapeExcluded { position: usize },
    /// Σ|actual| is zero; WAPE is NaN.
    WapeZeroDenominator,
    /// Actual or predicted value at `position` is NaN or infinite.
    NonFiniteInput { position: usize },
    /// Mean of a per-fold metric is zero or undefined; its stability is NaN.
    StabilityUndefined { metric: MetricKind },
}

impl fmt::Display for MetricWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "empty input, all metrics undefined"),
            Self::SmapeExcluded { position } => {
                write!(f, "sMAPE element {position} excluded (undefined denominator)")
            }
            Self::WapeZeroDenominator => write!(f, "WAPE undefined: sum of |actual| is zero"),
            Self::NonFiniteInput { position } => {
                write!(f, "non-finite input at position {position}")
            }
            Self::StabilityUndefined { metric } => {
                write!(f, "{metric} stability undefined: mean is zero")
            }
        }
    }
}

// ─── Metric set ──────────────────────────────────────────────────────

/// The fixed set of per-fold accuracy metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    #[serde(with = "crate::serde_nan")]
    pub mae: f64,
    #[serde(with = "crate::serde_nan")]
    pub smape: f64,
    #[serde(with = "crate::serde_nan")]
    pub wape: f64,
    #[serde(with = "crate::serde_nan")]
    pub bias: f64,
}

impl MetricSet {
    pub const NAN: Self = Self {
        mae: f64::NAN,
        smape: f64::NAN,
        wape: f64::NAN,
        bias: f64::NAN,
    };

    /// Build a set by evaluating `f` for each metric.
    pub fn from_fn(mut f: impl FnMut(MetricKind) -> f64) -> Self {
        Self {
            mae: f(MetricKind::Mae),
            smape: f(MetricKind::Smape),
            wape: f(MetricKind::Wape),
            bias: f(MetricKind::Bias),
        }
    }

    pub fn get(&self, kind: MetricKind) -> f64 {
        kind.extract(self)
    }
}

/// Identifies one metric of a [`MetricSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Mae,
    Smape,
    Wape,
    Bias,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [Self::Mae, Self::Smape, Self::Wape, Self::Bias];

    pub fn extract(&self, metrics: &MetricSet) -> f64 {
        match self {
            Self::Mae => metrics.mae,
            Self::Smape => metrics.smape,
            Self::Wape => metrics.wape,
            Self::Bias => metrics.bias,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Mae => "mae",
            Self::Smape => "smape",
            Self::Wape => "wape",
            Self::Bias => "bias",
        }
    }

    /// Percent improvement of `candidate` over `reference` (positive = candidate better).
    ///
    /// Error metrics compare raw values; bias compares magnitudes, so a bias of
    /// -2 beats a bias of +5. NaN when either side is undefined or the reference is zero.
    pub fn improvement_pct(&self, candidate: f64, reference: f64) -> f64 {
        let (c, r) = match self {
            Self::Bias => (candidate.abs(), reference.abs()),
            _ => (candidate, reference),
        };
        if !c.is_finite() || !r.is_finite() || r.abs() < ZERO_EPSILON {
            return f64::NAN;
        }
        (r - c) / r.abs() * 100.0
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Engine ──────────────────────────────────────────────────────────

/// Metrics for one (actual, predicted) pair plus any edge cases hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEvaluation {
    pub metrics: MetricSet,
    pub warnings: Vec<MetricWarning>,
}

/// Scores forecasts. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsEngine;

impl MetricsEngine {
    /// Compute the full [`MetricSet`]. Unequal lengths are rejected, never truncated.
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<MetricEvaluation, MetricsError> {
        if actual.len() != predicted.len() {
            return Err(MetricsError::LengthMismatch {
                actual: actual.len(),
                predicted: predicted.len(),
            });
        }

        let mut warnings = Vec::new();
        if actual.is_empty() {
            warn!("metric input is empty; all metrics are NaN");
            warnings.push(MetricWarning::EmptyInput);
            return Ok(MetricEvaluation {
                metrics: MetricSet::NAN,
                warnings,
            });
        }

        for (position, (a, p)) in actual.iter().zip(predicted).enumerate() {
            if !a.is_finite() || !p.is_finite() {
                warn!(position, actual = a, predicted = p, "non-finite metric input");
                warnings.push(MetricWarning::NonFiniteInput { position });
            }
        }

        let metrics = MetricSet {
            mae: mae(actual, predicted),
            smape: smape(actual, predicted, &mut warnings),
            wape: wape(actual, predicted, &mut warnings),
            bias: bias(actual, predicted),
        };
        Ok(MetricEvaluation { metrics, warnings })
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Mean absolute error. NaN for empty input.
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    mean_of(actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()))
}

/// Mean signed error `a - p`. NaN for empty input.
pub fn bias(actual: &[f64], predicted: &[f64]) -> f64 {
    mean_of(actual.iter().zip(predicted).map(|(a, p)| a - p))
}

/// Symmetric MAPE on the 0–200 scale.
///
/// An element with `a = 0` and `p = 0` is a perfect match and contributes 0.
/// Any other element whose denominator is zero or non-finite is excluded and
/// reported; `n` counts only the included elements.
pub fn smape(actual: &[f64], predicted: &[f64], warnings: &mut Vec<MetricWarning>) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for (position, (&a, &p)) in actual.iter().zip(predicted).enumerate() {
        if a == 0.0 && p == 0.0 {
            n += 1;
            continue;
        }
        let denom = a.abs() + p.abs();
        let term = 2.0 * (a - p).abs() / denom;
        if denom <= 0.0 || !term.is_finite() {
            warn!(position, actual = a, predicted = p, "sMAPE element excluded");
            warnings.push(MetricWarning::SmapeExcluded { position });
            continue;
        }
        sum += term;
        n += 1;
    }
    if n == 0 {
        return f64::NAN;
    }
    100.0 * sum / n as f64
}

/// Weighted absolute percentage error. NaN when Σ|a| is zero.
pub fn wape(actual: &[f64], predicted: &[f64], warnings: &mut Vec<MetricWarning>) -> f64 {
    let total: f64 = actual.iter().map(|a| a.abs()).sum();
    if total == 0.0 {
        warn!(n = actual.len(), "WAPE undefined: sum of |actual| is zero");
        warnings.push(MetricWarning::WapeZeroDenominator);
        return f64::NAN;
    }
    let abs_err: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum();
    100.0 * abs_err / total
}

fn mean_of(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        return f64::NAN;
    }
    sum / n as f64
}

// ─── Cross-fold aggregation ──────────────────────────────────────────

/// Mean of the finite values; NaN when there are none.
pub fn finite_mean(values: &[f64]) -> f64 {
    mean_of(values.iter().copied().filter(|v| v.is_finite()))
}

/// Population standard deviation of the finite values; NaN when there are none.
pub fn finite_std(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / finite.len() as f64;
    var.sqrt()
}

/// Coefficient of variation in percent: `100 · std / |mean|`. Lower is more stable.
///
/// NaN when the mean is zero (within [`ZERO_EPSILON`]) or undefined.
pub fn stability_index(values: &[f64]) -> f64 {
    let mean = finite_mean(values);
    if !mean.is_finite() || mean.abs() < ZERO_EPSILON {
        return f64::NAN;
    }
    100.0 * finite_std(values) / mean.abs()
}

/// Count of folds contributing a finite value, per metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricCounts {
    pub mae: usize,
    pub smape: usize,
    pub wape: usize,
    pub bias: usize,
}

/// Cross-fold summary of one model's per-fold metrics.
///
/// The mean alone hides a fold that collapsed; `std` and `stability` keep the
/// spread visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: MetricSet,
    pub std: MetricSet,
    pub stability: MetricSet,
    pub contributing: MetricCounts,
    pub warnings: Vec<MetricWarning>,
}

impl MetricSummary {
    /// Aggregate per-fold metric sets. NaN entries are skipped per metric.
    pub fn from_folds(folds: &[MetricSet]) -> Self {
        let column = |kind: MetricKind| -> Vec<f64> { folds.iter().map(|m| kind.extract(m)).collect() };
        let count = |kind: MetricKind| column(kind).iter().filter(|v| v.is_finite()).count();

        let mut warnings = Vec::new();
        let stability = MetricSet::from_fn(|kind| {
            let values = column(kind);
            let s = stability_index(&values);
            if s.is_nan() && !folds.is_empty() {
                warn!(metric = kind.name(), "stability undefined: mean is zero or undefined");
                warnings.push(MetricWarning::StabilityUndefined { metric: kind });
            }
            s
        });

        Self {
            mean: MetricSet::from_fn(|kind| finite_mean(&column(kind))),
            std: MetricSet::from_fn(|kind| finite_std(&column(kind))),
            stability,
            contributing: MetricCounts {
                mae: count(MetricKind::Mae),
                smape: count(MetricKind::Smape),
                wape: count(MetricKind::Wape),
                bias: count(MetricKind::Bias),
            },
            warnings,
        }
    }
}
