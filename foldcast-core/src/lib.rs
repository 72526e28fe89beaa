//! Foldcast Core — series, fold generation, accuracy metrics, forecaster contract.
//!
//! This crate contains the leakage-critical pieces of the backtesting engine:
//! - `Series`: validated, immutable per-entity observations
//! - `SplitConfig` + `FoldGenerator`: deterministic expanding/sliding folds
//!   with a latency gap, plus the `validate_no_leakage` post-condition
//! - `MetricsEngine`: MAE, sMAPE, WAPE, bias with NaN-plus-warning edge cases
//! - `Forecaster` / `FittedModel`: the fit/predict contract, built-in models,
//!   the factory registry and the mandatory `BaselineSet`

pub mod baseline;
pub mod folds;
pub mod forecast;
pub mod metrics;
pub mod rng;
pub mod serde_nan;
pub mod series;
pub mod split;

pub use baseline::{BaselineSet, DEFAULT_SEASON_LENGTH, NAIVE_KEY, SEASONAL_NAIVE_KEY};
pub use folds::{
    plan_folds, validate_no_leakage, FoldBounds, FoldGenerator, LeakageError, SplitError,
    TimeSeriesSplit,
};
pub use forecast::{
    create_forecaster, BoxedForecaster, FactoryError, FittedModel, ForecastError, Forecaster,
    ForecasterRegistry, ModelConfig, ModelSpec, ParamMap,
};
pub use metrics::{
    MetricEvaluation, MetricKind, MetricSet, MetricSummary, MetricWarning, MetricsEngine,
    MetricsError,
};
pub use rng::RngHierarchy;
pub use series::{DateSpan, Series, SeriesError, SeriesView};
pub use split::{ConfigError, SplitConfig, SplitStrategy};
