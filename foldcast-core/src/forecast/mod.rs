//! Forecaster contract and built-in models.
//!
//! A [`Forecaster`] is an unfitted model configuration. Fitting it on one
//! training window yields a [`FittedModel`] that owns everything it learned,
//! so a fitted model can never see data from another fold. The backtester
//! creates a fresh forecaster for every fold/model cell.

mod drift;
mod factory;
mod moving_average;
mod naive;
mod random_walk;

pub use drift::Drift;
pub use factory::{
    create_forecaster, FactoryError, ForecasterRegistry, ModelConfig, ModelSpec, ParamMap,
};
pub use moving_average::MovingAverage;
pub use naive::{Naive, SeasonalNaive};
pub use random_walk::SampledRandomWalk;

use thiserror::Error;

use crate::series::SeriesView;

/// Errors raised by a forecaster. These belong to the model, not the backtest.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForecastError {
    #[error("insufficient training data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("prediction length mismatch: requested {expected}, got {got}")]
    WrongLength { expected: usize, got: usize },
    #[error("non-finite prediction {value} at step {position}")]
    NonFinite { position: usize, value: f64 },
    #[error("model failure: {0}")]
    Model(String),
}

/// Unfitted model.
pub trait Forecaster {
    /// Human-readable model name.
    fn name(&self) -> &str;

    /// Fit on one training window.
    fn fit(&self, train: &SeriesView<'_>) -> Result<Box<dyn FittedModel>, ForecastError>;
}

/// Model fitted on one training window.
pub trait FittedModel {
    /// Forecast the next `horizon` steps after the training window, in time order.
    /// Must return exactly `horizon` values.
    fn predict(&self, horizon: usize) -> Result<Vec<f64>, ForecastError>;
}

/// Boxed forecaster, as produced by factories.
pub type BoxedForecaster = Box<dyn Forecaster>;

fn require_len(train: &SeriesView<'_>, needed: usize) -> Result<(), ForecastError> {
    if train.len() < needed {
        return Err(ForecastError::InsufficientData {
            needed,
            got: train.len(),
        });
    }
    Ok(())
}
