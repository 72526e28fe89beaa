//! Drift forecaster: extends the line through the first and last training points.

use super::{FittedModel, ForecastError, Forecaster};
use crate::series::SeriesView;

#[derive(Debug, Clone, Copy, Default)]
pub struct Drift;

impl Drift {
    pub fn new() -> Self {
        Self
    }
}

struct DriftFit {
    last: f64,
    slope: f64,
}

impl Forecaster for Drift {
    fn name(&self) -> &str {
        "Drift"
    }

    fn fit(&self, train: &SeriesView<'_>) -> Result<Box<dyn FittedModel>, ForecastError> {
        let values = train.values();
        let (Some(&first), Some(&last)) = (values.first(), values.last()) else {
            return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
        };
        // A single observation has no slope; fall back to naive.
        let slope = if values.len() > 1 {
            (last - first) / (values.len() - 1) as f64
        } else {
            0.0
        };
        Ok(Box::new(DriftFit { last, slope }))
    }
}

impl FittedModel for DriftFit {
    fn predict(&self, horizon: usize) -> Result<Vec<f64>, ForecastError> {
        Ok((1..=horizon)
            .map(|h| self.last + self.slope * h as f64)
            .collect())
    }
}
