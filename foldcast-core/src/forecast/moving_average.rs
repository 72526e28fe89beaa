//! Moving-average forecaster: flat forecast at the mean of the last `window` points.

use super::{require_len, FittedModel, ForecastError, Forecaster};
use crate::series::SeriesView;

#[derive(Debug, Clone, Copy)]
pub struct MovingAverage {
    window: usize,
}

impl MovingAverage {
    pub fn new(window: usize) -> Result<Self, ForecastError> {
        if window == 0 {
            return Err(ForecastError::InvalidParameter(
                "window must be at least 1".into(),
            ));
        }
        Ok(Self { window })
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

struct MovingAverageFit {
    level: f64,
}

impl Forecaster for MovingAverage {
    fn name(&self) -> &str {
        "MovingAverage"
    }

    fn fit(&self, train: &SeriesView<'_>) -> Result<Box<dyn FittedModel>, ForecastError> {
        require_len(train, self.window)?;
        let values = train.values();
        let tail = &values[values.len() - self.window..];
        let level = tail.iter().sum::<f64>() / self.window as f64;
        Ok(Box::new(MovingAverageFit { level }))
    }
}

impl FittedModel for MovingAverageFit {
    fn predict(&self, horizon: usize) -> Result<Vec<f64>, ForecastError> {
        Ok(vec![self.level; horizon])
    }
}
