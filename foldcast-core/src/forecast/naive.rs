//! Naive and seasonal-naive forecasters — the mandatory baselines.

use super::{require_len, FittedModel, ForecastError, Forecaster};
use crate::series::SeriesView;

/// Carries the last observed value forward.
#[derive(Debug, Clone, Copy, Default)]
pub struct Naive;

impl Naive {
    pub fn new() -> Self {
        Self
    }
}

struct NaiveFit {
    last: f64,
}

impl Forecaster for Naive {
    fn name(&self) -> &str {
        "Naive"
    }

    fn fit(&self, train: &SeriesView<'_>) -> Result<Box<dyn FittedModel>, ForecastError> {
        let last = train.last_value().ok_or(ForecastError::InsufficientData {
            needed: 1,
            got: 0,
        })?;
        Ok(Box::new(NaiveFit { last }))
    }
}

impl FittedModel for NaiveFit {
    fn predict(&self, horizon: usize) -> Result<Vec<f64>, ForecastError> {
        Ok(vec![self.last; horizon])
    }
}

/// Repeats the value at the same position of the previous season.
///
/// Step `h` (0-based) of the forecast equals the training value
/// `season_length - (h % season_length)` positions before the end.
#[derive(Debug, Clone, Copy)]
pub struct SeasonalNaive {
    season_length: usize,
}

impl SeasonalNaive {
    pub fn new(season_length: usize) -> Result<Self, ForecastError> {
        if season_length == 0 {
            return Err(ForecastError::InvalidParameter(
                "season_length must be at least 1".into(),
            ));
        }
        Ok(Self { season_length })
    }

    pub fn season_length(&self) -> usize {
        self.season_length
    }
}

struct SeasonalNaiveFit {
    last_season: Vec<f64>,
}

impl Forecaster for SeasonalNaive {
    fn name(&self) -> &str {
        "SeasonalNaive"
    }

    fn fit(&self, train: &SeriesView<'_>) -> Result<Box<dyn FittedModel>, ForecastError> {
        require_len(train, self.season_length)?;
        let values = train.values();
        let last_season = values[values.len() - self.season_length..].to_vec();
        Ok(Box::new(SeasonalNaiveFit { last_season }))
    }
}

impl FittedModel for SeasonalNaiveFit {
    fn predict(&self, horizon: usize) -> Result<Vec<f64>, ForecastError> {
        let period = self.last_season.len();
        Ok((0..horizon).map(|h| self.last_season[h % period]).collect())
    }
}
