//! Sampled random walk: a stochastic forecaster with explicit seeding.
//!
//! Starting from the last training value, each step adds a one-step
//! difference drawn (with replacement) from the training history. The RNG is
//! seeded from the configured seed and the last training date, so a given
//! fold always produces the same path and sliding folds of equal length
//! draw from different streams.

use chrono::Datelike;
use rand::Rng;

use super::{FittedModel, ForecastError, Forecaster};
use crate::rng::RngHierarchy;
use crate::series::SeriesView;

const SCOPE: &str = "sampled_random_walk";

#[derive(Debug, Clone, Copy)]
pub struct SampledRandomWalk {
    seeds: RngHierarchy,
}

impl SampledRandomWalk {
    pub fn new(seed: u64) -> Self {
        Self {
            seeds: RngHierarchy::new(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seeds.master_seed()
    }
}

struct SampledRandomWalkFit {
    last: f64,
    diffs: Vec<f64>,
    seeds: RngHierarchy,
    window_key: u64,
}

impl Forecaster for SampledRandomWalk {
    fn name(&self) -> &str {
        "SampledRandomWalk"
    }

    fn fit(&self, train: &SeriesView<'_>) -> Result<Box<dyn FittedModel>, ForecastError> {
        let values = train.values();
        let (last, last_date) = train
            .last_value()
            .zip(train.last_date())
            .ok_or(ForecastError::InsufficientData { needed: 1, got: 0 })?;
        let diffs = values.windows(2).map(|w| w[1] - w[0]).collect();
        Ok(Box::new(SampledRandomWalkFit {
            last,
            diffs,
            seeds: self.seeds,
            window_key: i64::from(last_date.num_days_from_ce()) as u64,
        }))
    }
}

impl FittedModel for SampledRandomWalkFit {
    fn predict(&self, horizon: usize) -> Result<Vec<f64>, ForecastError> {
        if self.diffs.is_empty() {
            return Ok(vec![self.last; horizon]);
        }
        let mut rng = self.seeds.rng_for(SCOPE, self.window_key);
        let mut level = self.last;
        Ok((0..horizon)
            .map(|_| {
                level += self.diffs[rng.gen_range(0..self.diffs.len())];
                level
            })
            .collect())
    }
}
