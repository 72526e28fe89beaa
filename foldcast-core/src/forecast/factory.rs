//! Factory system — turns a serializable `ModelConfig` into fresh forecasters.
//!
//! Built-in variants are constructed directly. `custom` variants are looked up
//! by name in a [`ForecasterRegistry`] populated by the host application; no
//! string-based reflection happens anywhere else.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{
    BoxedForecaster, Drift, ForecastError, MovingAverage, Naive, SampledRandomWalk, SeasonalNaive,
};

/// Free-form numeric parameters for custom models.
pub type ParamMap = BTreeMap<String, f64>;

// ─── Error type ──────────────────────────────────────────────────────

/// Errors from model construction.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum FactoryError {
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("invalid parameters for model '{model}': {source}")]
    InvalidParams {
        model: String,
        #[source]
        source: ForecastError,
    },
    #[error("duplicate model key: {0}")]
    DuplicateKey(String),
}

// ─── Config ──────────────────────────────────────────────────────────

/// Model configuration (serializable enum).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelConfig {
    /// Last observed value carried forward.
    Naive,
    /// Same position of the previous season.
    SeasonalNaive { season_length: usize },
    /// Mean of the last `window` observations.
    MovingAverage { window: usize },
    /// Line through the first and last training observations.
    Drift,
    /// Random walk over resampled training differences.
    SampledRandomWalk { seed: u64 },
    /// Externally registered model.
    Custom {
        name: String,
        #[serde(default)]
        params: ParamMap,
    },
}

impl ModelConfig {
    /// Model type label, also the default key of a model in results.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Naive => "naive",
            Self::SeasonalNaive { .. } => "seasonal_naive",
            Self::MovingAverage { .. } => "moving_average",
            Self::Drift => "drift",
            Self::SampledRandomWalk { .. } => "sampled_random_walk",
            Self::Custom { name, .. } => name,
        }
    }
}

/// Create a built-in forecaster. `Custom` configs need a [`ForecasterRegistry`].
pub fn create_forecaster(config: &ModelConfig) -> Result<BoxedForecaster, FactoryError> {
    let invalid = |source| FactoryError::InvalidParams {
        model: config.type_name().to_string(),
        source,
    };
    match config {
        ModelConfig::Naive => Ok(Box::new(Naive::new())),
        ModelConfig::SeasonalNaive { season_length } => {
            Ok(Box::new(SeasonalNaive::new(*season_length).map_err(invalid)?))
        }
        ModelConfig::MovingAverage { window } => {
            Ok(Box::new(MovingAverage::new(*window).map_err(invalid)?))
        }
        ModelConfig::Drift => Ok(Box::new(Drift::new())),
        ModelConfig::SampledRandomWalk { seed } => Ok(Box::new(SampledRandomWalk::new(*seed))),
        ModelConfig::Custom { name, .. } => Err(FactoryError::UnknownModel(name.clone())),
    }
}

// ─── Model spec ──────────────────────────────────────────────────────

type FactoryFn = dyn Fn() -> Result<BoxedForecaster, ForecastError> + Send + Sync;

/// A keyed, validated model: produces a fresh forecaster on every call to [`create`].
///
/// [`create`]: ModelSpec::create
#[derive(Clone)]
pub struct ModelSpec {
    key: String,
    config: ModelConfig,
    factory: Arc<FactoryFn>,
}

impl ModelSpec {
    /// Spec for a built-in config. Parameters are validated once here.
    pub fn builtin(key: impl Into<String>, config: ModelConfig) -> Result<Self, FactoryError> {
        create_forecaster(&config)?;
        let captured = config.clone();
        Ok(Self {
            key: key.into(),
            config,
            factory: Arc::new(move || {
                create_forecaster(&captured).map_err(|e| ForecastError::Model(e.to_string()))
            }),
        })
    }

    /// Spec around an arbitrary factory closure. Recorded as a `custom` model named `key`.
    pub fn from_fn<F>(key: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<BoxedForecaster, ForecastError> + Send + Sync + 'static,
    {
        let key = key.into();
        Self {
            config: ModelConfig::Custom {
                name: key.clone(),
                params: ParamMap::new(),
            },
            key,
            factory: Arc::new(factory),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// A fresh, unfitted forecaster.
    pub fn create(&self) -> Result<BoxedForecaster, ForecastError> {
        (self.factory)()
    }
}

impl fmt::Debug for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSpec")
            .field("key", &self.key)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ─── Registry ────────────────────────────────────────────────────────

type CustomFactory = dyn Fn(&ParamMap) -> Result<BoxedForecaster, ForecastError> + Send + Sync;

/// Resolves `ModelConfig`s, including externally registered `custom` models.
#[derive(Clone, Default)]
pub struct ForecasterRegistry {
    custom: BTreeMap<String, Arc<CustomFactory>>,
}

impl ForecasterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a custom model factory under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ParamMap) -> Result<BoxedForecaster, ForecastError> + Send + Sync + 'static,
    {
        self.custom.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.custom.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.custom.keys().map(String::as_str)
    }

    /// Resolve a config into a keyed spec, validating parameters up front.
    pub fn build(
        &self,
        key: impl Into<String>,
        config: &ModelConfig,
    ) -> Result<ModelSpec, FactoryError> {
        let ModelConfig::Custom { name, params } = config else {
            return ModelSpec::builtin(key, config.clone());
        };

        let factory = self
            .custom
            .get(name)
            .cloned()
            .ok_or_else(|| FactoryError::UnknownModel(name.clone()))?;
        factory(params).map_err(|source| FactoryError::InvalidParams {
            model: name.clone(),
            source,
        })?;

        let params = params.clone();
        Ok(ModelSpec {
            key: key.into(),
            config: config.clone(),
            factory: Arc::new(move || factory(&params)),
        })
    }
}

impl fmt::Debug for ForecasterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForecasterRegistry")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}
