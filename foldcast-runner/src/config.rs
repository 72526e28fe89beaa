//! Serializable backtest request, loadable from TOML.
//!
//! ```toml
//! season_length = 7
//! retention = "metrics_only"
//! parallel = true
//!
//! [split]
//! strategy = "expanding"
//! n_splits = 3
//! min_train_size = 30
//! horizon = 14
//!
//! [model]
//! type = "moving_average"
//! window = 7
//!
//! [[baselines]]
//! key = "drift"
//! type = "drift"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use foldcast_core::{ModelConfig, SplitConfig, DEFAULT_SEASON_LENGTH};

use crate::result::Retention;

/// Errors from request loading.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("failed to read request file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid request: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize request: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A model configuration with an optional result key.
///
/// Without an explicit key, the model type name is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(flatten)]
    pub config: ModelConfig,
}

impl KeyedModel {
    pub fn new(config: ModelConfig) -> Self {
        Self { key: None, config }
    }

    pub fn with_key(key: impl Into<String>, config: ModelConfig) -> Self {
        Self {
            key: Some(key.into()),
            config,
        }
    }

    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or_else(|| self.config.type_name())
    }
}

fn default_season_length() -> usize {
    DEFAULT_SEASON_LENGTH
}

fn default_true() -> bool {
    true
}

/// Everything needed to reproduce one backtest of one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRequest {
    pub split: SplitConfig,
    pub model: KeyedModel,
    /// Extra baselines, evaluated after the mandatory naive pair.
    #[serde(default)]
    pub baselines: Vec<KeyedModel>,
    /// Season length of the mandatory seasonal-naive baseline.
    #[serde(default = "default_season_length")]
    pub season_length: usize,
    #[serde(default)]
    pub retention: Retention,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default = "default_true")]
    pub abort_on_leakage: bool,
}

impl BacktestRequest {
    pub fn new(split: SplitConfig, model: KeyedModel) -> Self {
        Self {
            split,
            model,
            baselines: Vec::new(),
            season_length: DEFAULT_SEASON_LENGTH,
            retention: Retention::default(),
            parallel: false,
            abort_on_leakage: true,
        }
    }

    /// Parse a request from TOML. Split parameters are validated here.
    pub fn from_toml(toml_str: &str) -> Result<Self, RequestError> {
        Ok(toml::from_str(toml_str)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, RequestError> {
        let content = std::fs::read_to_string(path).map_err(|source| RequestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Deterministic BLAKE3 hash of the canonical JSON form of the request.
    pub fn request_hash(&self) -> Result<String, RequestError> {
        let canonical = serde_json::to_value(self)?;
        let bytes = serde_json::to_vec(&canonical)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}
