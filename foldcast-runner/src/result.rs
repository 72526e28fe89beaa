//! Result types produced by a backtest run.
//!
//! `AggregatedResult` is the single artifact of a run. Per-model results are
//! kept in a `BTreeMap` keyed by model key so serialization order is stable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use foldcast_core::{
    serde_nan, DateSpan, FoldBounds, MetricKind, MetricSet, MetricWarning, ModelConfig,
    SplitConfig,
};

use crate::phase::RunPhase;

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// How much per-fold data a result keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    /// Keep actual and predicted values for every fold.
    #[default]
    Full,
    /// Drop the value vectors; keep metrics and warnings.
    MetricsOnly,
}

/// Where a failed fold/model cell stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Fold bounds do not fit the series.
    Window,
    Create,
    Fit,
    Predict,
    Score,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FoldStatus {
    Completed,
    Failed { stage: FailureStage, error: String },
}

/// Outcome of one model on one fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldResult {
    pub fold_index: usize,
    pub bounds: FoldBounds,
    pub train_dates: DateSpan,
    pub test_dates: DateSpan,
    pub status: FoldStatus,
    #[serde(with = "serde_nan::vec")]
    pub actual: Vec<f64>,
    #[serde(with = "serde_nan::vec")]
    pub predicted: Vec<f64>,
    /// `None` when the fold failed.
    pub metrics: Option<MetricSet>,
    pub warnings: Vec<MetricWarning>,
}

impl FoldResult {
    pub fn is_completed(&self) -> bool {
        self.status == FoldStatus::Completed
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            FoldStatus::Completed => None,
            FoldStatus::Failed { error, .. } => Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    Primary,
    Baseline,
}

impl ModelRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Baseline => "baseline",
        }
    }
}

/// One model's folds plus their cross-fold summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    pub key: String,
    /// Model type label (`naive`, `drift`, custom name, ...).
    pub model_name: String,
    pub role: ModelRole,
    pub config: ModelConfig,
    pub fold_results: Vec<FoldResult>,
    pub aggregated_metrics: MetricSet,
    pub metric_std: MetricSet,
    pub metric_stability: MetricSet,
    pub folds_completed: usize,
    pub folds_failed: usize,
    #[serde(default)]
    pub aggregation_warnings: Vec<MetricWarning>,
}

impl ModelResult {
    pub fn completed_folds(&self) -> impl Iterator<Item = &FoldResult> {
        self.fold_results.iter().filter(|f| f.is_completed())
    }

    pub fn failed_folds(&self) -> impl Iterator<Item = &FoldResult> {
        self.fold_results.iter().filter(|f| !f.is_completed())
    }
}

/// Complete result of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub entity: String,
    pub series_hash: String,
    pub series_len: usize,
    pub split_config: SplitConfig,
    pub split_config_hash: String,
    pub n_folds: usize,
    pub retention: Retention,
    pub primary_key: String,
    /// Baseline keys in evaluation order (mandatory baselines first).
    pub baseline_keys: Vec<String>,
    pub per_model: BTreeMap<String, ModelResult>,
    /// Improvement (%) of the primary model over each baseline, keyed by baseline.
    pub comparison_summary: BTreeMap<String, MetricSet>,
    pub leakage_check_passed: bool,
    pub phases: Vec<RunPhase>,
}

impl AggregatedResult {
    pub fn primary(&self) -> Option<&ModelResult> {
        self.per_model.get(&self.primary_key)
    }

    pub fn model(&self, key: &str) -> Option<&ModelResult> {
        self.per_model.get(key)
    }

    /// Baseline results in evaluation order.
    pub fn baselines(&self) -> impl Iterator<Item = &ModelResult> {
        self.baseline_keys
            .iter()
            .filter_map(|k| self.per_model.get(k))
    }

    /// Deterministic BLAKE3 id of the run setup: series, split, retention and
    /// every model's key, role and config. Outcomes are not hashed, so the same
    /// setup always maps to the same id.
    pub fn run_id(&self) -> Result<String, serde_json::Error> {
        #[derive(Serialize)]
        struct RunIdentity<'a> {
            schema_version: u32,
            entity: &'a str,
            series_hash: &'a str,
            split_config_hash: &'a str,
            retention: Retention,
            models: Vec<(&'a str, ModelRole, &'a ModelConfig)>,
        }

        let models = std::iter::once(&self.primary_key)
            .chain(&self.baseline_keys)
            .filter_map(|k| self.per_model.get(k))
            .map(|m| (m.key.as_str(), m.role, &m.config))
            .collect();
        let identity = RunIdentity {
            schema_version: self.schema_version,
            entity: &self.entity,
            series_hash: &self.series_hash,
            split_config_hash: &self.split_config_hash,
            retention: self.retention,
            models,
        };
        let bytes = serde_json::to_vec(&identity)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }

    /// Improvement (%) of the primary model over `baseline` on `kind`.
    pub fn improvement(&self, baseline: &str, kind: MetricKind) -> Option<f64> {
        self.comparison_summary
            .get(baseline)
            .map(|set| set.get(kind))
    }
}
