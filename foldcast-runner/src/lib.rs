//! Foldcast Runner — backtest orchestration, aggregation and export.
//!
//! This crate builds on `foldcast-core` to provide:
//! - `Backtester`: folds × models evaluation, serial or on the rayon pool
//! - `BacktestRequest`: TOML-loadable run description
//! - Cross-fold aggregation and primary-vs-baseline comparison
//! - JSON/CSV artifact export

pub mod aggregate;
pub mod config;
pub mod error;
pub mod export;
pub mod phase;
pub mod result;
pub mod runner;

pub use config::{BacktestRequest, KeyedModel, RequestError};
pub use error::{BacktestError, ErrorClass};
pub use export::{
    export_comparison_csv, export_fold_metrics_csv, export_json, export_summary_csv, import_json,
    load_artifacts, save_artifacts,
};
pub use phase::{FailureKind, RunPhase};
pub use result::{
    AggregatedResult, FailureStage, FoldResult, FoldStatus, ModelResult, ModelRole, Retention,
    SCHEMA_VERSION,
};
pub use runner::{run_request, Backtester, RunOptions};
