//! Export — JSON and CSV artifacts for backtest results.
//!
//! - **JSON**: full round-trip serialization with schema versioning. NaN
//!   metrics are written as `null`.
//! - **CSV**: one row per model × fold, one row per model summary, and one
//!   row per baseline comparison.
//!
//! Unknown schema versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use foldcast_core::{MetricKind, MetricSet};

use crate::result::{AggregatedResult, FoldStatus, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(result: &AggregatedResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize AggregatedResult to JSON")
}

/// Deserialize an `AggregatedResult`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<AggregatedResult> {
    let result: AggregatedResult =
        serde_json::from_str(json).context("failed to deserialize AggregatedResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn fmt_metric(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.6}")
    } else {
        String::new()
    }
}

fn metric_columns(prefix: &str, suffix: &str) -> Vec<String> {
    MetricKind::ALL
        .iter()
        .map(|k| format!("{prefix}{}{suffix}", k.name()))
        .collect()
}

fn metric_cells(set: &MetricSet) -> Vec<String> {
    MetricKind::ALL.iter().map(|k| fmt_metric(set.get(*k))).collect()
}

/// One row per model × fold, primary model first.
///
/// Columns: model_key, role, fold_index, train_start, train_end, test_start,
/// test_end, status, error, mae, smape, wape, bias, warnings.
/// Undefined metrics are written as empty cells.
pub fn export_fold_metrics_csv(result: &AggregatedResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header: Vec<String> = [
        "model_key",
        "role",
        "fold_index",
        "train_start",
        "train_end",
        "test_start",
        "test_end",
        "status",
        "error",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(metric_columns("", ""));
    header.push("warnings".into());
    wtr.write_record(&header)?;

    for model in result.primary().into_iter().chain(result.baselines()) {
        for fold in &model.fold_results {
            let (status, error) = match &fold.status {
                FoldStatus::Completed => ("completed", String::new()),
                FoldStatus::Failed { error, .. } => ("failed", error.clone()),
            };
            let mut row = vec![
                model.key.clone(),
                model.role.as_str().to_string(),
                fold.fold_index.to_string(),
                fold.train_dates.start.to_string(),
                fold.train_dates.end.to_string(),
                fold.test_dates.start.to_string(),
                fold.test_dates.end.to_string(),
                status.to_string(),
                error,
            ];
            row.extend(metric_cells(&fold.metrics.unwrap_or(MetricSet::NAN)));
            row.push(
                fold.warnings
                    .iter()
                    .map(|w| w.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            );
            wtr.write_record(&row)?;
        }
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// One row per model: fold counts, mean, std and stability of each metric.
pub fn export_summary_csv(result: &AggregatedResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header: Vec<String> = ["model_key", "model_name", "role", "folds_completed", "folds_failed"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(metric_columns("", ""));
    header.extend(metric_columns("", "_std"));
    header.extend(metric_columns("", "_stability"));
    wtr.write_record(&header)?;

    for model in result.primary().into_iter().chain(result.baselines()) {
        let mut row = vec![
            model.key.clone(),
            model.model_name.clone(),
            model.role.as_str().to_string(),
            model.folds_completed.to_string(),
            model.folds_failed.to_string(),
        ];
        row.extend(metric_cells(&model.aggregated_metrics));
        row.extend(metric_cells(&model.metric_std));
        row.extend(metric_cells(&model.metric_stability));
        wtr.write_record(&row)?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// One row per baseline: improvement (%) of the primary model on each metric.
pub fn export_comparison_csv(result: &AggregatedResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["baseline_key".to_string()];
    header.extend(metric_columns("", "_improvement_pct"));
    wtr.write_record(&header)?;

    for key in &result.baseline_keys {
        let Some(set) = result.comparison_summary.get(key) else {
            continue;
        };
        let mut row = vec![key.clone()];
        row.extend(metric_cells(set));
        wtr.write_record(&row)?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

// ─── Artifacts ──────────────────────────────────────────────────────

fn sanitize(entity: &str) -> String {
    entity
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Write all artifacts for a run into a new directory under `output_dir`.
///
/// Directory name: `{entity}_{run_id[..12]}`. An existing run directory is
/// never overwritten. Contents:
/// - `result.json` — full result
/// - `folds.csv` — per model × fold metrics
/// - `summary.csv` — per model aggregates
/// - `comparison.csv` — improvement over each baseline
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &AggregatedResult, output_dir: &Path) -> Result<PathBuf> {
    let run_id = result.run_id().context("failed to derive run id")?;
    let run_dir = output_dir.join(format!("{}_{}", sanitize(&result.entity), &run_id[..12]));
    if run_dir.exists() {
        bail!("artifact dir already exists: {}", run_dir.display());
    }
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    std::fs::create_dir(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let write = |name: &str, content: String| -> Result<()> {
        let path = run_dir.join(name);
        std::fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))
    };
    write("result.json", export_json(result)?)?;
    write("folds.csv", export_fold_metrics_csv(result)?)?;
    write("summary.csv", export_summary_csv(result)?)?;
    write("comparison.csv", export_comparison_csv(result)?)?;

    Ok(run_dir)
}

/// Load a result from an artifact directory's `result.json`.
pub fn load_artifacts(dir: &Path) -> Result<AggregatedResult> {
    let path = dir.join("result.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}
