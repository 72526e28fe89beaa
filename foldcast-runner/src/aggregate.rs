//! Cross-fold aggregation and model-vs-baseline comparison.

use std::collections::BTreeMap;

use tracing::warn;

use foldcast_core::{MetricSet, MetricSummary, ModelConfig};

use crate::result::{FoldResult, ModelResult, ModelRole};

/// Summarize the completed folds of one model. Failed folds contribute nothing.
pub fn summarize(fold_results: &[FoldResult]) -> MetricSummary {
    let sets: Vec<MetricSet> = fold_results.iter().filter_map(|f| f.metrics).collect();
    MetricSummary::from_folds(&sets)
}

/// Assemble a `ModelResult` from its per-fold outcomes (already in fold order).
pub fn build_model_result(
    key: &str,
    role: ModelRole,
    config: &ModelConfig,
    fold_results: Vec<FoldResult>,
) -> ModelResult {
    let summary = summarize(&fold_results);
    let folds_completed = fold_results.iter().filter(|f| f.is_completed()).count();
    let folds_failed = fold_results.len() - folds_completed;
    if folds_completed == 0 && !fold_results.is_empty() {
        warn!(model = key, folds_failed, "every fold failed; aggregated metrics are undefined");
    }

    ModelResult {
        key: key.to_string(),
        model_name: config.type_name().to_string(),
        role,
        config: config.clone(),
        fold_results,
        aggregated_metrics: summary.mean,
        metric_std: summary.std,
        metric_stability: summary.stability,
        folds_completed,
        folds_failed,
        aggregation_warnings: summary.warnings,
    }
}

/// Improvement (%) of `candidate` over `reference`, metric by metric.
pub fn improvement_over(candidate: &MetricSet, reference: &MetricSet) -> MetricSet {
    MetricSet::from_fn(|kind| kind.improvement_pct(candidate.get(kind), reference.get(kind)))
}

/// Primary-vs-baseline comparison keyed by baseline key.
pub fn comparison_summary<'a>(
    primary: &ModelResult,
    baselines: impl IntoIterator<Item = &'a ModelResult>,
) -> BTreeMap<String, MetricSet> {
    baselines
        .into_iter()
        .map(|b| {
            (
                b.key.clone(),
                improvement_over(&primary.aggregated_metrics, &b.aggregated_metrics),
            )
        })
        .collect()
}
