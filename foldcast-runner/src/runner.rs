//! Backtest orchestrator — folds × models, fan-out, aggregation.
//!
//! Entry points:
//! - `Backtester::run()`: generates folds from the split config, then evaluates.
//! - `Backtester::run_with_folds()`: evaluates a caller-supplied fold set.
//!   The leakage check still runs, so corrupted folds are caught here.
//! - `run_request()`: resolves a `BacktestRequest` through a registry and runs it.
//!
//! Every (fold, model) cell gets a fresh forecaster fitted on a borrowed view
//! of the training window only. A failing cell is recorded on its
//! `FoldResult` and never aborts the run.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use foldcast_core::{
    validate_no_leakage, BaselineSet, FactoryError, FoldGenerator, ForecastError,
    ForecasterRegistry, MetricsEngine, ModelSpec, Series, SeriesView, SplitConfig,
    TimeSeriesSplit,
};

use crate::aggregate;
use crate::config::BacktestRequest;
use crate::error::BacktestError;
use crate::phase::{FailureKind, PhaseTrail, RunPhase};
use crate::result::{
    AggregatedResult, FailureStage, FoldResult, FoldStatus, ModelRole, Retention, SCHEMA_VERSION,
};

// ─── Options ─────────────────────────────────────────────────────────

/// Run-level switches.
///
/// - `cancel`: optional atomic flag checked before every cell.
/// - `abort_on_leakage`: when false, a failed leakage check is logged and
///   recorded as `leakage_check_passed = false` instead of aborting.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions<'a> {
    pub retention: Retention,
    pub parallel: bool,
    pub abort_on_leakage: bool,
    pub cancel: Option<&'a AtomicBool>,
}

impl Default for RunOptions<'_> {
    fn default() -> Self {
        Self {
            retention: Retention::Full,
            parallel: false,
            abort_on_leakage: true,
            cancel: None,
        }
    }
}

impl<'a> RunOptions<'a> {
    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|f| f.load(Ordering::Relaxed))
    }
}

// ─── Backtester ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct Backtester<'a> {
    options: RunOptions<'a>,
}

struct Cell<'c> {
    model: usize,
    fold: &'c TimeSeriesSplit,
}

impl<'a> Backtester<'a> {
    pub fn new(options: RunOptions<'a>) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RunOptions<'a> {
        &self.options
    }

    /// Generate folds for `series` and evaluate `model` against every baseline.
    pub fn run(
        &self,
        series: &Series,
        split_config: &SplitConfig,
        model: &ModelSpec,
        baselines: &BaselineSet,
    ) -> Result<AggregatedResult, BacktestError> {
        let mut trail = PhaseTrail::start(series.entity());
        if let Err(e) = check_unique_keys(model, baselines) {
            trail.fail(FailureKind::InvalidSetup);
            return Err(e.into());
        }

        trail.advance(RunPhase::Splitting);
        let folds = match FoldGenerator::new(split_config.clone()).split(series) {
            Ok(folds) => folds,
            Err(e) => {
                trail.fail(FailureKind::InsufficientData);
                return Err(e.into());
            }
        };
        self.evaluate(series, split_config, folds, model, baselines, trail)
    }

    /// Evaluate a caller-supplied fold set. `split_config` supplies the gap
    /// used by the leakage check and is recorded on the result.
    pub fn run_with_folds(
        &self,
        series: &Series,
        split_config: &SplitConfig,
        folds: Vec<TimeSeriesSplit>,
        model: &ModelSpec,
        baselines: &BaselineSet,
    ) -> Result<AggregatedResult, BacktestError> {
        let mut trail = PhaseTrail::start(series.entity());
        if let Err(e) = check_unique_keys(model, baselines) {
            trail.fail(FailureKind::InvalidSetup);
            return Err(e.into());
        }
        trail.advance(RunPhase::Splitting);
        self.evaluate(series, split_config, folds, model, baselines, trail)
    }

    fn evaluate(
        &self,
        series: &Series,
        split_config: &SplitConfig,
        folds: Vec<TimeSeriesSplit>,
        model: &ModelSpec,
        baselines: &BaselineSet,
        mut trail: PhaseTrail,
    ) -> Result<AggregatedResult, BacktestError> {
        trail.advance(RunPhase::Validating);
        let leakage_check_passed =
            match validate_no_leakage(&folds, split_config.gap(), series.len()) {
                Ok(()) => true,
                Err(e) if self.options.abort_on_leakage => {
                    trail.fail(FailureKind::Leakage);
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(
                        entity = series.entity(),
                        error = %e,
                        "continuing after leakage violation (abort_on_leakage = false)"
                    );
                    false
                }
            };

        // Primary first, then baselines in set order.
        let models: Vec<&ModelSpec> = std::iter::once(model).chain(baselines.iter()).collect();

        info!(
            entity = series.entity(),
            series_len = series.len(),
            n_folds = folds.len(),
            n_models = models.len(),
            parallel = self.options.parallel,
            "backtest started"
        );

        trail.advance(RunPhase::FittingFolds);
        let cells: Vec<Cell<'_>> = (0..models.len())
            .flat_map(|m| folds.iter().map(move |fold| Cell { model: m, fold }))
            .collect();

        let run_cell = |cell: &Cell<'_>| -> Result<FoldResult, BacktestError> {
            if self.options.is_cancelled() {
                return Err(BacktestError::Cancelled);
            }
            Ok(evaluate_cell(
                series,
                cell.fold,
                models[cell.model],
                self.options.retention,
            ))
        };

        // Cells are collected in (model, fold) order in both modes.
        let outcomes: Result<Vec<FoldResult>, BacktestError> = if self.options.parallel {
            cells.par_iter().map(run_cell).collect()
        } else {
            cells.iter().map(run_cell).collect()
        };
        let outcomes = match outcomes {
            Ok(outcomes) => outcomes,
            Err(e) => {
                info!(entity = series.entity(), "backtest cancelled");
                trail.fail(FailureKind::Cancelled);
                return Err(e);
            }
        };

        trail.advance(RunPhase::Aggregating);
        let n_folds = folds.len();
        let mut outcomes = outcomes.into_iter();
        let primary = aggregate::build_model_result(
            model.key(),
            ModelRole::Primary,
            model.config(),
            outcomes.by_ref().take(n_folds).collect(),
        );
        let baseline_results: Vec<_> = baselines
            .iter()
            .map(|spec| {
                aggregate::build_model_result(
                    spec.key(),
                    ModelRole::Baseline,
                    spec.config(),
                    outcomes.by_ref().take(n_folds).collect(),
                )
            })
            .collect();

        let comparison_summary = aggregate::comparison_summary(&primary, &baseline_results);
        let primary_key = primary.key.clone();
        let baseline_keys = baseline_results.iter().map(|m| m.key.clone()).collect();

        trail.advance(RunPhase::Completed);
        info!(
            entity = series.entity(),
            n_folds,
            primary = %primary_key,
            folds_completed = primary.folds_completed,
            folds_failed = primary.folds_failed,
            leakage_check_passed,
            "backtest completed"
        );

        Ok(AggregatedResult {
            schema_version: SCHEMA_VERSION,
            entity: series.entity().to_string(),
            series_hash: series.content_hash(),
            series_len: series.len(),
            split_config: split_config.clone(),
            split_config_hash: split_config.config_hash(),
            n_folds,
            retention: self.options.retention,
            primary_key,
            baseline_keys,
            per_model: std::iter::once(primary)
                .chain(baseline_results)
                .map(|m| (m.key.clone(), m))
                .collect(),
            comparison_summary,
            leakage_check_passed,
            phases: trail.into_phases(),
        })
    }
}

/// Resolve `request` through `registry` and run it.
pub fn run_request(
    series: &Series,
    request: &BacktestRequest,
    registry: &ForecasterRegistry,
    cancel: Option<&AtomicBool>,
) -> Result<AggregatedResult, BacktestError> {
    let model = registry.build(request.model.key(), &request.model.config)?;
    let mut baselines = BaselineSet::standard(request.season_length)?;
    for extra in &request.baselines {
        baselines = baselines.with_extra(registry.build(extra.key(), &extra.config)?)?;
    }

    let options = RunOptions {
        retention: request.retention,
        parallel: request.parallel,
        abort_on_leakage: request.abort_on_leakage,
        cancel,
    };
    Backtester::new(options).run(series, &request.split, &model, &baselines)
}

fn check_unique_keys(model: &ModelSpec, baselines: &BaselineSet) -> Result<(), FactoryError> {
    if baselines.contains(model.key()) {
        return Err(FactoryError::DuplicateKey(model.key().to_string()));
    }
    Ok(())
}

// ─── Cells ───────────────────────────────────────────────────────────

struct CellFailure {
    stage: FailureStage,
    error: String,
}

impl CellFailure {
    fn new(stage: FailureStage, error: impl std::fmt::Display) -> Self {
        Self {
            stage,
            error: error.to_string(),
        }
    }
}

fn evaluate_cell(
    series: &Series,
    fold: &TimeSeriesSplit,
    model: &ModelSpec,
    retention: Retention,
) -> FoldResult {
    let lead = fold.bounds.test_start.saturating_sub(fold.bounds.train_end);
    debug!(
        model = model.key(),
        fold_index = fold.fold_index(),
        train_len = fold.train_len(),
        lead,
        horizon = fold.test_len(),
        "evaluating cell"
    );

    let outcome = check_window(fold, series.len()).and_then(|()| {
        let train = series.view(fold.train_indices());
        let actual = series.view(fold.test_indices()).values();
        forecast_window(model, &train, lead, fold.test_len()).and_then(|predicted| {
            MetricsEngine::compute(actual, &predicted)
                .map(|evaluation| (actual, predicted, evaluation))
                .map_err(|e| CellFailure::new(FailureStage::Score, e))
        })
    });

    let (status, actual, predicted, metrics, warnings) = match outcome {
        Ok((actual, predicted, evaluation)) => (
            FoldStatus::Completed,
            actual.to_vec(),
            predicted,
            Some(evaluation.metrics),
            evaluation.warnings,
        ),
        Err(failure) => {
            warn!(
                model = model.key(),
                fold_index = fold.fold_index(),
                stage = ?failure.stage,
                error = %failure.error,
                "fold failed"
            );
            (
                FoldStatus::Failed {
                    stage: failure.stage,
                    error: failure.error,
                },
                series.view(fold.test_indices()).values().to_vec(),
                Vec::new(),
                None,
                Vec::new(),
            )
        }
    };

    let (actual, predicted) = match retention {
        Retention::Full => (actual, predicted),
        Retention::MetricsOnly => (Vec::new(), Vec::new()),
    };

    FoldResult {
        fold_index: fold.fold_index(),
        bounds: fold.bounds,
        train_dates: fold.train_dates,
        test_dates: fold.test_dates,
        status,
        actual,
        predicted,
        metrics,
        warnings,
    }
}

/// Both windows must be non-empty and inside the series. Only fails for
/// caller-supplied folds run with `abort_on_leakage = false`.
fn check_window(fold: &TimeSeriesSplit, series_len: usize) -> Result<(), CellFailure> {
    let b = &fold.bounds;
    let in_bounds = b.train_start < b.train_end
        && b.test_start < b.test_end
        && b.test_end <= series_len;
    if in_bounds {
        return Ok(());
    }
    Err(CellFailure::new(
        FailureStage::Window,
        format!(
            "fold window train [{}, {}) test [{}, {}) does not fit a series of {} observations",
            b.train_start, b.train_end, b.test_start, b.test_end, series_len
        ),
    ))
}

/// Fit on `train`, forecast `lead + horizon` steps and keep the last `horizon`.
fn forecast_window(
    spec: &ModelSpec,
    train: &SeriesView<'_>,
    lead: usize,
    horizon: usize,
) -> Result<Vec<f64>, CellFailure> {
    let steps = lead.checked_add(horizon).ok_or_else(|| {
        CellFailure::new(
            FailureStage::Window,
            format!("lead {lead} + horizon {horizon} overflows"),
        )
    })?;
    let forecaster = spec
        .create()
        .map_err(|e| CellFailure::new(FailureStage::Create, e))?;
    let fitted = forecaster
        .fit(train)
        .map_err(|e| CellFailure::new(FailureStage::Fit, e))?;

    let mut path = fitted
        .predict(steps)
        .map_err(|e| CellFailure::new(FailureStage::Predict, e))?;
    if path.len() != steps {
        return Err(CellFailure::new(
            FailureStage::Predict,
            ForecastError::WrongLength {
                expected: steps,
                got: path.len(),
            },
        ));
    }
    let scored = path.split_off(lead);
    if let Some((position, &value)) = scored.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(CellFailure::new(
            FailureStage::Predict,
            ForecastError::NonFinite { position, value },
        ));
    }
    Ok(scored)
}
