//! End-to-end backtest scenarios.
//!
//! Tests:
//! 1. Ramp series, expanding 3×14 folds, last-value forecaster: exact fold
//!    bounds, MAE/WAPE/bias per fold, improvement over seasonal-naive
//! 2. Fold-2 fit failure of the primary model is contained to that cell
//! 3. Insufficient data is a user error reporting both lengths
//! 4. Serial and parallel runs produce identical results
//! 5. Cooperative cancellation returns no partial result
//! 6. Corrupted folds abort with an internal error (or continue when allowed)
//! 7. Requests resolve custom models through the registry

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;

use foldcast_core::forecast::Naive;
use foldcast_core::{
    BaselineSet, BoxedForecaster, FittedModel, ForecastError, Forecaster, ForecasterRegistry,
    LeakageError, MetricKind, ModelConfig, ModelSpec, ParamMap, Series, SeriesView, SplitConfig,
    SplitError,
};
use foldcast_runner::{
    export_json, run_request, BacktestError, BacktestRequest, Backtester, ErrorClass,
    FailureStage, FoldStatus, KeyedModel, ModelRole, RunOptions, RunPhase,
};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

/// `n` daily observations with `value[i] = i + 1`.
fn ramp(n: usize) -> Series {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    Series::from_points(
        "store-7/sku-42",
        (0..n).map(|i| (start + chrono::Duration::days(i as i64), (i + 1) as f64)),
    )
    .unwrap()
}

/// Weekly pattern on a slow trend, so every model has non-trivial errors.
fn seasonal(n: usize) -> Series {
    let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
    Series::from_points(
        "store-1/sku-1",
        (0..n).map(|i| {
            let weekly = [3.0, 1.0, 0.0, 2.0, 5.0, 8.0, 6.0][i % 7];
            (
                start + chrono::Duration::days(i as i64),
                20.0 + 0.1 * i as f64 + weekly,
            )
        }),
    )
    .unwrap()
}

fn last_value() -> ModelSpec {
    ModelSpec::from_fn("last_value", || Ok(Box::new(Naive::new()) as BoxedForecaster))
}

fn baselines() -> BaselineSet {
    BaselineSet::standard(7).unwrap()
}

/// Carries the last value forward, except it refuses to fit a window of `fail_len`.
struct FailsOnLength {
    fail_len: usize,
}

impl Forecaster for FailsOnLength {
    fn name(&self) -> &str {
        "FailsOnLength"
    }

    fn fit(&self, train: &SeriesView<'_>) -> Result<Box<dyn FittedModel>, ForecastError> {
        if train.len() == self.fail_len {
            return Err(ForecastError::Model(format!(
                "singular matrix on {} observations",
                train.len()
            )));
        }
        Naive::new().fit(train)
    }
}

/// Raises the cancel flag on its first fit, then behaves like naive.
struct CancelsOnFit {
    flag: Arc<AtomicBool>,
}

impl Forecaster for CancelsOnFit {
    fn name(&self) -> &str {
        "CancelsOnFit"
    }

    fn fit(&self, train: &SeriesView<'_>) -> Result<Box<dyn FittedModel>, ForecastError> {
        self.flag.store(true, Ordering::Relaxed);
        Naive::new().fit(train)
    }
}

// ──────────────────────────────────────────────
// 1. End-to-end ramp scenario
// ──────────────────────────────────────────────

#[test]
fn ramp_scenario_matches_hand_computed_metrics() {
    let series = ramp(120);
    let config = SplitConfig::expanding(3, 30, 0, 14).unwrap();
    let result = Backtester::default()
        .run(&series, &config, &last_value(), &baselines())
        .unwrap();

    assert!(result.leakage_check_passed);
    assert_eq!(result.n_folds, 3);
    assert_eq!(result.primary_key, "last_value");
    assert_eq!(result.per_model.len(), 3);

    let primary = result.primary().unwrap();
    assert_eq!(primary.role, ModelRole::Primary);
    assert_eq!(primary.folds_completed, 3);
    assert_eq!(primary.folds_failed, 0);

    let bounds: Vec<(usize, usize, usize)> = primary
        .fold_results
        .iter()
        .map(|f| (f.bounds.train_end, f.bounds.test_start, f.bounds.test_end))
        .collect();
    assert_eq!(bounds, vec![(30, 30, 44), (44, 44, 58), (58, 58, 72)]);

    // Flat line at train_end against a ramp of slope 1: errors are 1..=14.
    for fold in &primary.fold_results {
        let m = fold.metrics.unwrap();
        assert_eq!(m.mae, 7.5);
        assert_eq!(m.bias, 7.5);
        assert_eq!(fold.predicted, vec![fold.bounds.train_end as f64; 14]);
        assert_eq!(fold.actual.len(), 14);
        assert_eq!(fold.actual[0], fold.bounds.train_end as f64 + 1.0);
    }
    // Fold 0: Σ|err| = 105, Σ actual = 31 + ... + 44 = 525.
    assert!((primary.fold_results[0].metrics.unwrap().wape - 20.0).abs() < 1e-12);
    // Fold 1: Σ actual = 45 + ... + 58 = 721.
    assert!(
        (primary.fold_results[1].metrics.unwrap().wape - 105.0 / 721.0 * 100.0).abs() < 1e-12
    );

    assert_eq!(primary.aggregated_metrics.mae, 7.5);
    assert_eq!(primary.metric_std.mae, 0.0);
    assert_eq!(primary.metric_stability.mae, 0.0);

    // Seasonal naive repeats the last week: errors are 7 for the first week, 14 for the second.
    let seasonal_naive = result.model("seasonal_naive").unwrap();
    for fold in &seasonal_naive.fold_results {
        assert_eq!(fold.metrics.unwrap().mae, 10.5);
    }
    let improvement = result
        .improvement("seasonal_naive", MetricKind::Mae)
        .unwrap();
    assert!((improvement - 28.571428571428573).abs() < 1e-9);

    // The primary is a last-value model, identical to the naive baseline.
    assert_eq!(result.improvement("naive", MetricKind::Mae), Some(0.0));
}

#[test]
fn fold_dates_follow_indices() {
    let series = ramp(120);
    let config = SplitConfig::expanding(3, 30, 0, 14).unwrap();
    let result = Backtester::default()
        .run(&series, &config, &last_value(), &baselines())
        .unwrap();
    let fold = &result.primary().unwrap().fold_results[1];
    let d = |i: usize| series.dates()[i];
    assert_eq!(fold.train_dates.start, d(0));
    assert_eq!(fold.train_dates.end, d(43));
    assert_eq!(fold.test_dates.start, d(44));
    assert_eq!(fold.test_dates.end, d(57));
}

// ──────────────────────────────────────────────
// 2. Partial failure containment
// ──────────────────────────────────────────────

#[test]
fn failing_fold_is_contained() {
    let series = ramp(120);
    let config = SplitConfig::expanding(4, 30, 0, 14).unwrap();
    // Fold 2 trains on exactly 58 observations.
    let flaky = ModelSpec::from_fn("flaky", || {
        Ok(Box::new(FailsOnLength { fail_len: 58 }) as BoxedForecaster)
    });
    let result = Backtester::default()
        .run(&series, &config, &flaky, &baselines())
        .unwrap();

    let primary = result.primary().unwrap();
    assert_eq!(primary.fold_results.len(), 4);
    assert_eq!(primary.folds_completed, 3);
    assert_eq!(primary.folds_failed, 1);

    let failed = &primary.fold_results[2];
    assert_eq!(failed.fold_index, 2);
    match &failed.status {
        FoldStatus::Failed { stage, error } => {
            assert_eq!(*stage, FailureStage::Fit);
            assert!(error.contains("singular matrix on 58"), "{error}");
        }
        other => panic!("expected failed fold, got {other:?}"),
    }
    assert!(failed.metrics.is_none());

    for i in [0, 1, 3] {
        assert!(primary.fold_results[i].is_completed());
        assert_eq!(primary.fold_results[i].metrics.unwrap().mae, 7.5);
    }
    // Aggregate ignores the failed fold.
    assert_eq!(primary.aggregated_metrics.mae, 7.5);

    for baseline in result.baselines() {
        assert_eq!(baseline.folds_completed, 4, "{}", baseline.key);
        assert_eq!(baseline.folds_failed, 0);
    }
}

#[test]
fn all_folds_failing_still_completes() {
    let series = ramp(80);
    let config = SplitConfig::sliding(3, 20, 0, 10).unwrap();
    // Sliding windows all have length 20.
    let broken = ModelSpec::from_fn("broken", || {
        Ok(Box::new(FailsOnLength { fail_len: 20 }) as BoxedForecaster)
    });
    let result = Backtester::default()
        .run(&series, &config, &broken, &baselines())
        .unwrap();
    let primary = result.primary().unwrap();
    assert_eq!(primary.folds_completed, 0);
    assert!(primary.aggregated_metrics.mae.is_nan());
    for set in result.comparison_summary.values() {
        assert!(set.mae.is_nan());
    }
    assert_eq!(result.phases.last(), Some(&RunPhase::Completed));

    // NaN survives as JSON null.
    let json = export_json(&result).unwrap();
    assert!(json.contains("\"mae\": null"));
}

// ──────────────────────────────────────────────
// 3. Insufficient data
// ──────────────────────────────────────────────

#[test]
fn insufficient_data_reports_both_lengths() {
    let series = ramp(10);
    let config = SplitConfig::expanding(5, 100, 0, 30).unwrap();
    let err = Backtester::default()
        .run(&series, &config, &last_value(), &baselines())
        .unwrap_err();

    assert!(matches!(
        err,
        BacktestError::InsufficientData(SplitError::InsufficientData {
            required: 250,
            available: 10
        })
    ));
    assert_eq!(err.class(), ErrorClass::UserInput);
    let msg = err.user_message();
    assert!(msg.contains("250") && msg.contains("10"), "{msg}");
}

// ──────────────────────────────────────────────
// 4. Serial vs parallel
// ──────────────────────────────────────────────

#[test]
fn parallel_matches_serial() {
    let series = seasonal(200);
    let config = SplitConfig::sliding(6, 60, 2, 14).unwrap();
    let model = ModelSpec::builtin("rw", ModelConfig::SampledRandomWalk { seed: 7 }).unwrap();
    let set = baselines()
        .with_extra(ModelSpec::builtin("drift", ModelConfig::Drift).unwrap())
        .unwrap()
        .with_extra(ModelSpec::builtin("ma", ModelConfig::MovingAverage { window: 14 }).unwrap())
        .unwrap();

    let serial = Backtester::default()
        .run(&series, &config, &model, &set)
        .unwrap();
    let parallel = Backtester::new(RunOptions {
        parallel: true,
        ..RunOptions::default()
    })
    .run(&series, &config, &model, &set)
    .unwrap();

    assert_eq!(serial.per_model.len(), 5);
    assert_eq!(export_json(&serial).unwrap(), export_json(&parallel).unwrap());
}

#[test]
fn reruns_are_deterministic() {
    let series = seasonal(150);
    let config = SplitConfig::expanding(4, 50, 1, 10).unwrap();
    let model = ModelSpec::builtin("rw", ModelConfig::SampledRandomWalk { seed: 99 }).unwrap();
    let a = Backtester::default()
        .run(&series, &config, &model, &baselines())
        .unwrap();
    let b = Backtester::default()
        .run(&series, &config, &model, &baselines())
        .unwrap();
    assert_eq!(export_json(&a).unwrap(), export_json(&b).unwrap());
    assert_eq!(a.split_config_hash, config.config_hash());
    assert_eq!(a.series_hash, series.content_hash());
}

// ──────────────────────────────────────────────
// 5. Cancellation
// ──────────────────────────────────────────────

#[test]
fn cancelled_before_start() {
    let flag = AtomicBool::new(true);
    let series = ramp(120);
    let config = SplitConfig::expanding(3, 30, 0, 14).unwrap();
    let err = Backtester::new(RunOptions {
        cancel: Some(&flag),
        ..RunOptions::default()
    })
    .run(&series, &config, &last_value(), &baselines())
    .unwrap_err();
    assert!(matches!(err, BacktestError::Cancelled));
    assert_eq!(err.class(), ErrorClass::Cancelled);
}

#[test]
fn cancelled_mid_run_returns_no_result() {
    let flag = Arc::new(AtomicBool::new(false));
    let captured = Arc::clone(&flag);
    let model = ModelSpec::from_fn("cancels", move || {
        Ok(Box::new(CancelsOnFit {
            flag: Arc::clone(&captured),
        }) as BoxedForecaster)
    });
    let series = ramp(120);
    let config = SplitConfig::expanding(3, 30, 0, 14).unwrap();
    let result = Backtester::new(RunOptions {
        cancel: Some(flag.as_ref()),
        ..RunOptions::default()
    })
    .run(&series, &config, &model, &baselines());
    assert!(matches!(result, Err(BacktestError::Cancelled)));
    assert!(flag.load(Ordering::Relaxed));
}

// ──────────────────────────────────────────────
// 6. Leakage
// ──────────────────────────────────────────────

fn corrupted_folds(series: &Series, config: &SplitConfig) -> Vec<foldcast_core::TimeSeriesSplit> {
    let mut folds = foldcast_core::FoldGenerator::new(config.clone())
        .split(series)
        .unwrap();
    // Off-by-one: the test window starts on the last training observation.
    folds[1].bounds.test_start = folds[1].bounds.train_end - 1;
    folds
}

#[test]
fn leakage_aborts_with_internal_error() {
    let series = ramp(120);
    let config = SplitConfig::expanding(3, 30, 0, 14).unwrap();
    let err = Backtester::default()
        .run_with_folds(
            &series,
            &config,
            corrupted_folds(&series, &config),
            &last_value(),
            &baselines(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        BacktestError::Leakage(LeakageError::TrainReachesTest { fold_index: 1, .. })
    ));
    assert_eq!(err.class(), ErrorClass::Internal);
    assert_eq!(err.user_message(), "backtest internal error");
}

#[test]
fn leakage_can_be_downgraded_to_a_flag() {
    let series = ramp(120);
    let config = SplitConfig::expanding(3, 30, 0, 14).unwrap();
    let result = Backtester::new(RunOptions {
        abort_on_leakage: false,
        ..RunOptions::default()
    })
    .run_with_folds(
        &series,
        &config,
        corrupted_folds(&series, &config),
        &last_value(),
        &baselines(),
    )
    .unwrap();
    assert!(!result.leakage_check_passed);
    assert_eq!(result.n_folds, 3);
}

#[test]
fn valid_supplied_folds_pass() {
    let series = ramp(120);
    let config = SplitConfig::expanding(3, 30, 0, 14).unwrap();
    let folds = foldcast_core::FoldGenerator::new(config.clone())
        .split(&series)
        .unwrap();
    let result = Backtester::default()
        .run_with_folds(&series, &config, folds, &last_value(), &baselines())
        .unwrap();
    assert!(result.leakage_check_passed);
    assert_eq!(result.primary().unwrap().aggregated_metrics.mae, 7.5);
}

// ──────────────────────────────────────────────
// 7. Requests
// ──────────────────────────────────────────────

#[test]
fn request_with_custom_model() {
    let mut registry = ForecasterRegistry::new();
    registry.register("fails_on", |params: &ParamMap| {
        let fail_len = params.get("length").copied().unwrap_or(0.0) as usize;
        Ok(Box::new(FailsOnLength { fail_len }) as BoxedForecaster)
    });

    let request = BacktestRequest::from_toml(
        r#"
season_length = 7
parallel = true

[split]
n_splits = 3
min_train_size = 30
horizon = 14

[model]
key = "candidate"
type = "custom"
name = "fails_on"
params = { length = 44 }

[[baselines]]
type = "drift"
"#,
    )
    .unwrap();

    let result = run_request(&ramp(120), &request, &registry, None).unwrap();
    assert_eq!(result.primary_key, "candidate");
    assert_eq!(result.baseline_keys, vec!["naive", "seasonal_naive", "drift"]);
    let primary = result.primary().unwrap();
    assert_eq!(primary.model_name, "fails_on");
    assert!(!primary.fold_results[1].is_completed());
    // Drift on a perfect ramp has no error.
    assert_eq!(result.model("drift").unwrap().aggregated_metrics.mae, 0.0);
}

#[test]
fn request_with_unknown_custom_model_is_user_error() {
    let request = BacktestRequest::new(
        SplitConfig::expanding(3, 30, 0, 14).unwrap(),
        KeyedModel::new(ModelConfig::Custom {
            name: "prophet".into(),
            params: ParamMap::new(),
        }),
    );
    let err = run_request(&ramp(120), &request, &ForecasterRegistry::new(), None).unwrap_err();
    assert!(err.is_user_error());
    assert!(err.user_message().contains("prophet"));
}

#[test]
fn request_with_duplicate_baseline_key_is_rejected() {
    let mut request = BacktestRequest::new(
        SplitConfig::expanding(3, 30, 0, 14).unwrap(),
        KeyedModel::new(ModelConfig::Drift),
    );
    request
        .baselines
        .push(KeyedModel::with_key("naive", ModelConfig::MovingAverage { window: 3 }));
    let err = run_request(&ramp(120), &request, &ForecasterRegistry::new(), None).unwrap_err();
    assert!(err.is_user_error());
    assert!(err.to_string().contains("duplicate model key: naive"));
}

#[test]
fn primary_named_like_a_baseline_is_rejected() {
    let request = BacktestRequest::new(
        SplitConfig::expanding(3, 30, 0, 14).unwrap(),
        KeyedModel::new(ModelConfig::Naive),
    );
    // Primary key "naive" collides with the mandatory baseline.
    let err = run_request(&ramp(120), &request, &ForecasterRegistry::new(), None).unwrap_err();
    assert!(matches!(err, BacktestError::Model(_)));
}
