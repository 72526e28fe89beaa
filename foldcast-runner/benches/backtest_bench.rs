//! Criterion benchmarks for full backtest runs.
//!
//! Run with: `cargo bench -p foldcast-runner`
//!
//! Measures a complete run (folds, fit/predict for every model, aggregation)
//! serially and on the rayon pool, plus JSON export of the result.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use foldcast_core::{BaselineSet, ModelConfig, ModelSpec, Series, SplitConfig};
use foldcast_runner::{export_json, Backtester, Retention, RunOptions};

fn make_series(n: usize) -> Series {
    let base_date = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    Series::from_points(
        "bench",
        (0..n).map(|i| {
            let weekly = [3.0, 1.0, 0.0, 2.0, 5.0, 8.0, 6.0][i % 7];
            (
                base_date + chrono::Duration::days(i as i64),
                40.0 + 0.05 * i as f64 + weekly,
            )
        }),
    )
    .unwrap()
}

fn baselines() -> BaselineSet {
    BaselineSet::standard(7)
        .unwrap()
        .with_extra(ModelSpec::builtin("drift", ModelConfig::Drift).unwrap())
        .unwrap()
        .with_extra(ModelSpec::builtin("ma28", ModelConfig::MovingAverage { window: 28 }).unwrap())
        .unwrap()
}

fn bench_full_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("backtest_run");
    let series = make_series(1_500);
    let config = SplitConfig::sliding(20, 365, 3, 28).unwrap();
    let model = ModelSpec::builtin("rw", ModelConfig::SampledRandomWalk { seed: 42 }).unwrap();
    let baselines = baselines();

    for parallel in [false, true] {
        let backtester = Backtester::new(RunOptions {
            parallel,
            retention: Retention::MetricsOnly,
            ..RunOptions::default()
        });
        let label = if parallel { "parallel" } else { "serial" };
        group.bench_with_input(BenchmarkId::from_parameter(label), &series, |b, series| {
            b.iter(|| {
                backtester
                    .run(black_box(series), &config, &model, &baselines)
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_export(c: &mut Criterion) {
    let series = make_series(600);
    let config = SplitConfig::expanding(10, 180, 0, 28).unwrap();
    let model = ModelSpec::builtin("drift", ModelConfig::Drift).unwrap();
    let result = Backtester::default()
        .run(&series, &config, &model, &BaselineSet::standard(7).unwrap())
        .unwrap();

    c.bench_function("export_json_full_retention", |b| {
        b.iter(|| export_json(black_box(&result)).unwrap())
    });
}

criterion_group!(benches, bench_full_run, bench_export);
criterion_main!(benches);
