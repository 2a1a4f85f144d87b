//! Benchmarks for pipeline execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use searchpipe::pipeline::{partition_budget, PipelineContext};
use searchpipe::testing::StaticSearcher;

fn budget_benchmark(c: &mut Criterion) {
    c.bench_function("partition_budget_16", |b| {
        b.iter(|| partition_budget(black_box(Some(1000)), black_box(16)));
    });
}

fn pipeline_benchmark(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Runtime::new() else {
        return;
    };
    let context = ["alpha", "beta", "gamma", "delta"]
        .into_iter()
        .try_fold(PipelineContext::default_pipeline(), |context, name| {
            context.with(StaticSearcher::with_count(name, 40))
        });
    let Ok(context) = context else {
        return;
    };

    c.bench_function("default_pipeline_4x40", |b| {
        b.iter(|| runtime.block_on(context.run(black_box("rust async"))));
    });
}

criterion_group!(benches, budget_benchmark, pipeline_benchmark);
criterion_main!(benches);
