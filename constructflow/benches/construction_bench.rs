//! Benchmarks for composed construction execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use constructflow::prelude::*;
use serde::Serialize;

#[derive(Clone, Serialize)]
struct Count {
    n: u64,
}

impl HasConfidence for Count {}

fn inc(id: &str) -> impl Construction<u64, u64> {
    atom(id.to_string(), |x: u64, _ctx| async move { anyhow::Ok(x + 1) })
}

fn construction_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let pipeline = seq(seq(inc("a"), inc("b")), fanout(inc("c"), inc("d")));
    c.bench_function("seq_fanout", |b| {
        b.iter(|| runtime.block_on(pipeline.execute(black_box(1), None)));
    });

    let debugged = seq(seq(inc("a"), inc("b")), fanout(inc("c"), inc("d"))).debug(DebugOptions::default());
    c.bench_function("seq_fanout_debug", |b| {
        b.iter(|| runtime.block_on(debugged.execute(black_box(1), None)));
    });

    let step = atom("step", |c: Count, _ctx| async move { anyhow::Ok(Count { n: c.n + 1 }) });
    #[allow(clippy::cast_precision_loss)]
    let looped = fix(
        step,
        |c: &Count| c.n >= 50,
        FixMetric::new(|c: &Count| c.n as f64, 1_000.0),
        FixConfig::new().with_max_iter(100),
    );
    c.bench_function("fix_50_iterations", |b| {
        b.iter(|| runtime.block_on(looped.execute(black_box(Count { n: 0 }), None)));
    });
}

criterion_group!(benches, construction_benchmark);
criterion_main!(benches);
