//! Benchmarks for fingerprinting and batch fetching.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use screenflow::fetch::{BatchFetchEngine, FetchConfig};
use screenflow::settings::{fingerprint, ScreenConfig};
use screenflow::store::InMemoryArtifactStore;
use screenflow::testing::ScriptedFetcher;
use std::sync::Arc;

fn fingerprint_benchmark(c: &mut Criterion) {
    let snapshot = ScreenConfig::default().snapshot();
    c.bench_function("fingerprint_default_settings", |b| {
        b.iter(|| fingerprint(black_box(&snapshot)));
    });
}

fn fetch_benchmark(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Runtime::new() else {
        return;
    };
    let engine = BatchFetchEngine::new(
        FetchConfig::new()
            .with_threads(8)
            .with_batch_size(100)
            .with_item_timeout(None),
    );

    c.bench_function("fetch_1000_items", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let store = InMemoryArtifactStore::new();
                let fetcher = Arc::new(ScriptedFetcher::new(1000).with_failures([10, 500]));
                let total = fetcher.total();
                let report = engine.run("bench", total, fetcher, &store).await;
                black_box(report.map(|report| report.artifact.len()))
            })
        });
    });
}

criterion_group!(benches, fingerprint_benchmark, fetch_benchmark);
criterion_main!(benches);
