//! Benchmarks for flexible reads on the memory backend

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use flexcache::{
    DeferredQueue, FlexibleCache, FlexibleConfig, JsonSerializer, ManualClock, MemoryBackend,
    MemoryConfig, NoopMetrics, Timestamp,
};
use std::hint::black_box;
use std::sync::Arc;
use tokio::runtime::Runtime;

const T0: u64 = 1_700_000_000;

fn create_cache() -> (FlexibleCache<MemoryBackend>, ManualClock, DeferredQueue) {
    let clock = ManualClock::new(Timestamp::from_secs(T0));
    let backend = MemoryBackend::with_clock(MemoryConfig::default(), Arc::new(clock.clone()));
    let queue = DeferredQueue::new();
    let cache = FlexibleCache::with_serializer_and_metrics(
        backend,
        JsonSerializer,
        NoopMetrics,
        FlexibleConfig::default(),
    )
    .with_clock(clock.clone())
    .with_executor(queue.clone());
    (cache, clock, queue)
}

fn bench_fresh(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (cache, _clock, _queue) = create_cache();

    rt.block_on(async {
        cache.put_fresh("key", &42i32, (60, 3600)).await.unwrap();
    });

    let mut group = c.benchmark_group("fresh");
    group.throughput(Throughput::Elements(1));

    group.bench_function("small_value", |b| {
        b.iter(|| {
            rt.block_on(async {
                let value: i32 = cache
                    .flexible(black_box("key"), (60, 3600), || async { Ok(0) }, None)
                    .await
                    .unwrap();
                black_box(value);
            });
        });
    });

    group.finish();
}

fn bench_stale(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (cache, clock, queue) = create_cache();

    rt.block_on(async {
        cache.put_fresh("key", &"x".repeat(1024), (60, 3600)).await.unwrap();
    });
    clock.advance_secs(90);

    let mut group = c.benchmark_group("stale");
    group.throughput(Throughput::Elements(1));

    // First read queues the refresh, the rest hit the dedup set
    group.bench_function("medium_value_deduplicated", |b| {
        b.iter(|| {
            rt.block_on(async {
                let value: String = cache
                    .flexible(black_box("key"), (60, 3600), || async { Ok(String::new()) }, None)
                    .await
                    .unwrap();
                black_box(value);
            });
        });
    });

    group.finish();
    queue.clear();
}

fn bench_miss(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (cache, _clock, _queue) = create_cache();

    let mut group = c.benchmark_group("miss");
    group.throughput(Throughput::Elements(1));

    group.bench_function("compute_and_store", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            let key = format!("key:{}", i);
            rt.block_on(async {
                let value: u64 = cache
                    .flexible(&key, (60, 3600), move || async move { Ok(i) }, None)
                    .await
                    .unwrap();
                black_box(value);
            });
        });
    });

    group.finish();
}

criterion_group!(benches, bench_fresh, bench_stale, bench_miss);
criterion_main!(benches);
