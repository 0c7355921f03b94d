//! Cache benchmarks.
//!
//! Covers the coalescing cache's hit path per backend and the raw eviction
//! backends under mixed workloads.
//!
//! Run with: `cargo bench --bench cache_bench`

use std::convert::Infallible;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use stampede::{loader_fn, Cache, CacheBuilder, LruCache, TwoQueueCache};
use tokio::runtime::Runtime;

type BenchCache = Cache<u64, u64, Infallible>;

fn build_runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread().enable_time().build().expect("runtime")
}

fn bench_cache_get_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_get_hit");
    let rt = build_runtime();

    let hour = Duration::from_secs(3600);
    let variants: [(&str, CacheBuilder); 3] = [
        ("map", CacheBuilder::new(hour, hour).map_backend(0)),
        ("lru", CacheBuilder::new(hour, hour).lru_backend(1024)),
        ("2q", CacheBuilder::new(hour, hour).two_queue_backend(1024)),
    ];

    for (name, builder) in variants {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new(name, 1024), &builder, |b, builder| {
            let cache: BenchCache = builder
                .clone()
                .build(loader_fn(|key: u64| async move { Ok::<_, Infallible>(key * 2) }))
                .expect("valid config");

            // Pre-populate so every measured get is a fresh hit.
            rt.block_on(async {
                for key in 0..1024u64 {
                    cache.get(&key).await.unwrap();
                }
            });

            let mut counter = 0u64;
            b.to_async(&rt).iter(|| {
                let cache = cache.clone();
                let key = counter % 1024;
                counter = counter.wrapping_add(1);
                async move {
                    black_box(cache.get(&black_box(key)).await.unwrap());
                }
            });
        });
    }

    group.finish();
}

fn bench_lru_backend(c: &mut Criterion) {
    let mut group = c.benchmark_group("lru_backend");

    group.throughput(Throughput::Elements(1));
    group.bench_function("set_get_mix", |b| {
        let mut cache: LruCache<u64, u64> = LruCache::new(8192);
        let mut rng = rand::thread_rng();
        b.iter(|| {
            let key = rng.gen_range(0..32768u64);
            if key % 2 == 0 {
                cache.set(black_box(key), key);
            } else {
                black_box(cache.get(&black_box(key)));
            }
        });
    });

    group.finish();
}

fn bench_two_queue_backend(c: &mut Criterion) {
    let mut group = c.benchmark_group("two_queue_backend");

    group.throughput(Throughput::Elements(1));
    group.bench_function("set_get_rand", |b| {
        let mut cache: TwoQueueCache<u64, u64> = TwoQueueCache::new(8192);
        let mut rng = rand::thread_rng();
        b.iter(|| {
            let key = rng.gen_range(0..32768u64);
            if key % 2 == 0 {
                cache.set(black_box(key), key);
            } else {
                black_box(cache.get(&black_box(key)));
            }
        });
    });

    group.bench_function("set_get_freq", |b| {
        let mut cache: TwoQueueCache<u64, u64> = TwoQueueCache::new(8192);
        let mut rng = rand::thread_rng();
        b.iter(|| {
            // Sets draw from a narrower range than gets, giving the
            // frequent queue something to hold on to.
            let set_key = rng.gen_range(0..16384u64);
            cache.set(black_box(set_key), set_key);
            let get_key = rng.gen_range(0..32768u64);
            black_box(cache.get(&black_box(get_key)));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_cache_get_hit, bench_lru_backend, bench_two_queue_backend);
criterion_main!(benches);
