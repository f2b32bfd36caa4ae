//! Benchmarks for the Roster change notifier
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use roster::notifier::{ChangeEvent, Subscription, SubscriptionRegistry};
use std::sync::Arc;

fn subscribe_many(registry: &Arc<SubscriptionRegistry>, count: usize) -> Vec<Subscription> {
    (0..count)
        .map(|i| registry.subscribe(format!("bench-{}", i)).unwrap())
        .collect()
}

fn bench_broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast");

    for subscribers in [1, 10, 100, 1000] {
        group.throughput(Throughput::Elements(subscribers as u64));

        // Receivers are drained every iteration so queues never fill
        group.bench_function(format!("drained_{}", subscribers), |b| {
            let registry = Arc::new(SubscriptionRegistry::new(16));
            let mut subs = subscribe_many(&registry, subscribers);

            b.iter(|| {
                registry.broadcast(black_box(ChangeEvent::update("user-1")));
                for sub in subs.iter_mut() {
                    let _ = sub.try_recv();
                }
            })
        });

        // Queues stay full, every delivery is dropped
        group.bench_function(format!("saturated_{}", subscribers), |b| {
            let registry = Arc::new(SubscriptionRegistry::new(1));
            let _subs = subscribe_many(&registry, subscribers);
            registry.broadcast(ChangeEvent::insert("warmup"));

            b.iter(|| registry.broadcast(black_box(ChangeEvent::update("user-1"))))
        });
    }

    group.finish();
}

fn bench_subscribe(c: &mut Criterion) {
    let mut group = c.benchmark_group("subscribe");

    group.bench_function("subscribe_unsubscribe", |b| {
        let registry = Arc::new(SubscriptionRegistry::default());
        let _others = subscribe_many(&registry, 100);

        b.iter(|| {
            let sub = registry.subscribe(black_box("transient")).unwrap();
            drop(sub);
        })
    });

    group.finish();
}

criterion_group!(benches, bench_broadcast, bench_subscribe);
criterion_main!(benches);
