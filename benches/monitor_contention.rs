//! Benchmarks for monitor enter/exit and interlocked operations under contention

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::atomic::AtomicI64;
use std::sync::{Arc, Barrier};
use std::thread;
use strand_rt::prelude::*;

fn bench_uncontended_lock(c: &mut Criterion) {
    let obj = ObjectHeader::new();
    // first lock allocates the sync block
    drop(monitor::lock(&obj));

    c.bench_function("monitor_uncontended", |b| {
        b.iter(|| {
            let _guard = monitor::lock(black_box(&obj));
        });
    });

    c.bench_function("monitor_reentrant", |b| {
        let _outer = monitor::lock(&obj);
        b.iter(|| {
            let _inner = monitor::lock(black_box(&obj));
        });
    });
}

fn bench_contended_lock(c: &mut Criterion) {
    let mut group = c.benchmark_group("monitor_contended");
    group.sample_size(20);

    for threads in [2usize, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let obj = Arc::new(ObjectHeader::new());
                let counter = Arc::new(AtomicI64::new(0));
                let barrier = Arc::new(Barrier::new(threads));

                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let obj = obj.clone();
                        let counter = counter.clone();
                        let barrier = barrier.clone();
                        thread::spawn(move || {
                            barrier.wait();
                            for _ in 0..1_000 {
                                let _guard = monitor::lock(&obj);
                                interlocked::increment_i64(&counter);
                            }
                        })
                    })
                    .collect();
                for h in handles {
                    h.join().unwrap();
                }
                black_box(interlocked::read_i64(&counter))
            });
        });
    }

    group.finish();
}

fn bench_interlocked(c: &mut Criterion) {
    let counter = AtomicI64::new(0);
    c.bench_function("interlocked_increment_i64", |b| {
        b.iter(|| interlocked::increment_i64(black_box(&counter)));
    });
    c.bench_function("interlocked_compare_exchange_i64", |b| {
        b.iter(|| {
            let seen = interlocked::read_i64(&counter);
            interlocked::compare_exchange_i64(black_box(&counter), seen + 1, seen)
        });
    });
}

criterion_group!(
    benches,
    bench_uncontended_lock,
    bench_contended_lock,
    bench_interlocked
);
criterion_main!(benches);
