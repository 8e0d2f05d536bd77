//! Stress tests for the strand runtime

use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use strand_rt::prelude::*;
use strand_rt::sync::SyncBlockTable;

static POOL: Mutex<()> = Mutex::new(());

#[test]
#[ignore] // Run with --ignored flag
fn stress_test_many_small_tasks() {
    let _guard = POOL.lock();
    strand_rt::shutdown();
    strand_rt::init(0).unwrap();

    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..100 {
        let tasks: Vec<Task> = (0..1_000)
            .map(|_| {
                let counter = counter.clone();
                run(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                })
            })
            .collect();
        when_all(&tasks).wait();
    }
    assert_eq!(counter.load(Ordering::SeqCst), 100_000);

    strand_rt::shutdown();
}

#[test]
#[ignore]
fn stress_test_when_any_races() {
    const K: usize = 16;

    for _ in 0..500 {
        let inputs: Vec<Task> = (0..K).map(|_| Task::create_pending()).collect();
        let any = when_any(&inputs);
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        any.add_continuation(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });

        let barrier = Arc::new(Barrier::new(K));
        let handles: Vec<_> = inputs
            .into_iter()
            .map(|t| {
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    t.complete();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}

#[test]
#[ignore]
fn stress_test_sync_block_creation() {
    const THREADS: usize = 32;

    let table = Arc::new(SyncBlockTable::new());
    for _ in 0..200 {
        let header = Arc::new(ObjectHeader::new());
        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let table = table.clone();
                let header = header.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    table.get_or_create(&header)
                })
            })
            .collect();
        let blocks: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(blocks.iter().all(|b| Arc::ptr_eq(b, &blocks[0])));
        assert!(table.release(&header));
    }
    assert_eq!(table.live_blocks(), 0);
}

#[test]
#[ignore]
fn stress_test_monitor_with_random_hold_times() {
    let obj = Arc::new(ObjectHeader::new());
    let inside = Arc::new(AtomicI64::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let obj = obj.clone();
            let inside = inside.clone();
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..200 {
                    let _lock = monitor::lock(&obj);
                    // reentrant acquisition inside the critical section
                    let _again = monitor::lock(&obj);
                    assert_eq!(interlocked::increment_i64(&inside), 1);
                    thread::sleep(Duration::from_micros(rng.gen_range(0..50)));
                    assert_eq!(interlocked::decrement_i64(&inside), 0);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

#[test]
#[ignore]
fn stress_test_continuations_under_contention() {
    let _guard = POOL.lock();
    strand_rt::shutdown();
    strand_rt::init(4).unwrap();

    let ran = Arc::new(AtomicUsize::new(0));
    for _ in 0..200 {
        let t = Task::create_pending();
        let registrars: Vec<Task> = (0..4)
            .map(|_| {
                let t = t.clone();
                let ran = ran.clone();
                run(move || {
                    for _ in 0..25 {
                        let ran = ran.clone();
                        t.add_continuation(move |_| {
                            ran.fetch_add(1, Ordering::Relaxed);
                        });
                    }
                })
            })
            .collect();
        let completer = {
            let t = t.clone();
            run(move || t.complete())
        };
        when_all(&registrars).wait();
        completer.wait();
    }
    assert_eq!(ran.load(Ordering::SeqCst), 200 * 100);

    strand_rt::shutdown();
}
