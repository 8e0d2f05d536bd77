use super::panic_handler::PanicHandler;
use super::work_item::WorkItem;
use super::worker::{Worker, WorkerId};
use crate::collector::spawn_registered;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::telemetry::{Metrics, MetricsSnapshot};
use log::debug;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

#[cfg(target_os = "linux")]
fn pin_thread_to_core(core_id: usize) {
    unsafe {
        let mut cpuset: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core_id, &mut cpuset);
        let result = libc::sched_setaffinity(
            0, // current thread
            std::mem::size_of::<libc::cpu_set_t>(),
            &cpuset,
        );
        if result != 0 {
            log::warn!(
                "failed to pin thread {} to core {}",
                thread::current().name().unwrap_or("unknown"),
                core_id
            );
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct QueueState {
    pub items: VecDeque<WorkItem>,
    pub shutdown: bool,
}

/// State shared between the pool handle and its workers.
#[derive(Debug)]
pub(crate) struct Shared {
    pub queue: Mutex<QueueState>,
    pub available: Condvar,
    pub panic_handler: PanicHandler,
    pub metrics: Metrics,
}

#[derive(Debug)]
struct WorkerHandle {
    id: WorkerId,
    thread_id: ThreadId,
    thread: Option<JoinHandle<()>>,
}

/// Fixed set of worker threads draining one FIFO queue.
#[derive(Debug)]
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<WorkerHandle>>,
    num_threads: usize,
    config: Arc<Config>,
}

impl ThreadPool {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let num_threads = config.worker_threads();

        let shared = Arc::new(Shared {
            queue: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            panic_handler: PanicHandler::new(config.panic_strategy),
            metrics: Metrics::new(),
        });

        let pool = Self {
            shared,
            workers: Mutex::new(Vec::with_capacity(num_threads)),
            num_threads,
            config: Arc::new(config),
        };

        for id in 0..num_threads {
            let worker = Worker::new(id, pool.shared.clone());
            let name = format!("{}-{}", pool.config.thread_name_prefix, id);
            let pin_workers = pool.config.pin_workers;

            let spawned = spawn_registered(Some(name), pool.config.stack_size, move || {
                #[cfg(target_os = "linux")]
                if pin_workers {
                    pin_thread_to_core(id % num_cpus::get());
                }
                #[cfg(not(target_os = "linux"))]
                let _ = pin_workers;

                worker.run();
            });

            match spawned {
                Ok(thread) => pool.workers.lock().push(WorkerHandle {
                    id,
                    thread_id: thread.thread().id(),
                    thread: Some(thread),
                }),
                Err(e) => {
                    // dropping the pool stops and joins the workers already running
                    return Err(e);
                }
            }
        }

        debug!("thread pool started with {} workers", num_threads);
        Ok(pool)
    }

    /// Append to the queue and wake one worker. Never blocks on queue depth.
    ///
    /// A pool that is shutting down hands the item back.
    pub(crate) fn try_submit(&self, item: WorkItem) -> std::result::Result<(), WorkItem> {
        {
            let mut queue = self.shared.queue.lock();
            if queue.shutdown {
                return Err(item);
            }
            queue.items.push_back(item);
        }
        self.shared.metrics.record_queued();
        self.shared.available.notify_one();
        Ok(())
    }

    pub(crate) fn submit(&self, item: WorkItem) -> Result<()> {
        self.try_submit(item)
            .map_err(|_| Error::invalid_operation("thread pool is shutting down"))
    }

    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(WorkItem::new(f))
    }

    pub fn execute_with_state<S>(&self, func: fn(S), state: S) -> Result<()>
    where
        S: Send + 'static,
    {
        self.submit(WorkItem::with_state(func, state))
    }

    /// Items waiting in the queue (not counting running ones).
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().items.len()
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn panic_count(&self) -> usize {
        self.shared.panic_handler.panic_count()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.queue.lock().shutdown
    }

    /// Request shutdown, let the workers drain the queue, then join them.
    ///
    /// Idempotent. Called from one of the pool's own workers it joins every
    /// other worker and leaves the caller to exit once its item returns.
    pub fn shutdown(&self) {
        {
            let mut queue = self.shared.queue.lock();
            queue.shutdown = true;
        }
        // wake everyone up to check the shutdown flag
        self.shared.available.notify_all();

        let current = thread::current().id();
        let workers: Vec<WorkerHandle> = self.workers.lock().drain(..).collect();
        for mut worker in workers {
            if worker.thread_id == current {
                continue;
            }
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    log::error!("worker {} terminated abnormally", worker.id);
                }
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::PanicStrategy;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn small_pool(n: usize) -> ThreadPool {
        let config = Config::builder()
            .num_threads(n)
            .panic_strategy(PanicStrategy::Isolate)
            .build()
            .unwrap();
        ThreadPool::new(config).unwrap()
    }

    fn wait_for(cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_executes_work() {
        let pool = small_pool(2);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let counter = counter.clone();
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        wait_for(|| counter.load(Ordering::SeqCst) == 100);
        assert_eq!(counter.load(Ordering::SeqCst), 100);
        assert_eq!(pool.num_threads(), 2);
    }

    #[test]
    fn test_single_worker_is_fifo() {
        let pool = small_pool(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..20 {
            let order = order.clone();
            pool.execute(move || order.lock().push(i)).unwrap();
        }

        pool.shutdown();
        assert_eq!(*order.lock(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let pool = small_pool(1);
        let counter = Arc::new(AtomicUsize::new(0));

        pool.execute(|| thread::sleep(Duration::from_millis(20))).unwrap();
        for _ in 0..10 {
            let counter = counter.clone();
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert!(pool.execute(|| {}).is_err());

        // second shutdown is a no-op
        pool.shutdown();
    }

    #[test]
    fn test_panicking_item_does_not_kill_worker() {
        let pool = small_pool(1);
        let counter = Arc::new(AtomicUsize::new(0));

        pool.execute(|| panic!("work item failure")).unwrap();
        let c = counter.clone();
        pool.execute(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(pool.panic_count(), 1);
    }

    #[test]
    fn test_execute_with_state() {
        fn store(slot: Arc<AtomicUsize>) {
            slot.store(42, Ordering::SeqCst);
        }

        let pool = small_pool(1);
        let slot = Arc::new(AtomicUsize::new(0));
        pool.execute_with_state(store, slot.clone()).unwrap();
        pool.shutdown();
        assert_eq!(slot.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_shutdown_from_worker_does_not_deadlock() {
        let pool = Arc::new(small_pool(2));
        let p = pool.clone();
        let (tx, rx) = crossbeam_channel::bounded(1);

        pool.execute(move || {
            p.shutdown();
            tx.send(()).unwrap();
        })
        .unwrap();

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(pool.is_shutdown());
    }
}
