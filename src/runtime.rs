//! Process-wide thread pool lifecycle.
//!
//! Generated code sees a single pool: [`init`] starts it, [`shutdown`]
//! drains and stops it, and [`queue_work`] / [`queue_delegate`] feed it.
//! Both `init` and `shutdown` are idempotent.

use crate::collector::spawn_registered;
use crate::config::Config;
use crate::delegate::Delegate;
use crate::error::{Error, Result};
use crate::executor::{ThreadPool, WorkItem};
use log::trace;
use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

static GLOBAL_POOL: RwLock<Option<Arc<ThreadPool>>> = RwLock::new(None);

/// Start the pool with `num_threads` workers; `0` means one per hardware
/// thread. No-op if the pool is already running.
pub fn init(num_threads: usize) -> Result<()> {
    let mut builder = Config::builder();
    if num_threads > 0 {
        builder = builder.num_threads(num_threads);
    }
    init_with_config(builder.build()?)
}

pub fn init_with_config(config: Config) -> Result<()> {
    let mut pool = GLOBAL_POOL.write();
    if pool.is_some() {
        return Ok(());
    }

    *pool = Some(Arc::new(ThreadPool::new(config)?));
    Ok(())
}

/// Stop the pool after its queue drains. Work queued afterwards is rejected
/// until the next [`init`].
pub fn shutdown() {
    // take it out first so producers stop seeing the pool before we join
    let pool = GLOBAL_POOL.write().take();
    if let Some(pool) = pool {
        pool.shutdown();
    }
}

pub fn is_initialized() -> bool {
    GLOBAL_POOL.read().is_some()
}

pub(crate) fn current_pool() -> Option<Arc<ThreadPool>> {
    GLOBAL_POOL.read().clone()
}

/// Configuration of the running pool, or the defaults when none runs.
pub fn current_config() -> Arc<Config> {
    static DEFAULT: OnceLock<Arc<Config>> = OnceLock::new();

    match current_pool() {
        Some(pool) => pool.config().clone(),
        None => DEFAULT.get_or_init(|| Arc::new(Config::default())).clone(),
    }
}

pub fn queue_work<F>(f: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    current_pool().ok_or(Error::NotInitialized)?.execute(f)
}

/// Function-plus-state form of [`queue_work`].
pub fn queue_work_with_state<S>(func: fn(S), state: S) -> Result<()>
where
    S: Send + 'static,
{
    current_pool()
        .ok_or(Error::NotInitialized)?
        .execute_with_state(func, state)
}

pub fn queue_delegate(delegate: Delegate) -> Result<()> {
    queue_work(move || delegate.invoke())
}

/// Hand `item` to the running pool. Returns it when there is no pool or the
/// pool is shutting down, so the caller can run it some other way.
pub(crate) fn dispatch(item: WorkItem) -> Option<WorkItem> {
    match current_pool() {
        Some(pool) => pool.try_submit(item).err(),
        None => Some(item),
    }
}

/// Run `f` after `delay` without blocking the caller.
///
/// The sleep happens on a pool worker when the pool is running and on a
/// detached, collector-registered thread otherwise.
pub(crate) fn schedule_after<F>(delay: Duration, f: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    let timer = WorkItem::new(move || {
        thread::sleep(delay);
        f();
    });

    match dispatch(timer) {
        None => {
            trace!("timer of {:?} scheduled on the pool", delay);
            Ok(())
        }
        Some(timer) => spawn_timer(delay, move || timer.execute()),
    }
}

fn spawn_timer<F>(delay: Duration, timer: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    trace!("timer of {:?} scheduled on a detached thread", delay);
    spawn_registered(Some("strand-timer".to_string()), None, timer).map(drop)
}
