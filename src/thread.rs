//! Managed threads: one OS thread bound to a start delegate.
//!
//! The body runs behind a panic boundary, so an escaping panic ends only
//! that thread. Every managed thread carries a process-unique managed id;
//! threads this crate did not create get one lazily the first time they ask.

use crate::collector::spawn_registered_with_exit;
use crate::delegate::Delegate;
use crate::error::{Error, Result};
use crate::executor::PanicHandler;
use crate::runtime;
use log::{debug, trace};
use parking_lot::Mutex;
use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

static MANAGED_ID_COUNTER: AtomicU32 = AtomicU32::new(1);

thread_local! {
    static CURRENT_MANAGED_ID: Cell<u32> = const { Cell::new(0) };
}

fn next_managed_id() -> u32 {
    MANAGED_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Managed id of the calling thread.
pub fn current_managed_id() -> u32 {
    CURRENT_MANAGED_ID.with(|id| {
        if id.get() == 0 {
            id.set(next_managed_id());
        }
        id.get()
    })
}

/// Sleep the calling thread. `ms <= 0` only yields.
pub fn sleep(ms: i32) {
    match u64::try_from(ms) {
        Ok(ms) if ms > 0 => thread::sleep(Duration::from_millis(ms)),
        _ => thread::yield_now(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    Unstarted = 0,
    Running = 1,
    Stopped = 2,
}

impl ThreadState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ThreadState::Unstarted,
            1 => ThreadState::Running,
            _ => ThreadState::Stopped,
        }
    }
}

struct ThreadInner {
    managed_id: u32,
    name: Option<String>,
    start: Delegate,
    state: AtomicU8,
    handle: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct ManagedThread {
    inner: Arc<ThreadInner>,
}

impl ManagedThread {
    pub fn new(start: Delegate) -> Self {
        Self::build(start, None)
    }

    pub fn with_name(start: Delegate, name: impl Into<String>) -> Self {
        Self::build(start, Some(name.into()))
    }

    fn build(start: Delegate, name: Option<String>) -> Self {
        Self {
            inner: Arc::new(ThreadInner {
                managed_id: next_managed_id(),
                name,
                start,
                state: AtomicU8::new(ThreadState::Unstarted as u8),
                handle: Mutex::new(None),
            }),
        }
    }

    pub fn managed_id(&self) -> u32 {
        self.inner.managed_id
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn state(&self) -> ThreadState {
        ThreadState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn is_alive(&self) -> bool {
        self.state() == ThreadState::Running
    }

    /// Spawn the OS thread. Fails with `InvalidOperation` unless the thread
    /// is still unstarted.
    pub fn start(&self) -> Result<()> {
        if self
            .inner
            .state
            .compare_exchange(
                ThreadState::Unstarted as u8,
                ThreadState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(Error::invalid_operation("thread is running or terminated and cannot restart"));
        }

        let config = runtime::current_config();
        let boundary = PanicHandler::new(config.panic_strategy);
        let inner = self.inner.clone();
        let exiting = self.inner.clone();

        let spawned = spawn_registered_with_exit(
            self.inner.name.clone(),
            config.stack_size,
            move || {
                CURRENT_MANAGED_ID.with(|id| id.set(inner.managed_id));
                trace!("managed thread {} started", inner.managed_id);

                let context = format!("managed thread {}", inner.managed_id);
                let _ = boundary.execute(&context, || inner.start.invoke());
            },
            // reported stopped only once the collector has let go of the thread
            move || {
                exiting
                    .state
                    .store(ThreadState::Stopped as u8, Ordering::Release);
                trace!("managed thread {} stopped", exiting.managed_id);
            },
        );

        match spawned {
            Ok(handle) => {
                *self.inner.handle.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                debug!("managed thread {} failed to start: {}", self.inner.managed_id, e);
                self.inner
                    .state
                    .store(ThreadState::Unstarted as u8, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Block until the OS thread has exited.
    pub fn join(&self) -> Result<()> {
        if self.state() == ThreadState::Unstarted {
            return Err(Error::invalid_operation("thread has not been started"));
        }
        if current_managed_id() == self.inner.managed_id {
            return Err(Error::invalid_operation("a thread cannot join itself"));
        }

        let handle = self.inner.handle.lock().take();
        match handle {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::invalid_operation("managed thread terminated abnormally")),
            // already joined, or `start` is still storing the handle
            None => {
                self.poll_until_stopped(None);
                Ok(())
            }
        }
    }

    /// Wait up to `ms` milliseconds for the thread to stop; negative waits
    /// forever. Returns whether it stopped.
    pub fn join_timeout(&self, ms: i32) -> Result<bool> {
        let Ok(ms) = u64::try_from(ms) else {
            self.join()?;
            return Ok(true);
        };
        if self.state() == ThreadState::Unstarted {
            return Err(Error::invalid_operation("thread has not been started"));
        }

        let deadline = Instant::now() + Duration::from_millis(ms);
        if self.poll_until_stopped(Some(deadline)) {
            self.join()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn poll_until_stopped(&self, deadline: Option<Instant>) -> bool {
        let interval = runtime::current_config().join_poll_interval;
        loop {
            if self.state() == ThreadState::Stopped {
                return true;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return false;
            }
            thread::sleep(interval);
        }
    }
}

impl fmt::Debug for ManagedThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedThread")
            .field("managed_id", &self.inner.managed_id)
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}
