//! Execution boundary for work items and managed thread bodies.
//!
//! A panic escaping the callable ends that unit of work only. It is counted,
//! reported through `log` according to the strategy, and handed back to the
//! caller as an [`Exception`] so it can be stored as data (for example in a
//! faulted task).

use crate::exception::Exception;
use log::{error, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicStrategy {
    /// Abort the process.
    Abort,
    /// Swallow silently.
    Isolate,
    /// Log at error level and keep going.
    #[default]
    LogAndContinue,
}

#[derive(Debug)]
pub struct PanicHandler {
    strategy: PanicStrategy,
    panic_count: AtomicUsize,
}

impl PanicHandler {
    pub const fn new(strategy: PanicStrategy) -> Self {
        Self {
            strategy,
            panic_count: AtomicUsize::new(0),
        }
    }

    /// Run `f`, converting an escaping panic into an exception handle.
    /// `context` names the unit of work in log output.
    pub fn execute<F, R>(&self, context: &str, f: F) -> Result<R, Exception>
    where
        F: FnOnce() -> R,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => Ok(result),
            Err(payload) => {
                self.panic_count.fetch_add(1, Ordering::Relaxed);
                let exception = Exception::from_panic(payload.as_ref());

                match self.strategy {
                    PanicStrategy::Abort => {
                        error!("{} panicked, aborting: {}", context, exception.message());
                        std::process::abort();
                    }
                    PanicStrategy::Isolate => {}
                    PanicStrategy::LogAndContinue => {
                        warn!("{} panicked: {}", context, exception.message());
                    }
                }

                Err(exception)
            }
        }
    }

    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }

    pub fn strategy(&self) -> PanicStrategy {
        self.strategy
    }
}

impl Default for PanicHandler {
    fn default() -> Self {
        Self::new(PanicStrategy::default())
    }
}
