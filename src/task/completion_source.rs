//! Producer side of a task.

use super::engine::Task;
use crate::error::{Error, Result};
use crate::exception::Exception;

/// Owns the right to finish one task.
///
/// The `set_*` forms fail with `InvalidOperation` when the task has already
/// finished; the `try_set_*` forms report the race as `false`.
#[derive(Debug, Clone)]
pub struct TaskCompletionSource {
    task: Task,
}

impl TaskCompletionSource {
    pub fn new() -> Self {
        Self {
            task: Task::create_pending(),
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn set_result(&self) -> Result<()> {
        Self::check(self.task.try_set_result())
    }

    pub fn set_exception(&self, exception: Exception) -> Result<()> {
        Self::check(self.task.try_set_exception(exception))
    }

    pub fn set_canceled(&self) -> Result<()> {
        Self::check(self.task.try_set_canceled())
    }

    pub fn try_set_result(&self) -> bool {
        self.task.try_set_result()
    }

    pub fn try_set_exception(&self, exception: Exception) -> bool {
        self.task.try_set_exception(exception)
    }

    pub fn try_set_canceled(&self) -> bool {
        self.task.try_set_canceled()
    }

    fn check(transitioned: bool) -> Result<()> {
        if transitioned {
            Ok(())
        } else {
            Err(Error::invalid_operation(
                "an attempt was made to transition a task to a final state when it had already completed",
            ))
        }
    }
}

impl Default for TaskCompletionSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_set_result_once() {
        let tcs = TaskCompletionSource::new();
        assert!(!tcs.task().is_completed());

        tcs.set_result().unwrap();
        assert!(tcs.task().is_completed());
        assert!(matches!(tcs.set_result(), Err(Error::InvalidOperation(_))));
        assert!(tcs.set_canceled().is_err());
        assert!(!tcs.try_set_exception(Exception::application("late")));
    }

    #[test]
    fn test_set_exception_and_canceled() {
        let tcs = TaskCompletionSource::new();
        let ex = Exception::application("nope");
        tcs.set_exception(ex.clone()).unwrap();
        assert_eq!(tcs.task().exception(), Some(ex));

        let tcs = TaskCompletionSource::default();
        assert!(tcs.try_set_canceled());
        assert!(tcs.task().is_canceled());
    }

    #[test]
    fn test_exactly_one_racer_wins() {
        const THREADS: usize = 8;
        let tcs = TaskCompletionSource::new();
        let winners = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let tcs = tcs.clone();
                let winners = winners.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let won = if i % 2 == 0 {
                        tcs.try_set_result()
                    } else {
                        tcs.try_set_exception(Exception::application("racer"))
                    };
                    if won {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(tcs.task().is_completed());
    }
}
