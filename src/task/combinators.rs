//! Task combinators built from continuations: [`when_all`], [`when_any`],
//! [`delay`] and the `run` family.
//!
//! Inputs are anything that [`AsTask`]; a missing (`None`) input counts as
//! an already-completed task.

use super::engine::Task;
use crate::delegate::Delegate;
use crate::exception::Exception;
use crate::executor::{PanicHandler, PanicStrategy, WorkItem};
use crate::runtime;
use log::trace;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

static RUN_BOUNDARY: PanicHandler = PanicHandler::new(PanicStrategy::LogAndContinue);

/// A possibly missing task handle.
pub trait AsTask {
    fn as_task(&self) -> Option<&Task>;
}

impl AsTask for Task {
    fn as_task(&self) -> Option<&Task> {
        Some(self)
    }
}

impl AsTask for &Task {
    fn as_task(&self) -> Option<&Task> {
        Some(*self)
    }
}

impl AsTask for Option<Task> {
    fn as_task(&self) -> Option<&Task> {
        self.as_ref()
    }
}

impl AsTask for Option<&Task> {
    fn as_task(&self) -> Option<&Task> {
        *self
    }
}

/// Task that completes once every input has finished, whether the input
/// completed or faulted. An empty input completes immediately.
pub fn when_all<T: AsTask>(tasks: &[T]) -> Task {
    let inputs: Vec<Task> = tasks.iter().filter_map(|t| t.as_task().cloned()).collect();
    if inputs.is_empty() {
        return Task::create_completed();
    }

    let result = Task::create_pending();
    let remaining = Arc::new(AtomicUsize::new(inputs.len()));
    for input in inputs {
        let result = result.clone();
        let remaining = remaining.clone();
        input.add_continuation(move |_| {
            if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                result.complete();
            }
        });
    }
    result
}

/// Result of [`when_any_indexed`]: the combined task plus the position of
/// the input that completed it.
#[derive(Debug, Clone)]
pub struct WhenAny {
    task: Task,
    winner: Arc<OnceLock<usize>>,
}

impl WhenAny {
    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn into_task(self) -> Task {
        self.task
    }

    /// Index of the first input to finish, once known. `None` for an empty
    /// input list.
    pub fn winner(&self) -> Option<usize> {
        self.winner.get().copied()
    }
}

/// Task that completes as soon as any input finishes. Concurrent finishers
/// race on a single flag; only the first completes the result.
pub fn when_any<T: AsTask>(tasks: &[T]) -> Task {
    when_any_indexed(tasks).into_task()
}

pub fn when_any_indexed<T: AsTask>(tasks: &[T]) -> WhenAny {
    let winner = Arc::new(OnceLock::new());
    if tasks.is_empty() {
        return WhenAny {
            task: Task::create_completed(),
            winner,
        };
    }

    let result = Task::create_pending();
    let fired = Arc::new(AtomicBool::new(false));

    for (index, input) in tasks.iter().enumerate() {
        if fired.load(Ordering::Acquire) {
            break;
        }
        let fire = {
            let result = result.clone();
            let fired = fired.clone();
            let winner = winner.clone();
            move || {
                if fired
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    let _ = winner.set(index);
                    result.complete();
                }
            }
        };
        match input.as_task() {
            Some(task) => task.add_continuation(move |_| fire()),
            None => fire(),
        }
    }

    WhenAny {
        task: result,
        winner,
    }
}

/// Task that completes after `ms` milliseconds.
///
/// `ms <= 0` returns the shared completed task without scheduling anything.
/// If no timer can be started the task faults.
pub fn delay(ms: i64) -> Task {
    if ms <= 0 {
        return Task::completed();
    }

    let task = Task::create_pending();
    let timer_task = task.clone();
    let scheduled = runtime::schedule_after(Duration::from_millis(ms as u64), move || {
        timer_task.complete();
    });
    if let Err(e) = scheduled {
        trace!("delay({}) could not start a timer: {}", ms, e);
        task.fault(Exception::from(e));
    }
    task
}

fn spawn_task<F>(body: F) -> Task
where
    F: FnOnce() -> Result<(), Exception> + Send + 'static,
{
    let task = Task::create_pending();
    let completion = task.clone();
    let item = WorkItem::new(move || {
        match RUN_BOUNDARY.execute("task body", body) {
            Ok(Ok(())) => completion.complete(),
            Ok(Err(ex)) | Err(ex) => completion.fault(ex),
        }
    });

    // without a running pool the body runs on the caller
    if let Some(item) = runtime::dispatch(item) {
        item.execute();
    }
    task
}

/// Run `f` on the pool, or inline when no pool runs. The returned task
/// completes when `f` returns and faults if `f` panics.
pub fn run<F>(f: F) -> Task
where
    F: FnOnce() + Send + 'static,
{
    spawn_task(move || {
        f();
        Ok(())
    })
}

/// Like [`run`], also faulting the task when `f` returns an exception.
pub fn run_fallible<F>(f: F) -> Task
where
    F: FnOnce() -> Result<(), Exception> + Send + 'static,
{
    spawn_task(f)
}

pub fn run_delegate(delegate: Delegate) -> Task {
    run(move || delegate.invoke())
}
