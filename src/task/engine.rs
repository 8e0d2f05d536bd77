//! The task state machine.
//!
//! A task starts `Pending` and moves exactly once to `Completed` or
//! `Faulted`. The transition and continuation registration are serialized by
//! the task's lock: a continuation registered before the transition runs on
//! the completing thread, in registration order, after the lock is dropped;
//! one registered after the transition runs inline on the registering thread.

use crate::exception::Exception;
use crate::executor::{PanicHandler, PanicStrategy};
use crate::runtime;
use crate::util::Backoff;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Panics escaping a continuation are contained so the rest of the batch
/// still runs.
static CONTINUATION_BOUNDARY: PanicHandler = PanicHandler::new(PanicStrategy::LogAndContinue);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskStatus {
    Pending = 0,
    Completed = 1,
    Faulted = 2,
}

impl TaskStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TaskStatus::Pending,
            1 => TaskStatus::Completed,
            _ => TaskStatus::Faulted,
        }
    }
}

type Continuation = Box<dyn FnOnce(&Task) + Send + 'static>;

#[derive(Default)]
struct TaskState {
    exception: Option<Exception>,
    continuations: Vec<Continuation>,
}

struct TaskInner {
    id: TaskId,
    /// Mirrors the status for lock-free reads; only written under `state`.
    status: AtomicU8,
    state: Mutex<TaskState>,
    finished: Condvar,
}

/// Handle to an asynchronous operation. Clones share the same task.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    fn with_status(status: TaskStatus) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id: TaskId::next(),
                status: AtomicU8::new(status as u8),
                state: Mutex::new(TaskState::default()),
                finished: Condvar::new(),
            }),
        }
    }

    pub fn create_pending() -> Self {
        Self::with_status(TaskStatus::Pending)
    }

    pub fn create_completed() -> Self {
        Self::with_status(TaskStatus::Completed)
    }

    /// Shared, already-completed task.
    pub fn completed() -> Task {
        static COMPLETED: OnceLock<Task> = OnceLock::new();
        COMPLETED.get_or_init(Task::create_completed).clone()
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.inner.status.load(Ordering::Acquire))
    }

    /// `true` once the task left `Pending`, whether it completed or faulted.
    pub fn is_completed(&self) -> bool {
        self.status() != TaskStatus::Pending
    }

    pub fn is_faulted(&self) -> bool {
        self.status() == TaskStatus::Faulted
    }

    /// Faulted with an operation-canceled exception.
    pub fn is_canceled(&self) -> bool {
        self.is_faulted() && self.exception().is_some_and(|ex| ex.is_cancellation())
    }

    pub fn exception(&self) -> Option<Exception> {
        if !self.is_faulted() {
            return None;
        }
        self.inner.state.lock().exception.clone()
    }

    /// Outcome of a finished task; `None` while still pending.
    pub fn outcome(&self) -> Option<Result<(), Exception>> {
        match self.status() {
            TaskStatus::Pending => None,
            TaskStatus::Completed => Some(Ok(())),
            TaskStatus::Faulted => {
                let ex = self.inner.state.lock().exception.clone();
                Some(ex.map_or(Ok(()), Err))
            }
        }
    }

    pub fn ptr_eq(&self, other: &Task) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn transition(&self, status: TaskStatus, exception: Option<Exception>) -> bool {
        let continuations = {
            let mut st = self.inner.state.lock();
            if self.inner.status.load(Ordering::Acquire) != TaskStatus::Pending as u8 {
                return false;
            }
            st.exception = exception;
            self.inner.status.store(status as u8, Ordering::Release);
            std::mem::take(&mut st.continuations)
        };
        self.inner.finished.notify_all();

        for continuation in continuations {
            self.run_continuation(continuation);
        }
        true
    }

    fn run_continuation(&self, continuation: Continuation) {
        let _ = CONTINUATION_BOUNDARY.execute("task continuation", || continuation(self));
    }

    /// Move to `Completed` and run the queued continuations. No-op if the
    /// task already finished.
    pub fn complete(&self) {
        self.transition(TaskStatus::Completed, None);
    }

    /// Move to `Faulted` with `exception` and run the queued continuations.
    /// No-op if the task already finished.
    pub fn fault(&self, exception: Exception) {
        self.transition(TaskStatus::Faulted, Some(exception));
    }

    /// Like [`complete`](Task::complete) but reports whether this call did
    /// the transition.
    pub fn try_set_result(&self) -> bool {
        self.transition(TaskStatus::Completed, None)
    }

    pub fn try_set_exception(&self, exception: Exception) -> bool {
        self.transition(TaskStatus::Faulted, Some(exception))
    }

    /// Fault with an operation-canceled exception.
    pub fn try_set_canceled(&self) -> bool {
        self.transition(TaskStatus::Faulted, Some(Exception::operation_canceled()))
    }

    /// Run `f` once the task has finished.
    ///
    /// If it already has, `f` runs on the calling thread before this returns;
    /// otherwise it runs on whichever thread finishes the task.
    pub fn add_continuation<F>(&self, f: F)
    where
        F: FnOnce(&Task) + Send + 'static,
    {
        {
            let mut st = self.inner.state.lock();
            if self.inner.status.load(Ordering::Acquire) == TaskStatus::Pending as u8 {
                st.continuations.push(Box::new(f));
                return;
            }
        }
        self.run_continuation(Box::new(f));
    }

    /// Block until the task has finished.
    pub fn wait(&self) {
        if self.spin_until_finished() {
            return;
        }
        let mut st = self.inner.state.lock();
        while !self.is_completed() {
            self.inner.finished.wait(&mut st);
        }
    }

    /// Block for at most `timeout`; returns whether the task finished.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        if self.spin_until_finished() {
            return true;
        }
        let mut st = self.inner.state.lock();
        while !self.is_completed() {
            if self.inner.finished.wait_until(&mut st, deadline).timed_out() {
                return self.is_completed();
            }
        }
        true
    }

    fn spin_until_finished(&self) -> bool {
        let mut backoff = Backoff::with_limit(runtime::current_config().wait_spin_limit);
        loop {
            if self.is_completed() {
                return true;
            }
            if backoff.is_completed() {
                return false;
            }
            backoff.snooze();
        }
    }

    pub(crate) fn pending_continuations(&self) -> usize {
        self.inner.state.lock().continuations.len()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("status", &self.status())
            .finish()
    }
}
