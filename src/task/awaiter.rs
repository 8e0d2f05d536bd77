//! Runtime half of `await` in generated state machines.
//!
//! Generated code checks [`TaskAwaiter::is_completed`]; if the task is still
//! pending it hands its resume callback to
//! [`TaskAwaiter::on_completed`] and returns. Once resumed it calls
//! [`TaskAwaiter::get_result`] to observe the outcome. The builder owns the
//! task the async method itself returns.

use super::engine::Task;
use crate::exception::Exception;

#[derive(Debug, Clone)]
pub struct TaskAwaiter {
    task: Task,
}

impl TaskAwaiter {
    pub fn new(task: Task) -> Self {
        Self { task }
    }

    pub fn is_completed(&self) -> bool {
        self.task.is_completed()
    }

    /// Schedule `resume` to run once the awaited task finishes.
    pub fn on_completed<F>(&self, resume: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.task.add_continuation(move |_| resume());
    }

    /// Outcome of the awaited task. Blocks if it has not finished yet.
    pub fn get_result(&self) -> Result<(), Exception> {
        self.task.wait();
        self.task.outcome().unwrap_or(Ok(()))
    }
}

impl Task {
    pub fn awaiter(&self) -> TaskAwaiter {
        TaskAwaiter::new(self.clone())
    }
}

/// Completes the task returned by a generated async method.
#[derive(Debug, Clone, Default)]
pub struct AsyncTaskMethodBuilder {
    task: Option<Task>,
}

impl AsyncTaskMethodBuilder {
    pub fn create() -> Self {
        Self {
            task: Some(Task::create_pending()),
        }
    }

    /// The method's task. A builder made with `Default` hands out a task
    /// lazily on first use.
    pub fn task(&mut self) -> Task {
        self.task.get_or_insert_with(Task::create_pending).clone()
    }

    pub fn set_result(&mut self) {
        self.task().complete();
    }

    pub fn set_exception(&mut self, exception: Exception) {
        self.task().fault(exception);
    }

    /// Suspend the state machine on `awaiter`, resuming with `resume`.
    pub fn await_on_completed<F>(&mut self, awaiter: &TaskAwaiter, resume: F)
    where
        F: FnOnce() + Send + 'static,
    {
        awaiter.on_completed(resume);
    }
}
