//! Task-based asynchronous completion.
//!
//! [`Task`] is the state machine, [`TaskCompletionSource`] its producer
//! handle, and the combinators compose tasks by registering continuations.

pub mod awaiter;
pub mod combinators;
pub mod completion_source;
pub mod engine;

pub use self::awaiter::{AsyncTaskMethodBuilder, TaskAwaiter};
pub use self::combinators::{
    delay, run, run_delegate, run_fallible, when_all, when_any, when_any_indexed, AsTask, WhenAny,
};
pub use self::completion_source::TaskCompletionSource;
pub use self::engine::{Task, TaskId, TaskStatus};
