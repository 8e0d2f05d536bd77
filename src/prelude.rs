pub use crate::cancellation::{CancellationToken, CancellationTokenSource};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::delegate::Delegate;
pub use crate::error::{Error, Result};
pub use crate::exception::{Exception, ExceptionKind};
pub use crate::sync::{interlocked, monitor, Monitored, ObjectHeader};
pub use crate::task::{
    delay, run, run_delegate, run_fallible, when_all, when_any, Task, TaskCompletionSource,
    TaskStatus,
};
pub use crate::thread::ManagedThread;
pub use crate::{init, init_with_config, shutdown};

#[cfg(feature = "telemetry")]
pub use crate::telemetry::{Metrics, MetricsSnapshot};
