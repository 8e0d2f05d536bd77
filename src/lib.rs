//! strand-rt - concurrency substrate for ahead-of-time compiled managed code
//!
//! Generated method bodies call into this crate to create and await tasks,
//! take per-object monitors, update fields atomically, cancel cooperatively
//! and launch OS threads.
//!
//! # Quick Start
//!
//! ```no_run
//! use strand_rt::prelude::*;
//!
//! strand_rt::init(4).unwrap();
//!
//! let work: Vec<Task> = (0..8).map(|i| run(move || println!("item {}", i))).collect();
//! when_all(&work).wait();
//!
//! strand_rt::shutdown();
//! ```
//!
//! # Components
//!
//! - **Tasks**: exactly-once completion with continuations, plus the
//!   `when_all` / `when_any` / `delay` / `run` combinators
//! - **Thread pool**: fixed worker set draining one FIFO queue
//! - **Monitors**: lazily allocated, reentrant per-object locks with
//!   `wait` / `pulse`
//! - **Interlocked**: sequentially consistent atomic read-modify-write
//! - **Cancellation**: token sources with deferred cancel
//! - **Managed threads**: OS threads registered with the host collector
//! - **Telemetry**: pool metrics (optional)

#![warn(missing_debug_implementations)]

pub mod cancellation;
pub mod collector;
pub mod config;
pub mod delegate;
pub mod error;
pub mod exception;
pub mod executor;
pub mod prelude;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod telemetry;
pub mod thread;
pub mod util;

pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use exception::{Exception, ExceptionKind};
pub use runtime::{init, init_with_config, is_initialized, queue_delegate, queue_work, shutdown};
