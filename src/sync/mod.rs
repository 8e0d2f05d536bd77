//! Object monitors and interlocked atomics.

pub mod interlocked;
pub mod monitor;
pub mod object;
pub mod sync_block;

pub use monitor::MonitorGuard;
pub use object::{Monitored, ObjectHeader};
pub use sync_block::{SyncBlock, SyncBlockTable};
