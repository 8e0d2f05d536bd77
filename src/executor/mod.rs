//! Work execution infrastructure.
//!
//! The fixed-size thread pool, its worker loop, queued work items and the
//! panic boundary every unit of work runs behind.

pub mod panic_handler;
pub mod pool;
pub mod work_item;
pub mod worker;

pub use panic_handler::{PanicHandler, PanicStrategy};
pub use pool::ThreadPool;
pub use work_item::WorkItemId;

pub(crate) use work_item::WorkItem;
