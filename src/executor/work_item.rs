//! Units of work queued on the thread pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static WORK_ITEM_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkItemId(u64);

impl WorkItemId {
    fn next() -> Self {
        WorkItemId(WORK_ITEM_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

pub(crate) struct WorkItem {
    pub(crate) id: WorkItemId,
    func: Box<dyn FnOnce() + Send + 'static>,
    pub(crate) queued_at: Instant,
}

impl WorkItem {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        WorkItem {
            id: WorkItemId::next(),
            func: Box::new(f),
            queued_at: Instant::now(),
        }
    }

    /// Function-plus-state form used by generated code.
    pub fn with_state<S>(func: fn(S), state: S) -> Self
    where
        S: Send + 'static,
    {
        Self::new(move || func(state))
    }

    pub fn execute(self) {
        (self.func)();
    }
}

impl std::fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItem")
            .field("id", &self.id)
            .field("queued_at", &self.queued_at)
            .finish()
    }
}
