// worker thread loop
use super::pool::Shared;
use super::work_item::WorkItem;
use log::{debug, trace};
use std::sync::Arc;
use std::time::Instant;

pub type WorkerId = usize;

pub(crate) struct Worker {
    pub id: WorkerId,
    shared: Arc<Shared>,
}

impl Worker {
    pub fn new(id: WorkerId, shared: Arc<Shared>) -> Self {
        Self { id, shared }
    }

    // main loop: drains the queue even after shutdown was requested
    pub fn run(self) {
        debug!("worker {} started", self.id);

        while let Some(item) = self.next_item() {
            self.execute(item);
        }

        debug!("worker {} exiting", self.id);
    }

    fn next_item(&self) -> Option<WorkItem> {
        let mut queue = self.shared.queue.lock();
        loop {
            if let Some(item) = queue.items.pop_front() {
                return Some(item);
            }
            if queue.shutdown {
                return None;
            }
            self.shared.available.wait(&mut queue);
        }
    }

    fn execute(&self, item: WorkItem) {
        let id = item.id;
        trace!(
            "worker {} running {:?} after {:?} in queue",
            self.id,
            id,
            item.queued_at.elapsed()
        );

        let start = Instant::now();
        let result = self
            .shared
            .panic_handler
            .execute("thread pool work item", || item.execute());
        let duration_ns = start.elapsed().as_nanos() as u64;

        if result.is_err() {
            self.shared.metrics.record_panic();
        }
        self.shared.metrics.record_execution(duration_ns);
    }
}
