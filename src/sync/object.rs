use std::sync::atomic::{AtomicU32, Ordering};

/// The part of a managed object's header the runtime synchronizes on.
///
/// `sync_block` holds an index into the sync block table; `0` means no block
/// has been assigned yet.
#[derive(Debug, Default)]
pub struct ObjectHeader {
    sync_block: AtomicU32,
}

impl ObjectHeader {
    pub const fn new() -> Self {
        Self {
            sync_block: AtomicU32::new(0),
        }
    }

    pub fn sync_block_index(&self) -> u32 {
        self.sync_block.load(Ordering::Acquire)
    }

    pub(crate) fn slot(&self) -> &AtomicU32 {
        &self.sync_block
    }
}

/// Anything that can be the target of a `lock` statement.
pub trait Monitored {
    fn object_header(&self) -> &ObjectHeader;
}

impl Monitored for ObjectHeader {
    fn object_header(&self) -> &ObjectHeader {
        self
    }
}

impl<T: Monitored + ?Sized> Monitored for std::sync::Arc<T> {
    fn object_header(&self) -> &ObjectHeader {
        (**self).object_header()
    }
}
