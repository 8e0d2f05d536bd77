//! Object monitors: the runtime side of `lock`, `Monitor.Wait` and
//! `Monitor.Pulse`.
//!
//! Locks are reentrant and owned by the OS thread that entered them.
//! Blocks come from the process-wide [`SyncBlockTable`]; no table lock is
//! held while a monitor is entered or waited on.

use super::object::Monitored;
use super::sync_block::{SyncBlock, SyncBlockTable};
use crate::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

fn block_for<O: Monitored + ?Sized>(obj: &O) -> Arc<SyncBlock> {
    SyncBlockTable::global().get_or_create(obj.object_header())
}

/// Block of an object that has been locked before. Exit, wait and pulse
/// need one to be valid, so they never allocate.
fn existing_block<O: Monitored + ?Sized>(obj: &O) -> Result<Arc<SyncBlock>> {
    SyncBlockTable::global()
        .get(obj.object_header())
        .ok_or(Error::SynchronizationLock)
}

fn timeout_from_ms(timeout_ms: i32) -> Option<Duration> {
    u64::try_from(timeout_ms).ok().map(Duration::from_millis)
}

pub fn enter<O: Monitored + ?Sized>(obj: &O) {
    block_for(obj).enter();
}

/// Enter and set `lock_taken` once the lock is held.
///
/// `lock_taken` must be `false` on entry; the caller's cleanup only exits
/// when it reads `true`.
pub fn reliable_enter<O: Monitored + ?Sized>(obj: &O, lock_taken: &mut bool) {
    block_for(obj).enter();
    *lock_taken = true;
}

/// Try to enter within `timeout_ms`; a negative timeout waits forever.
pub fn try_enter<O: Monitored + ?Sized>(obj: &O, timeout_ms: i32) -> bool {
    block_for(obj).try_enter(timeout_from_ms(timeout_ms))
}

/// Fails with `SynchronizationLock` if the calling thread does not hold the
/// lock.
pub fn exit<O: Monitored + ?Sized>(obj: &O) -> Result<()> {
    existing_block(obj)?.exit()
}

pub fn is_entered<O: Monitored + ?Sized>(obj: &O) -> bool {
    existing_block(obj).is_ok_and(|block| block.is_held_by_current_thread())
}

/// Release the lock, wait for a pulse and re-acquire.
///
/// A negative `timeout_ms` waits indefinitely. Returns `true` if a pulse
/// woke the thread, `false` on timeout.
pub fn wait<O: Monitored + ?Sized>(obj: &O, timeout_ms: i32) -> Result<bool> {
    existing_block(obj)?.wait(timeout_from_ms(timeout_ms))
}

pub fn pulse<O: Monitored + ?Sized>(obj: &O) -> Result<()> {
    existing_block(obj)?.pulse()
}

pub fn pulse_all<O: Monitored + ?Sized>(obj: &O) -> Result<()> {
    existing_block(obj)?.pulse_all()
}

/// Scoped lock: enters on creation and exits on drop.
pub struct MonitorGuard {
    block: Arc<SyncBlock>,
}

impl MonitorGuard {
    pub fn wait(&self, timeout_ms: i32) -> Result<bool> {
        self.block.wait(timeout_from_ms(timeout_ms))
    }

    pub fn pulse(&self) -> Result<()> {
        self.block.pulse()
    }

    pub fn pulse_all(&self) -> Result<()> {
        self.block.pulse_all()
    }
}

impl Drop for MonitorGuard {
    fn drop(&mut self) {
        // entered in `lock` on this thread, so the exit cannot fail
        let _ = self.block.exit();
    }
}

impl std::fmt::Debug for MonitorGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorGuard").finish_non_exhaustive()
    }
}

pub fn lock<O: Monitored + ?Sized>(obj: &O) -> MonitorGuard {
    let block = block_for(obj);
    block.enter();
    MonitorGuard { block }
}
