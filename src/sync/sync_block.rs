//! Sync blocks and the table that maps objects to them.
//!
//! A sync block is a reentrant lock plus a condition variable with monitor
//! semantics. Blocks are created lazily the first time an object is locked
//! or waited on; the block index is published on the object header with a
//! compare-and-swap from the value observed, so racing creators agree on a
//! single winner and the losers throw their block away.

use super::object::ObjectHeader;
use crate::error::{Error, Result};
use crate::util::CachePadded;
use log::trace;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Waiter {
    ticket: u64,
    signaled: bool,
}

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    recursion: usize,
    /// Threads blocked in `wait`, oldest first.
    waiters: VecDeque<Waiter>,
    next_ticket: u64,
}

impl LockState {
    fn enqueue_waiter(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.waiters.push_back(Waiter {
            ticket,
            signaled: false,
        });
        ticket
    }

    fn is_signaled(&self, ticket: u64) -> bool {
        self.waiters
            .iter()
            .any(|w| w.ticket == ticket && w.signaled)
    }

    /// Remove the waiter, reporting whether a pulse reached it.
    fn dequeue_waiter(&mut self, ticket: u64) -> bool {
        match self.waiters.iter().position(|w| w.ticket == ticket) {
            Some(pos) => self.waiters.remove(pos).is_some_and(|w| w.signaled),
            None => false,
        }
    }
}

/// Reentrant lock and condition variable backing one object's monitor.
#[derive(Debug, Default)]
pub struct SyncBlock {
    state: Mutex<LockState>,
    released: Condvar,
    pulsed: Condvar,
}

impl SyncBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) {
        let me = thread::current().id();
        let mut st = self.state.lock();
        if st.owner == Some(me) {
            st.recursion += 1;
            return;
        }
        while st.owner.is_some() {
            self.released.wait(&mut st);
        }
        st.owner = Some(me);
        st.recursion = 1;
    }

    /// Try to acquire within `timeout`; `None` blocks indefinitely.
    pub fn try_enter(&self, timeout: Option<Duration>) -> bool {
        let me = thread::current().id();
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut st = self.state.lock();
        if st.owner == Some(me) {
            st.recursion += 1;
            return true;
        }
        while st.owner.is_some() {
            match deadline {
                Some(deadline) => {
                    if self.released.wait_until(&mut st, deadline).timed_out() && st.owner.is_some() {
                        return false;
                    }
                }
                None => self.released.wait(&mut st),
            }
        }
        st.owner = Some(me);
        st.recursion = 1;
        true
    }

    pub fn exit(&self) -> Result<()> {
        let mut st = self.state.lock();
        if st.owner != Some(thread::current().id()) {
            return Err(Error::SynchronizationLock);
        }
        st.recursion -= 1;
        if st.recursion == 0 {
            st.owner = None;
            self.released.notify_one();
        }
        Ok(())
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.state.lock().owner == Some(thread::current().id())
    }

    /// Release the lock completely, wait for a pulse, then re-acquire the lock
    /// with the recursion count it had.
    ///
    /// Returns `true` if woken by a pulse and `false` if `timeout` expired.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<bool> {
        let me = thread::current().id();
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut st = self.state.lock();
        if st.owner != Some(me) {
            return Err(Error::SynchronizationLock);
        }

        let saved = st.recursion;
        st.owner = None;
        st.recursion = 0;
        let ticket = st.enqueue_waiter();
        self.released.notify_one();

        // only pulses sent after this ticket was issued can reach it
        while !st.is_signaled(ticket) {
            match deadline {
                Some(deadline) => {
                    if self.pulsed.wait_until(&mut st, deadline).timed_out() {
                        break;
                    }
                }
                None => self.pulsed.wait(&mut st),
            }
        }
        let signaled = st.dequeue_waiter(ticket);

        while st.owner.is_some() {
            self.released.wait(&mut st);
        }
        st.owner = Some(me);
        st.recursion = saved;

        Ok(signaled)
    }

    /// Wake the longest-waiting thread that has not been pulsed yet.
    pub fn pulse(&self) -> Result<()> {
        let mut st = self.state.lock();
        if st.owner != Some(thread::current().id()) {
            return Err(Error::SynchronizationLock);
        }
        if let Some(waiter) = st.waiters.iter_mut().find(|w| !w.signaled) {
            waiter.signaled = true;
            // waiters share one condvar; wake them all so the right one runs
            self.pulsed.notify_all();
        }
        Ok(())
    }

    /// Wake every thread waiting at the time of the call.
    pub fn pulse_all(&self) -> Result<()> {
        let mut st = self.state.lock();
        if st.owner != Some(thread::current().id()) {
            return Err(Error::SynchronizationLock);
        }
        if !st.waiters.is_empty() {
            for waiter in st.waiters.iter_mut() {
                waiter.signaled = true;
            }
            self.pulsed.notify_all();
        }
        Ok(())
    }
}

const SHARD_COUNT: usize = 16;

type Shard = RwLock<HashMap<u32, Arc<SyncBlock>>>;

/// Index-addressed store of sync blocks, sharded by index.
///
/// Looking a block up takes a shard read lock only; the returned `Arc` is
/// used without holding any table lock.
#[derive(Debug)]
pub struct SyncBlockTable {
    shards: Vec<CachePadded<Shard>>,
    next_index: AtomicU32,
    live: AtomicUsize,
    allocated: AtomicU64,
}

impl SyncBlockTable {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT)
                .map(|_| CachePadded::new(RwLock::new(HashMap::new())))
                .collect(),
            next_index: AtomicU32::new(1),
            live: AtomicUsize::new(0),
            allocated: AtomicU64::new(0),
        }
    }

    /// The table used by the process-wide monitor functions.
    pub fn global() -> &'static SyncBlockTable {
        static TABLE: OnceLock<SyncBlockTable> = OnceLock::new();
        TABLE.get_or_init(SyncBlockTable::new)
    }

    fn shard(&self, index: u32) -> &Shard {
        &self.shards[index as usize % SHARD_COUNT]
    }

    fn lookup(&self, index: u32) -> Option<Arc<SyncBlock>> {
        self.shard(index).read().get(&index).cloned()
    }

    fn fresh_index(&self) -> u32 {
        loop {
            let index = self.next_index.fetch_add(1, Ordering::Relaxed);
            // 0 is the "unassigned" marker; skip it after wrap-around
            if index != 0 {
                return index;
            }
        }
    }

    fn allocate(&self) -> (u32, Arc<SyncBlock>) {
        let index = self.fresh_index();
        let block = Arc::new(SyncBlock::new());
        self.shard(index).write().insert(index, block.clone());
        self.live.fetch_add(1, Ordering::Relaxed);
        self.allocated.fetch_add(1, Ordering::Relaxed);
        (index, block)
    }

    fn remove(&self, index: u32) -> bool {
        let removed = self.shard(index).write().remove(&index).is_some();
        if removed {
            self.live.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Return the object's block, creating and publishing one if needed.
    ///
    /// Exactly one block is ever published per object: a creator that loses
    /// the publish race removes its own block and adopts the winner's.
    pub fn get_or_create(&self, header: &ObjectHeader) -> Arc<SyncBlock> {
        let slot = header.slot();
        let mut observed = slot.load(Ordering::Acquire);
        loop {
            if observed != 0 {
                if let Some(block) = self.lookup(observed) {
                    return block;
                }
            }

            let (index, block) = self.allocate();
            match slot.compare_exchange(observed, index, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return block,
                Err(actual) => {
                    trace!("sync block {} lost publish race to {}", index, actual);
                    self.remove(index);
                    observed = actual;
                }
            }
        }
    }

    /// The object's block if one was ever published. Never allocates.
    pub fn get(&self, header: &ObjectHeader) -> Option<Arc<SyncBlock>> {
        match header.slot().load(Ordering::Acquire) {
            0 => None,
            index => self.lookup(index),
        }
    }

    /// Drop the object's block, if any. Called by the collector once the
    /// object is unreachable; the object must not be locked or waited on.
    pub fn release(&self, header: &ObjectHeader) -> bool {
        match header.slot().swap(0, Ordering::AcqRel) {
            0 => false,
            index => self.remove(index),
        }
    }

    /// Blocks currently published or in flight.
    pub fn live_blocks(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    /// Blocks ever allocated, including race losers.
    pub fn total_allocated(&self) -> u64 {
        self.allocated.load(Ordering::Relaxed)
    }
}

impl Default for SyncBlockTable {
    fn default() -> Self {
        Self::new()
    }
}
