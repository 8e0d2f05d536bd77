//! Cooperative cancellation.
//!
//! A [`CancellationTokenSource`] moves from active to canceled at most once.
//! Disposing a source makes it inert: it can no longer become canceled, but a
//! cancellation observed before disposal is still reported.

use crate::error::{Error, Result};
use crate::runtime;
use log::trace;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

const CANCELED: u8 = 0b01;
const DISPOSED: u8 = 0b10;

/// Observable state of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationState {
    Active,
    Canceled,
    Disposed,
}

type Registration = Box<dyn FnOnce() + Send + 'static>;

struct SourceInner {
    flags: AtomicU8,
    registrations: Mutex<Vec<Registration>>,
}

#[derive(Clone)]
pub struct CancellationTokenSource {
    inner: Arc<SourceInner>,
}

impl CancellationTokenSource {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SourceInner {
                flags: AtomicU8::new(0),
                registrations: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Signal cancellation. Only the first call on an active source has an
    /// effect; it runs the token registrations on the calling thread.
    pub fn cancel(&self) {
        if self
            .inner
            .flags
            .compare_exchange(0, CANCELED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let registrations = std::mem::take(&mut *self.inner.registrations.lock());
        for callback in registrations {
            callback();
        }
    }

    /// Cancel after `ms` milliseconds without blocking. Negative delays are
    /// ignored.
    pub fn cancel_after(&self, ms: i64) -> Result<()> {
        if ms < 0 {
            return Ok(());
        }
        trace!("cancellation scheduled in {} ms", ms);
        let source = self.clone();
        runtime::schedule_after(Duration::from_millis(ms as u64), move || source.cancel())
    }

    /// Make the source inert. Pending registrations are dropped unrun.
    pub fn dispose(&self) {
        self.inner.flags.fetch_or(DISPOSED, Ordering::AcqRel);
        self.inner.registrations.lock().clear();
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.inner.flags.load(Ordering::Acquire) & CANCELED != 0
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.flags.load(Ordering::Acquire) & DISPOSED != 0
    }

    pub fn state(&self) -> CancellationState {
        let flags = self.inner.flags.load(Ordering::Acquire);
        if flags & DISPOSED != 0 {
            CancellationState::Disposed
        } else if flags & CANCELED != 0 {
            CancellationState::Canceled
        } else {
            CancellationState::Active
        }
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            source: Some(self.clone()),
        }
    }

    fn register(&self, callback: Registration) {
        {
            let mut registrations = self.inner.registrations.lock();
            let flags = self.inner.flags.load(Ordering::Acquire);
            if flags == 0 {
                registrations.push(callback);
                return;
            }
            if flags & CANCELED == 0 {
                // disposed without cancellation, never fires
                return;
            }
        }
        callback();
    }
}

impl Default for CancellationTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationTokenSource")
            .field("state", &self.state())
            .finish()
    }
}

pub fn create_source() -> CancellationTokenSource {
    CancellationTokenSource::new()
}

/// Token for an optional source; `None` yields a token that can never be
/// canceled.
pub fn get_token(source: Option<&CancellationTokenSource>) -> CancellationToken {
    source.map_or_else(CancellationToken::none, CancellationTokenSource::token)
}

/// Read-only view of a source's cancellation state.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    source: Option<CancellationTokenSource>,
}

impl CancellationToken {
    pub fn none() -> Self {
        Self { source: None }
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.source
            .as_ref()
            .is_some_and(CancellationTokenSource::is_cancellation_requested)
    }

    pub fn can_be_canceled(&self) -> bool {
        self.source.is_some()
    }

    pub fn throw_if_cancellation_requested(&self) -> Result<()> {
        if self.is_cancellation_requested() {
            Err(Error::OperationCanceled)
        } else {
            Ok(())
        }
    }

    /// Run `callback` once the source is canceled, immediately if it already
    /// is. Never runs for a token without a source.
    pub fn register<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(source) = &self.source {
            source.register(Box::new(callback));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_new_source_is_active() {
        let cts = create_source();
        assert_eq!(cts.state(), CancellationState::Active);
        assert!(!cts.is_cancellation_requested());
        assert!(cts.token().can_be_canceled());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let cts = create_source();
        let token = cts.token();
        cts.cancel();
        cts.cancel();
        assert!(token.is_cancellation_requested());
        assert_eq!(cts.state(), CancellationState::Canceled);
        assert!(matches!(
            token.throw_if_cancellation_requested(),
            Err(Error::OperationCanceled)
        ));
    }

    #[test]
    fn test_concurrent_cancel() {
        let cts = create_source();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        cts.token().register(move || {
            f.fetch_add(1, Ordering::SeqCst);
        });

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let cts = cts.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    cts.cancel();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert!(cts.is_cancellation_requested());
        cts.cancel();
        assert!(cts.is_cancellation_requested());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_none_token_never_cancels() {
        let token = CancellationToken::none();
        assert!(!token.can_be_canceled());
        assert!(!token.is_cancellation_requested());
        assert!(token.throw_if_cancellation_requested().is_ok());

        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        token.register(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        assert!(!get_token(None).can_be_canceled());
    }

    #[test]
    fn test_dispose_keeps_prior_cancellation() {
        let cts = create_source();
        cts.cancel();
        cts.dispose();
        assert!(cts.is_cancellation_requested());
        assert!(cts.is_disposed());
        assert_eq!(cts.state(), CancellationState::Disposed);
    }

    #[test]
    fn test_disposed_source_cannot_cancel() {
        let cts = create_source();
        let token = get_token(Some(&cts));
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        token.register(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });

        cts.dispose();
        cts.cancel();
        assert!(!token.is_cancellation_requested());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_register_after_cancel_runs_inline() {
        let cts = create_source();
        cts.cancel();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        cts.token().register(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_after() {
        let _guard = testing::exclusive();
        runtime::shutdown();

        let cts = create_source();
        let start = Instant::now();
        cts.cancel_after(40).unwrap();
        assert!(!cts.is_cancellation_requested());

        let deadline = start + Duration::from_secs(5);
        while !cts.is_cancellation_requested() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(cts.is_cancellation_requested());
        assert!(start.elapsed() >= Duration::from_millis(35));
    }

    #[test]
    fn test_cancel_after_negative_is_noop() {
        let cts = create_source();
        cts.cancel_after(-1).unwrap();
        thread::sleep(Duration::from_millis(10));
        assert!(!cts.is_cancellation_requested());
    }
}
