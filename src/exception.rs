//! Opaque exception handles.
//!
//! The runtime never unwinds on behalf of managed code. It only creates and
//! stores handles: a faulted [`Task`](crate::task::Task) keeps one, and
//! [`Error`] values convert into one when they have to be surfaced as data.

use crate::error::Error;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Broad category of an exception handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    OperationCanceled,
    NullReference,
    InvalidOperation,
    SynchronizationLock,
    /// A panic caught at a work item or thread boundary.
    Unhandled,
    /// Raised by user code.
    Application,
}

struct ExceptionInner {
    kind: ExceptionKind,
    message: String,
}

/// Cheap-to-clone handle to an exception object.
///
/// Two handles compare equal only if they refer to the same exception.
#[derive(Clone)]
pub struct Exception {
    inner: Arc<ExceptionInner>,
}

impl Exception {
    pub fn new<S: Into<String>>(kind: ExceptionKind, message: S) -> Self {
        Self {
            inner: Arc::new(ExceptionInner {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn application<S: Into<String>>(message: S) -> Self {
        Self::new(ExceptionKind::Application, message)
    }

    pub fn operation_canceled() -> Self {
        Self::new(ExceptionKind::OperationCanceled, "The operation was canceled.")
    }

    /// Build a handle from a caught panic payload.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        Self::new(ExceptionKind::Unhandled, message)
    }

    pub fn kind(&self) -> ExceptionKind {
        self.inner.kind
    }

    pub fn message(&self) -> &str {
        &self.inner.message
    }

    pub fn is_cancellation(&self) -> bool {
        self.inner.kind == ExceptionKind::OperationCanceled
    }

    pub fn ptr_eq(&self, other: &Exception) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Exception {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Exception {}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exception")
            .field("kind", &self.inner.kind)
            .field("message", &self.inner.message)
            .finish()
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.inner.kind, self.inner.message)
    }
}

impl std::error::Error for Exception {}

impl From<Error> for Exception {
    fn from(err: Error) -> Self {
        let kind = match err {
            Error::NullReference => ExceptionKind::NullReference,
            Error::OperationCanceled => ExceptionKind::OperationCanceled,
            Error::SynchronizationLock => ExceptionKind::SynchronizationLock,
            Error::InvalidOperation(_) | Error::NotInitialized => ExceptionKind::InvalidOperation,
            _ => ExceptionKind::Application,
        };
        Exception::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_equality() {
        let a = Exception::application("boom");
        let b = a.clone();
        let c = Exception::application("boom");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_from_panic_payload() {
        let payload: Box<dyn Any + Send> = Box::new("bad state");
        let ex = Exception::from_panic(payload.as_ref());
        assert_eq!(ex.kind(), ExceptionKind::Unhandled);
        assert_eq!(ex.message(), "bad state");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(Exception::from_panic(payload.as_ref()).message(), "owned");

        let payload: Box<dyn Any + Send> = Box::new(17u32);
        assert_eq!(Exception::from_panic(payload.as_ref()).message(), "Unknown panic");
    }

    #[test]
    fn test_from_error() {
        let ex: Exception = Error::OperationCanceled.into();
        assert!(ex.is_cancellation());

        let ex: Exception = Error::SynchronizationLock.into();
        assert_eq!(ex.kind(), ExceptionKind::SynchronizationLock);
    }
}
