//! Callable objects handed over by generated code.
//!
//! A delegate is either a static callable taking no arguments or a method
//! bound to a target object. Arity and binding are carried by the type, so
//! invoking one never needs a function-pointer cast.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

type Target = dyn Any + Send + Sync;

#[derive(Clone)]
pub enum Delegate {
    Static(Arc<dyn Fn() + Send + Sync>),
    Bound {
        target: Arc<Target>,
        method: Arc<dyn Fn(&Target) + Send + Sync>,
    },
}

impl Delegate {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Delegate::Static(Arc::new(f))
    }

    /// Bind `method` to `target`; invoking the delegate calls `method(&target)`.
    pub fn bind<T>(target: Arc<T>, method: fn(&T)) -> Self
    where
        T: Any + Send + Sync,
    {
        Delegate::Bound {
            target,
            method: Arc::new(move |target: &Target| {
                if let Some(target) = target.downcast_ref::<T>() {
                    method(target);
                }
            }),
        }
    }

    pub fn has_target(&self) -> bool {
        matches!(self, Delegate::Bound { .. })
    }

    pub fn target(&self) -> Option<&Arc<Target>> {
        match self {
            Delegate::Static(_) => None,
            Delegate::Bound { target, .. } => Some(target),
        }
    }

    pub fn invoke(&self) {
        match self {
            Delegate::Static(f) => f(),
            Delegate::Bound { target, method } => method(target.as_ref()),
        }
    }
}

impl<F> From<F> for Delegate
where
    F: Fn() + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Delegate::from_fn(f)
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delegate::Static(_) => f.write_str("Delegate::Static"),
            Delegate::Bound { .. } => f.write_str("Delegate::Bound"),
        }
    }
}
