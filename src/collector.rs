//! Hooks into the host allocator / garbage collector.
//!
//! A conservative collector has to scan the stack of every thread that can
//! hold managed references, so every OS thread this crate spawns registers
//! itself on entry and unregisters on exit. The registry is process-wide
//! and defaults to a no-op.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Thread (un)registration interface offered by the collector.
pub trait ThreadRegistry: Send + Sync {
    fn register_thread(&self);
    fn unregister_thread(&self);
}

#[derive(Debug, Default)]
struct NoopRegistry;

impl ThreadRegistry for NoopRegistry {
    fn register_thread(&self) {}
    fn unregister_thread(&self) {}
}

static REGISTRY: RwLock<Option<Arc<dyn ThreadRegistry>>> = RwLock::new(None);

/// Install the collector's registry. Threads already registered keep the
/// registry they registered with.
pub fn set_thread_registry(registry: Arc<dyn ThreadRegistry>) {
    *REGISTRY.write() = Some(registry);
}

/// Restore the no-op registry.
pub fn clear_thread_registry() {
    *REGISTRY.write() = None;
}

fn current_registry() -> Arc<dyn ThreadRegistry> {
    REGISTRY
        .read()
        .clone()
        .unwrap_or_else(|| Arc::new(NoopRegistry))
}

/// Registration of the current thread; unregisters on drop.
///
/// Not `Send`: it must be dropped on the thread that created it.
pub struct ThreadRegistration {
    registry: Arc<dyn ThreadRegistry>,
    _not_send: PhantomData<*const ()>,
}

impl ThreadRegistration {
    pub fn register() -> Self {
        let registry = current_registry();
        registry.register_thread();
        Self {
            registry,
            _not_send: PhantomData,
        }
    }
}

impl Drop for ThreadRegistration {
    fn drop(&mut self) {
        self.registry.unregister_thread();
    }
}

impl std::fmt::Debug for ThreadRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadRegistration").finish_non_exhaustive()
    }
}

/// Spawn an OS thread that is registered with the collector for its whole
/// lifetime.
pub(crate) fn spawn_registered<F>(
    name: Option<String>,
    stack_size: Option<usize>,
    f: F,
) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    spawn_registered_with_exit(name, stack_size, f, || {})
}

/// Like [`spawn_registered`], running `on_exit` on the new thread after it
/// has unregistered.
pub(crate) fn spawn_registered_with_exit<F, E>(
    name: Option<String>,
    stack_size: Option<usize>,
    f: F,
    on_exit: E,
) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
    E: FnOnce() + Send + 'static,
{
    let mut builder = thread::Builder::new();
    if let Some(name) = name {
        builder = builder.name(name);
    }
    if let Some(stack_size) = stack_size {
        builder = builder.stack_size(stack_size);
    }

    builder
        .spawn(move || {
            {
                let _registration = ThreadRegistration::register();
                f();
            }
            on_exit();
        })
        .map_err(|e| Error::thread_spawn(e.to_string()))
}
