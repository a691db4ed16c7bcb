use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::event::{EventData, LifecycleEvent};
use super::Lifecycle;

/// Observer of lifecycle events.
///
/// Called synchronously on the thread that fired the event. Implementations
/// should return promptly; a panic propagates to whoever fired the event.
pub trait LifecycleListener: Send + Sync {
    fn lifecycle_event(&self, event: &LifecycleEvent<'_>);
}

impl<F> LifecycleListener for F
where
    F: Fn(&LifecycleEvent<'_>) + Send + Sync,
{
    fn lifecycle_event(&self, event: &LifecycleEvent<'_>) {
        self(event)
    }
}

/// Wrap a closure as a shareable listener handle.
///
/// Keep the returned handle to remove the listener later.
pub fn listener_fn<F>(f: F) -> Arc<dyn LifecycleListener>
where
    F: Fn(&LifecycleEvent<'_>) + Send + Sync + 'static,
{
    Arc::new(f)
}

type Listeners = Arc<[Arc<dyn LifecycleListener>]>;

/// Ordered listener registry with copy-on-write snapshots.
///
/// - add/remove swap in a new snapshot under a short lock
/// - firing clones the current snapshot and dispatches without holding the lock,
///   so registrations made during a firing only affect later firings
pub struct LifecycleSupport {
    listeners: Mutex<Listeners>,
}

impl LifecycleSupport {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Arc::from(Vec::new())),
        }
    }

    /// Append `listener`. The same handle may be registered more than once.
    pub fn add(&self, listener: Arc<dyn LifecycleListener>) {
        let mut guard = self.listeners.lock();
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(listener);
        *guard = Arc::from(next);
    }

    /// Remove the first registration of `listener` (by handle identity).
    pub fn remove(&self, listener: &Arc<dyn LifecycleListener>) {
        let mut guard = self.listeners.lock();
        let Some(idx) = guard.iter().position(|l| Arc::ptr_eq(l, listener)) else {
            return;
        };

        let next: Vec<_> = guard
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, l)| Arc::clone(l))
            .collect();
        *guard = Arc::from(next);
    }

    /// Point-in-time snapshot of registered listeners, in registration order.
    pub fn listeners(&self) -> Vec<Arc<dyn LifecycleListener>> {
        self.snapshot().to_vec()
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build an event and hand it to every listener registered right now, in order.
    pub fn fire(&self, source: &dyn Lifecycle, kind: &str, data: Option<&EventData>) {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return;
        }

        let event = LifecycleEvent::new(source, kind, data);
        for listener in snapshot.iter() {
            listener.lifecycle_event(&event);
        }
    }

    fn snapshot(&self) -> Listeners {
        Arc::clone(&self.listeners.lock())
    }
}

impl Default for LifecycleSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LifecycleSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleSupport")
            .field("listeners", &self.len())
            .finish()
    }
}
