use std::sync::atomic::{AtomicBool, Ordering};

use super::event::{AFTER_START_EVENT, BEFORE_DESTROY_EVENT, BEFORE_STOP_EVENT};
use super::support::LifecycleListener;
use super::LifecycleEvent;

/// Activation gate for managed resources.
///
/// Register it as a listener on the component that owns the resources:
/// - turns on at `after_start`
/// - turns off at `before_stop` and `before_destroy`
///
/// Resource wrappers check `is_active()` to allow or block work.
#[derive(Debug)]
pub struct ActivationGate {
    active: AtomicBool,
}

impl ActivationGate {
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
        }
    }

    pub fn activate(&self) {
        self.active.store(true, Ordering::Release);
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Run `f` only while the gate is open.
    pub fn run_if_active<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        self.is_active().then(f)
    }
}

impl Default for ActivationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleListener for ActivationGate {
    fn lifecycle_event(&self, event: &LifecycleEvent<'_>) {
        match event.kind() {
            AFTER_START_EVENT => self.activate(),
            BEFORE_STOP_EVENT | BEFORE_DESTROY_EVENT => self.deactivate(),
            _ => {}
        }
    }
}
