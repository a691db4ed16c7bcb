//! Lifecycle event identifiers and the event object handed to listeners.
//!
//! Identifier values are part of the public contract: listeners match on
//! them, so they never change between versions.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::Lifecycle;

pub const BEFORE_INIT_EVENT: &str = "before_init";
pub const AFTER_INIT_EVENT: &str = "after_init";
pub const BEFORE_START_EVENT: &str = "before_start";
/// Prep-to-active marker for the start phase. Not fired automatically.
pub const START_EVENT: &str = "start";
pub const AFTER_START_EVENT: &str = "after_start";
pub const BEFORE_STOP_EVENT: &str = "before_stop";
/// Prep-to-active marker for the stop phase. Not fired automatically.
pub const STOP_EVENT: &str = "stop";
pub const AFTER_STOP_EVENT: &str = "after_stop";
pub const BEFORE_DESTROY_EVENT: &str = "before_destroy";
pub const AFTER_DESTROY_EVENT: &str = "after_destroy";

// Fired by components themselves, never by the engine.
pub const PERIODIC_EVENT: &str = "periodic";
pub const CONFIGURE_START_EVENT: &str = "configure_start";
pub const CONFIGURE_STOP_EVENT: &str = "configure_stop";

/// Opaque payload attached to an event.
pub type EventData = Arc<dyn Any + Send + Sync>;

/// One firing of a lifecycle event.
///
/// Built fresh for each dispatch and borrowed by every listener; nothing keeps
/// it afterwards, so it only borrows its source.
#[derive(Clone, Copy)]
pub struct LifecycleEvent<'a> {
    lifecycle: &'a dyn Lifecycle,
    kind: &'a str,
    data: Option<&'a EventData>,
}

impl<'a> LifecycleEvent<'a> {
    pub fn new(lifecycle: &'a dyn Lifecycle, kind: &'a str, data: Option<&'a EventData>) -> Self {
        Self {
            lifecycle,
            kind,
            data,
        }
    }

    /// The component on which this event occurred.
    pub fn lifecycle(&self) -> &'a dyn Lifecycle {
        self.lifecycle
    }

    pub fn kind(&self) -> &'a str {
        self.kind
    }

    pub fn data(&self) -> Option<&'a EventData> {
        self.data
    }

    /// Payload downcast to a concrete type.
    pub fn data_as<T: Any>(&self) -> Option<&'a T> {
        self.data.and_then(|data| data.downcast_ref::<T>())
    }
}

impl fmt::Debug for LifecycleEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleEvent")
            .field("kind", &self.kind)
            .field("state", &self.lifecycle.state())
            .field("has_data", &self.data.is_some())
            .finish()
    }
}
