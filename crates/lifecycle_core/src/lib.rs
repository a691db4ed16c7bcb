//! lifecycle_core: a reusable component lifecycle state machine.
//!
//! Design goals:
//! - One engine per component; it alone writes the component's state.
//! - Legal transitions live in explicit tables, not scattered conditionals.
//! - Event dispatch is synchronous and ordered with respect to the state change.

pub mod error;

/// Lifecycle states, phase operations, events and listeners.
pub mod lifecycle;

pub use error::{HookError, HookResult, LifecycleError, Result};
pub use lifecycle::{
    Component, Lifecycle, LifecycleEngine, LifecycleEvent, LifecycleListener, LifecycleState,
};
