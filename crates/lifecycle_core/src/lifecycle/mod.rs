//! lifecycle_core::lifecycle
//!
//! Component lifecycle: twelve states, four phase operations, synchronous events.
//!
//! Key ideas:
//! - Phase operations (`init`, `start`, `stop`, `destroy`) consult one entry table
//! - Hooks advance prep -> active themselves through the guarded `set_state`
//! - A hook error marks the component FAILED before it is returned (init excepted)
//! - Every state with an event identifier fires it to listeners, in registration order

mod engine;
mod event;
mod gate;
mod state;
mod support;
mod transition;

pub use engine::{Component, Lifecycle, LifecycleEngine};
pub use event::{
    EventData, LifecycleEvent, AFTER_DESTROY_EVENT, AFTER_INIT_EVENT, AFTER_START_EVENT,
    AFTER_STOP_EVENT, BEFORE_DESTROY_EVENT, BEFORE_INIT_EVENT, BEFORE_START_EVENT,
    BEFORE_STOP_EVENT, CONFIGURE_START_EVENT, CONFIGURE_STOP_EVENT, PERIODIC_EVENT, START_EVENT,
    STOP_EVENT,
};
pub use gate::ActivationGate;
pub use state::{LifecycleState, ALL_STATES};
pub use support::{listener_fn, LifecycleListener, LifecycleSupport};
pub use transition::{
    available_phases, check_guarded_write, phase_entry, Entry, GuardedWrite, Phase, ALL_PHASES,
    GUARDED_WRITES,
};
