use std::fmt;

use super::event::{
    AFTER_DESTROY_EVENT, AFTER_INIT_EVENT, AFTER_START_EVENT, AFTER_STOP_EVENT,
    BEFORE_DESTROY_EVENT, BEFORE_INIT_EVENT, BEFORE_START_EVENT, BEFORE_STOP_EVENT,
};

/// The twelve lifecycle states of a managed component.
///
/// Stable states:
/// - New, Initialized, Started, Stopped, Destroyed, Failed
///
/// Transient states (entered while a phase is running):
/// - Initializing, StartingPrep, Starting, StoppingPrep, Stopping, Destroying
///
/// `New` is the only initial state. `Destroyed` is terminal; `Failed` is not
/// (a failed component may still be stopped or destroyed).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum LifecycleState {
    New,
    Initializing,
    Initialized,
    StartingPrep,
    Starting,
    Started,
    StoppingPrep,
    Stopping,
    Stopped,
    Destroying,
    Destroyed,
    Failed,
}

/// Compact ids, stable across versions. Also the engine's atomic representation.
impl LifecycleState {
    pub const fn id(self) -> u8 {
        match self {
            LifecycleState::New => 0,
            LifecycleState::Initializing => 1,
            LifecycleState::Initialized => 2,
            LifecycleState::StartingPrep => 3,
            LifecycleState::Starting => 4,
            LifecycleState::Started => 5,
            LifecycleState::StoppingPrep => 6,
            LifecycleState::Stopping => 7,
            LifecycleState::Stopped => 8,
            LifecycleState::Destroying => 9,
            LifecycleState::Destroyed => 10,
            LifecycleState::Failed => 11,
        }
    }

    pub const fn from_id(id: u8) -> Option<Self> {
        if (id as usize) < ALL_STATES.len() {
            Some(ALL_STATES[id as usize])
        } else {
            None
        }
    }

    /// Event identifier fired automatically whenever the engine enters this state.
    ///
    /// `New`, `Starting`, `Stopping` and `Failed` are silent.
    pub const fn lifecycle_event(self) -> Option<&'static str> {
        match self {
            LifecycleState::Initializing => Some(BEFORE_INIT_EVENT),
            LifecycleState::Initialized => Some(AFTER_INIT_EVENT),
            LifecycleState::StartingPrep => Some(BEFORE_START_EVENT),
            LifecycleState::Started => Some(AFTER_START_EVENT),
            LifecycleState::StoppingPrep => Some(BEFORE_STOP_EVENT),
            LifecycleState::Stopped => Some(AFTER_STOP_EVENT),
            LifecycleState::Destroying => Some(BEFORE_DESTROY_EVENT),
            LifecycleState::Destroyed => Some(AFTER_DESTROY_EVENT),
            LifecycleState::New
            | LifecycleState::Starting
            | LifecycleState::Stopping
            | LifecycleState::Failed => None,
        }
    }

    /// True while the component may serve requests.
    pub const fn is_available(self) -> bool {
        matches!(
            self,
            LifecycleState::Starting | LifecycleState::Started | LifecycleState::StoppingPrep
        )
    }

    /// Stable, human-readable label (what `state_name()` reports).
    pub const fn label(self) -> &'static str {
        match self {
            LifecycleState::New => "NEW",
            LifecycleState::Initializing => "INITIALIZING",
            LifecycleState::Initialized => "INITIALIZED",
            LifecycleState::StartingPrep => "STARTING_PREP",
            LifecycleState::Starting => "STARTING",
            LifecycleState::Started => "STARTED",
            LifecycleState::StoppingPrep => "STOPPING_PREP",
            LifecycleState::Stopping => "STOPPING",
            LifecycleState::Stopped => "STOPPED",
            LifecycleState::Destroying => "DESTROYING",
            LifecycleState::Destroyed => "DESTROYED",
            LifecycleState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Canonical list of all lifecycle states, indexed by `id()`.
pub const ALL_STATES: [LifecycleState; 12] = [
    LifecycleState::New,
    LifecycleState::Initializing,
    LifecycleState::Initialized,
    LifecycleState::StartingPrep,
    LifecycleState::Starting,
    LifecycleState::Started,
    LifecycleState::StoppingPrep,
    LifecycleState::Stopping,
    LifecycleState::Stopped,
    LifecycleState::Destroying,
    LifecycleState::Destroyed,
    LifecycleState::Failed,
];
