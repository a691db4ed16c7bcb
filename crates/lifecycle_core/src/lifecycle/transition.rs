use crate::error::{LifecycleError, Result};

use super::event::{BEFORE_DESTROY_EVENT, BEFORE_INIT_EVENT, BEFORE_START_EVENT, BEFORE_STOP_EVENT};
use super::LifecycleState;

/// The four public phase operations.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Phase {
    Init,
    Start,
    Stop,
    Destroy,
}

impl Phase {
    pub const fn label(self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Start => "start",
            Phase::Stop => "stop",
            Phase::Destroy => "destroy",
        }
    }

    /// Identifier named when this phase is refused.
    pub const fn before_event(self) -> &'static str {
        match self {
            Phase::Init => BEFORE_INIT_EVENT,
            Phase::Start => BEFORE_START_EVENT,
            Phase::Stop => BEFORE_STOP_EVENT,
            Phase::Destroy => BEFORE_DESTROY_EVENT,
        }
    }
}

pub const ALL_PHASES: [Phase; 4] = [Phase::Init, Phase::Start, Phase::Stop, Phase::Destroy];

/// How a phase operation treats the state it finds the component in.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Entry {
    /// Run the phase from here.
    Proceed,
    /// Already in progress or done: return silently.
    Skip,
    /// Run another phase first, then re-evaluate.
    Prepare(Phase),
    /// Never started anything: record STOPPED without running a hook.
    MarkStopped,
    /// Invalid transition.
    Reject,
}

/// Entry table for the phase operations.
///
/// `Prepare` on re-evaluation means the preparation did not move the
/// component; only `destroy` tolerates that (cleanup failures are swallowed).
pub fn phase_entry(phase: Phase, state: LifecycleState) -> Entry {
    use LifecycleState::*;

    match (phase, state) {
        (Phase::Init, New) => Entry::Proceed,

        (Phase::Start, StartingPrep | Starting | Started) => Entry::Skip,
        (Phase::Start, New) => Entry::Prepare(Phase::Init),
        (Phase::Start, Failed) => Entry::Prepare(Phase::Stop),
        (Phase::Start, Initialized | Stopped) => Entry::Proceed,

        (Phase::Stop, StoppingPrep | Stopping | Stopped) => Entry::Skip,
        (Phase::Stop, New) => Entry::MarkStopped,
        (Phase::Stop, Started | Failed) => Entry::Proceed,

        (Phase::Destroy, Destroying | Destroyed) => Entry::Skip,
        (Phase::Destroy, Failed) => Entry::Prepare(Phase::Stop),
        (Phase::Destroy, Stopped | New | Initialized) => Entry::Proceed,

        _ => Entry::Reject,
    }
}

/// Phases that do real work from `state` (neither refused nor a silent no-op).
pub fn available_phases(state: LifecycleState) -> Vec<Phase> {
    ALL_PHASES
        .into_iter()
        .filter(|phase| {
            matches!(
                phase_entry(*phase, state),
                Entry::Proceed | Entry::Prepare(_) | Entry::MarkStopped
            )
        })
        .collect()
}

/// The only writes hooks and listeners may perform through `set_state`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GuardedWrite {
    /// Any state may be marked failed.
    AnyToFailed,
    StartingPrepToStarting,
    StoppingPrepToStopping,
    /// A failed component is being stopped for cleanup.
    FailedToStopping,
}

pub const GUARDED_WRITES: [GuardedWrite; 4] = [
    GuardedWrite::AnyToFailed,
    GuardedWrite::StartingPrepToStarting,
    GuardedWrite::StoppingPrepToStopping,
    GuardedWrite::FailedToStopping,
];

impl GuardedWrite {
    pub const fn permits(self, from: LifecycleState, to: LifecycleState) -> bool {
        use LifecycleState::*;

        match self {
            GuardedWrite::AnyToFailed => matches!(to, Failed),
            GuardedWrite::StartingPrepToStarting => matches!((from, to), (StartingPrep, Starting)),
            GuardedWrite::StoppingPrepToStopping => matches!((from, to), (StoppingPrep, Stopping)),
            GuardedWrite::FailedToStopping => matches!((from, to), (Failed, Stopping)),
        }
    }
}

/// Check a hook/listener-initiated write against [`GUARDED_WRITES`].
pub fn check_guarded_write(from: LifecycleState, to: LifecycleState) -> Result<GuardedWrite> {
    GUARDED_WRITES
        .into_iter()
        .find(|rule| rule.permits(from, to))
        .ok_or_else(|| LifecycleError::invalid_transition(from, to.label()))
}
