use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use tracing::{debug, error, warn};

use crate::error::{log_error, HookError, HookResult, LifecycleError, Result};

use super::event::{EventData, AFTER_START_EVENT, AFTER_STOP_EVENT, BEFORE_STOP_EVENT};
use super::support::{LifecycleListener, LifecycleSupport};
use super::transition::{check_guarded_write, phase_entry, Entry, Phase};
use super::{LifecycleState, ALL_STATES};

/// Supervising API of a managed component.
///
/// Object safe: listeners receive the source as `&dyn Lifecycle` and
/// containers usually hold children as `Arc<dyn Lifecycle>`.
pub trait Lifecycle: Send + Sync {
    fn add_lifecycle_listener(&self, listener: Arc<dyn LifecycleListener>);

    /// Snapshot of the registered listeners, in registration order.
    fn find_lifecycle_listeners(&self) -> Vec<Arc<dyn LifecycleListener>>;

    fn remove_lifecycle_listener(&self, listener: &Arc<dyn LifecycleListener>);

    /// NEW -> INITIALIZING -> INITIALIZED.
    fn init(&self) -> Result<()>;

    /// (INITIALIZED | STOPPED) -> STARTING_PREP -> STARTING -> STARTED.
    ///
    /// Initializes a NEW component first and stops a FAILED one first.
    fn start(&self) -> Result<()>;

    /// STARTED -> STOPPING_PREP -> STOPPING -> STOPPED.
    ///
    /// A NEW component is simply marked STOPPED; a FAILED one is cleaned up
    /// without passing through STOPPING_PREP.
    fn stop(&self) -> Result<()>;

    /// (STOPPED | FAILED | NEW | INITIALIZED) -> DESTROYING -> DESTROYED.
    fn destroy(&self) -> Result<()>;

    /// Current state. Never blocks.
    fn state(&self) -> LifecycleState;

    fn state_name(&self) -> &'static str {
        self.state().label()
    }

    /// Guarded state write for hooks and listeners.
    ///
    /// Only the writes in [`GUARDED_WRITES`](super::GUARDED_WRITES) are
    /// accepted, and only while a phase operation is running.
    fn set_state(&self, state: LifecycleState) -> Result<()> {
        self.set_state_with(state, None)
    }

    /// [`set_state`](Lifecycle::set_state) with a payload for the fired event.
    fn set_state_with(&self, state: LifecycleState, data: Option<EventData>) -> Result<()>;

    /// Fire an arbitrary event to this component's listeners.
    fn fire_lifecycle_event(&self, kind: &str, data: Option<EventData>);
}

/// Hooks a concrete component provides to the engine.
///
/// Every hook receives the engine driving it, so it can advance the state
/// (`start_internal` must reach STARTING, `stop_internal` STOPPING) or fire
/// its own events.
pub trait Component: Send + Sync {
    /// Single-use components are destroyed as soon as they have been stopped.
    const SINGLE_USE: bool = false;

    /// Name used in log records.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn init_internal(&self, lifecycle: &dyn Lifecycle) -> HookResult;
    fn start_internal(&self, lifecycle: &dyn Lifecycle) -> HookResult;
    fn stop_internal(&self, lifecycle: &dyn Lifecycle) -> HookResult;
    fn destroy_internal(&self, lifecycle: &dyn Lifecycle) -> HookResult;
}

/// Lifecycle engine for one component instance.
///
/// - the state lives in an atomic so `state()` never waits on a running phase
/// - phase operations hold a reentrant lock for their whole duration, so
///   hooks and listeners may call back into the engine on the same thread
///   while other threads queue up behind the running phase
/// - the lock also counts how deep the current thread is in phase calls,
///   which is what restricts `set_state` to the hook/listener call stack
pub struct LifecycleEngine<C: Component> {
    component: C,
    state: AtomicU8,
    phase: ReentrantMutex<PhaseState>,
    support: LifecycleSupport,
}

/// Owned by whichever thread holds the phase lock.
#[derive(Default)]
struct PhaseState {
    depth: Cell<usize>,
    /// Payload of a guarded write to a silent state, handed to the next
    /// event the running phase fires.
    carried: Cell<Option<EventData>>,
}

/// Held for the duration of a phase operation.
struct PhaseGuard<'a> {
    phase: ReentrantMutexGuard<'a, PhaseState>,
}

impl<'a> PhaseGuard<'a> {
    fn enter(lock: &'a ReentrantMutex<PhaseState>) -> Self {
        let phase = lock.lock();
        phase.depth.set(phase.depth.get() + 1);
        Self { phase }
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        let depth = self.phase.depth.get() - 1;
        self.phase.depth.set(depth);
        if depth == 0 {
            self.phase.carried.take();
        }
    }
}

/// Armed around the hook span of start, stop and destroy. If a hook or a
/// listener panics, the unwind drops it armed and the component is left
/// FAILED instead of stuck in a prep state. Nothing is fired while unwinding.
struct FailOnUnwind<'a> {
    name: &'a str,
    state: &'a AtomicU8,
    armed: bool,
}

impl<'a> FailOnUnwind<'a> {
    fn arm(name: &'a str, state: &'a AtomicU8) -> Self {
        Self {
            name,
            state,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for FailOnUnwind<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.store(LifecycleState::Failed.id(), Ordering::Release);
            error!(component = self.name, "phase panicked, lifecycle marked FAILED");
        }
    }
}

impl<C: Component> LifecycleEngine<C> {
    /// Wrap `component`; the engine starts in NEW with no listeners.
    pub fn new(component: C) -> Self {
        Self {
            component,
            state: AtomicU8::new(LifecycleState::New.id()),
            phase: ReentrantMutex::new(PhaseState::default()),
            support: LifecycleSupport::new(),
        }
    }

    pub fn component(&self) -> &C {
        &self.component
    }

    fn load_state(&self) -> LifecycleState {
        ALL_STATES[usize::from(self.state.load(Ordering::Acquire))]
    }

    /// Unguarded write used by the engine itself; fires the state's event.
    fn write_state(&self, state: LifecycleState, data: Option<&EventData>) {
        debug!(
            component = self.component.name(),
            from = %self.load_state(),
            to = %state,
            "lifecycle state change"
        );
        self.state.store(state.id(), Ordering::Release);
        if let Some(kind) = state.lifecycle_event() {
            self.dispatch(kind, data);
        }
    }

    /// Fire a phase event, attaching a carried payload when none is given.
    fn dispatch(&self, kind: &str, data: Option<&EventData>) {
        let carried = match data {
            Some(_) => None,
            None => self.phase.lock().carried.take(),
        };
        self.support.fire(self, kind, data.or(carried.as_ref()));
    }

    fn fail(&self, phase: Phase, cause: HookError) -> LifecycleError {
        self.write_state(LifecycleState::Failed, None);
        LifecycleError::phase_failed(phase, cause)
    }

    fn reject(&self, phase: Phase) -> LifecycleError {
        LifecycleError::invalid_transition(self.load_state(), phase.before_event())
    }

    fn run(&self, phase: Phase) -> Result<()> {
        match phase {
            Phase::Init => self.init(),
            Phase::Start => self.start(),
            Phase::Stop => self.stop(),
            Phase::Destroy => self.destroy(),
        }
    }

    /// Run the hook span of a phase; a panic inside leaves the state FAILED.
    fn guarded<T>(&self, steps: impl FnOnce() -> T) -> T {
        let guard = FailOnUnwind::arm(self.component.name(), &self.state);
        let out = steps();
        guard.disarm();
        out
    }

    fn start_steps(&self) -> HookResult {
        self.write_state(LifecycleState::StartingPrep, None);
        self.component.start_internal(self)?;

        match self.load_state() {
            // The component marked itself failed; clean up through stop.
            LifecycleState::Failed => self.stop()?,
            LifecycleState::Starting => self.write_state(LifecycleState::Started, None),
            other => return Err(LifecycleError::invalid_transition(other, AFTER_START_EVENT).into()),
        }
        Ok(())
    }

    fn stop_steps(&self, from: LifecycleState) -> HookResult {
        if from == LifecycleState::Failed {
            // Announce the stop without passing through STOPPING_PREP, which
            // would report the failed component as available.
            self.dispatch(BEFORE_STOP_EVENT, None);
        } else {
            self.write_state(LifecycleState::StoppingPrep, None);
        }

        self.component.stop_internal(self)?;

        match self.load_state() {
            LifecycleState::Stopping | LifecycleState::Failed => {
                self.write_state(LifecycleState::Stopped, None);
                Ok(())
            }
            other => Err(LifecycleError::invalid_transition(other, AFTER_STOP_EVENT).into()),
        }
    }

    fn destroy_steps(&self) -> HookResult {
        self.write_state(LifecycleState::Destroying, None);
        self.component.destroy_internal(self)?;
        self.write_state(LifecycleState::Destroyed, None);
        Ok(())
    }

    fn finish_single_use(&self, stopped: Result<()>) -> Result<()> {
        if self.load_state() != LifecycleState::Stopped {
            self.write_state(LifecycleState::Stopped, None);
        }

        match (stopped, self.destroy()) {
            (Ok(()), destroyed) => destroyed,
            (Err(stop_err), Ok(())) => Err(stop_err),
            (Err(stop_err), Err(destroy_err)) => {
                log_error(&destroy_err);
                Err(stop_err)
            }
        }
    }
}

impl<C: Component> Lifecycle for LifecycleEngine<C> {
    fn add_lifecycle_listener(&self, listener: Arc<dyn LifecycleListener>) {
        self.support.add(listener);
    }

    fn find_lifecycle_listeners(&self) -> Vec<Arc<dyn LifecycleListener>> {
        self.support.listeners()
    }

    fn remove_lifecycle_listener(&self, listener: &Arc<dyn LifecycleListener>) {
        self.support.remove(listener);
    }

    fn init(&self) -> Result<()> {
        let _phase = PhaseGuard::enter(&self.phase);

        if phase_entry(Phase::Init, self.load_state()) != Entry::Proceed {
            return Err(self.reject(Phase::Init));
        }

        self.write_state(LifecycleState::Initializing, None);
        // A failed init leaves the component in INITIALIZING: it is not recoverable.
        self.component
            .init_internal(self)
            .map_err(|cause| LifecycleError::phase_failed(Phase::Init, cause))?;
        self.write_state(LifecycleState::Initialized, None);
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let _phase = PhaseGuard::enter(&self.phase);

        match phase_entry(Phase::Start, self.load_state()) {
            Entry::Skip => {
                warn!(
                    component = self.component.name(),
                    state = %self.load_state(),
                    "the lifecycle has already started"
                );
                return Ok(());
            }
            Entry::Prepare(first) => {
                self.run(first)?;
                if phase_entry(Phase::Start, self.load_state()) != Entry::Proceed {
                    return Err(self.reject(Phase::Start));
                }
            }
            Entry::Proceed => {}
            Entry::MarkStopped | Entry::Reject => return Err(self.reject(Phase::Start)),
        }

        self.guarded(|| self.start_steps())
            .map_err(|cause| self.fail(Phase::Start, cause))
    }

    fn stop(&self) -> Result<()> {
        let _phase = PhaseGuard::enter(&self.phase);

        let from = self.load_state();
        match phase_entry(Phase::Stop, from) {
            Entry::Skip => {
                warn!(
                    component = self.component.name(),
                    state = %from,
                    "the lifecycle has already stopped"
                );
                return Ok(());
            }
            Entry::MarkStopped => {
                // Nothing was started; record the stop without events or hooks.
                self.state.store(LifecycleState::Stopped.id(), Ordering::Release);
                return Ok(());
            }
            Entry::Proceed => {}
            Entry::Prepare(_) | Entry::Reject => return Err(self.reject(Phase::Stop)),
        }

        let stopped = self
            .guarded(|| self.stop_steps(from))
            .map_err(|cause| self.fail(Phase::Stop, cause));

        if C::SINGLE_USE {
            return self.finish_single_use(stopped);
        }
        stopped
    }

    fn destroy(&self) -> Result<()> {
        let _phase = PhaseGuard::enter(&self.phase);

        let mut entry = phase_entry(Phase::Destroy, self.load_state());
        if let Entry::Prepare(first) = entry {
            if let Err(e) = self.run(first) {
                warn!(
                    component = self.component.name(),
                    error = %e,
                    "cleanup before destroy failed, destroying anyway"
                );
            }
            entry = match phase_entry(Phase::Destroy, self.load_state()) {
                // Cleanup left the component FAILED; destroy it as it is.
                Entry::Prepare(_) => Entry::Proceed,
                other => other,
            };
        }

        match entry {
            Entry::Skip => {
                debug!(
                    component = self.component.name(),
                    single_use = C::SINGLE_USE,
                    "the lifecycle has already been destroyed"
                );
                Ok(())
            }
            Entry::Proceed => self
                .guarded(|| self.destroy_steps())
                .map_err(|cause| self.fail(Phase::Destroy, cause)),
            Entry::Prepare(_) | Entry::MarkStopped | Entry::Reject => {
                Err(self.reject(Phase::Destroy))
            }
        }
    }

    fn state(&self) -> LifecycleState {
        self.load_state()
    }

    fn set_state_with(&self, state: LifecycleState, data: Option<EventData>) -> Result<()> {
        let phase = self.phase.lock();
        let current = self.load_state();
        if phase.depth.get() == 0 {
            return Err(LifecycleError::not_in_phase(current, state));
        }

        check_guarded_write(current, state)?;
        if state.lifecycle_event().is_some() {
            self.write_state(state, data.as_ref());
        } else {
            // Silent target: the payload rides on the phase's next event.
            if data.is_some() {
                phase.carried.set(data);
            }
            self.write_state(state, None);
        }
        Ok(())
    }

    fn fire_lifecycle_event(&self, kind: &str, data: Option<EventData>) {
        self.support.fire(self, kind, data.as_ref());
    }
}

impl<C: Component> fmt::Debug for LifecycleEngine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleEngine")
            .field("component", &self.component.name())
            .field("state", &self.load_state())
            .field("support", &self.support)
            .finish()
    }
}
