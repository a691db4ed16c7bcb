use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use lifecycle_core::error::{ErrorKind, Payload};
use lifecycle_core::lifecycle::{
    listener_fn, Component, Lifecycle, LifecycleEngine, LifecycleEvent, LifecycleState, Phase,
    BEFORE_START_EVENT, BEFORE_STOP_EVENT, PERIODIC_EVENT,
};
use lifecycle_core::{HookResult, LifecycleError};

#[derive(Debug, Error)]
#[error("{0}")]
struct RuntimeFailure(String);

/// Test component. `ONCE` makes it single-use.
#[derive(Default)]
struct Recorder<const ONCE: bool> {
    calls: Mutex<Vec<&'static str>>,
    fail_on: Mutex<Option<&'static str>>,
    /// Panics once in this hook.
    panic_on: Mutex<Option<&'static str>>,
    /// Leaves prep -> active to somebody else.
    lazy: bool,
    /// start hook reports FAILED instead of returning an error.
    give_up: bool,
}

type Reusable = Recorder<false>;
type OneShot = Recorder<true>;

impl<const ONCE: bool> Recorder<ONCE> {
    fn failing_on(hook: &'static str) -> Self {
        let recorder = Self::default();
        *recorder.fail_on.lock() = Some(hook);
        recorder
    }

    fn panicking_on(hook: &'static str) -> Self {
        let recorder = Self::default();
        *recorder.panic_on.lock() = Some(hook);
        recorder
    }

    fn enter(&self, hook: &'static str) -> HookResult {
        self.calls.lock().push(hook);
        let panic_now = {
            let mut panic_on = self.panic_on.lock();
            if *panic_on == Some(hook) {
                panic_on.take().is_some()
            } else {
                false
            }
        };
        if panic_now {
            panic!("{hook} panicked");
        }
        if *self.fail_on.lock() == Some(hook) {
            return Err(Box::new(RuntimeFailure(format!("{hook} exploded"))));
        }
        Ok(())
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }
}

impl<const ONCE: bool> Component for Recorder<ONCE> {
    const SINGLE_USE: bool = ONCE;

    fn init_internal(&self, _lifecycle: &dyn Lifecycle) -> HookResult {
        self.enter("init")
    }

    fn start_internal(&self, lifecycle: &dyn Lifecycle) -> HookResult {
        self.enter("start")?;
        if self.give_up {
            lifecycle.set_state(LifecycleState::Failed)?;
        } else if !self.lazy {
            lifecycle.set_state(LifecycleState::Starting)?;
        }
        Ok(())
    }

    fn stop_internal(&self, lifecycle: &dyn Lifecycle) -> HookResult {
        self.enter("stop")?;
        if !self.lazy {
            lifecycle.set_state(LifecycleState::Stopping)?;
        }
        Ok(())
    }

    fn destroy_internal(&self, _lifecycle: &dyn Lifecycle) -> HookResult {
        self.enter("destroy")
    }
}

fn journal(lifecycle: &dyn Lifecycle) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    lifecycle.add_lifecycle_listener(listener_fn(move |event: &LifecycleEvent<'_>| {
        sink.lock().push(event.kind().to_string());
    }));
    log
}

fn events(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().clone()
}

#[test]
fn start_from_new_initializes_first() {
    let engine = LifecycleEngine::new(Reusable::default());
    let log = journal(&engine);

    engine.start().expect("start should succeed");

    assert_eq!(engine.state(), LifecycleState::Started);
    assert_eq!(engine.state_name(), "STARTED");
    assert_eq!(engine.component().calls(), ["init", "start"]);
    assert_eq!(
        events(&log),
        ["before_init", "after_init", "before_start", "after_start"]
    );
}

#[test]
fn start_hook_error_marks_failed_and_wraps_cause() {
    let engine = LifecycleEngine::new(Reusable::failing_on("start"));

    let err = engine.start().unwrap_err();

    assert_eq!(engine.state(), LifecycleState::Failed);
    assert_eq!(err.kind, ErrorKind::HookFailed);
    assert_eq!(err.payload, Payload::Phase(Phase::Start));
    let cause = err
        .cause()
        .and_then(|c| c.downcast_ref::<RuntimeFailure>())
        .expect("hook error should be wrapped");
    assert_eq!(cause.0, "start exploded");
}

#[test]
fn stop_from_new_marks_stopped_without_hooks_or_events() {
    let engine = LifecycleEngine::new(Reusable::default());
    let log = journal(&engine);

    engine.stop().unwrap();

    assert_eq!(engine.state(), LifecycleState::Stopped);
    assert!(engine.component().calls().is_empty());
    assert!(events(&log).is_empty());
}

#[test]
fn stop_when_already_stopped_is_silent() {
    let engine = LifecycleEngine::new(Reusable::default());
    engine.start().unwrap();
    engine.stop().unwrap();
    let log = journal(&engine);

    engine.stop().unwrap();

    assert_eq!(engine.state(), LifecycleState::Stopped);
    assert_eq!(engine.component().calls(), ["init", "start", "stop"]);
    assert!(events(&log).is_empty());
}

#[test]
fn start_when_started_is_silent() {
    let engine = LifecycleEngine::new(Reusable::default());
    engine.start().unwrap();

    engine.start().unwrap();

    assert_eq!(engine.component().calls(), ["init", "start"]);
}

#[test]
fn full_cycle_restart_and_destroy() {
    let engine = LifecycleEngine::new(Reusable::default());
    let log = journal(&engine);

    engine.init().unwrap();
    engine.start().unwrap();
    engine.stop().unwrap();
    engine.start().unwrap();
    engine.stop().unwrap();
    engine.destroy().unwrap();

    assert_eq!(engine.state(), LifecycleState::Destroyed);
    assert_eq!(
        engine.component().calls(),
        ["init", "start", "stop", "start", "stop", "destroy"]
    );
    assert_eq!(
        events(&log),
        [
            "before_init",
            "after_init",
            "before_start",
            "after_start",
            "before_stop",
            "after_stop",
            "before_start",
            "after_start",
            "before_stop",
            "after_stop",
            "before_destroy",
            "after_destroy",
        ]
    );
}

#[test]
fn destroy_is_idempotent() {
    let engine = LifecycleEngine::new(Reusable::default());

    engine.destroy().unwrap();
    engine.destroy().unwrap();

    assert_eq!(engine.state(), LifecycleState::Destroyed);
    assert_eq!(engine.component().calls(), ["destroy"]);
}

#[test]
fn destroy_while_started_is_rejected() {
    let engine = LifecycleEngine::new(Reusable::default());
    engine.start().unwrap();

    let err = engine.destroy().unwrap_err();

    assert_eq!(err.kind, ErrorKind::InvalidTransition);
    assert!(err.message.contains("before_destroy"));
    assert_eq!(engine.state(), LifecycleState::Started);
}

#[test]
fn single_use_component_is_destroyed_after_stop() {
    let engine = LifecycleEngine::new(OneShot::default());
    let log = journal(&engine);
    engine.start().unwrap();

    engine.stop().unwrap();

    assert_eq!(engine.state(), LifecycleState::Destroyed);
    assert_eq!(engine.component().calls(), ["init", "start", "stop", "destroy"]);
    assert_eq!(
        events(&log)[4..],
        ["before_stop", "after_stop", "before_destroy", "after_destroy"]
    );
}

#[test]
fn single_use_component_is_destroyed_even_when_stop_fails() {
    let engine = LifecycleEngine::new(OneShot::default());
    engine.start().unwrap();
    *engine.component().fail_on.lock() = Some("stop");

    let err = engine.stop().unwrap_err();

    assert_eq!(err.payload, Payload::Phase(Phase::Stop));
    assert_eq!(engine.state(), LifecycleState::Destroyed);
    assert_eq!(engine.component().calls(), ["init", "start", "stop", "destroy"]);
}

#[test]
fn second_init_is_rejected_and_leaves_state_alone() {
    let engine = LifecycleEngine::new(Reusable::default());
    engine.init().unwrap();

    let err = engine.init().unwrap_err();

    assert_eq!(err.kind, ErrorKind::InvalidTransition);
    match err.payload {
        Payload::Transition { from, attempted } => {
            assert_eq!(from, LifecycleState::Initialized);
            assert_eq!(attempted, "before_init");
        }
        other => panic!("unexpected payload {other:?}"),
    }
    assert_eq!(engine.state(), LifecycleState::Initialized);
}

#[test]
fn init_hook_error_is_fatal_but_not_failed() {
    let engine = LifecycleEngine::new(Reusable::failing_on("init"));

    let err = engine.start().unwrap_err();

    assert_eq!(err.payload, Payload::Phase(Phase::Init));
    assert_eq!(engine.state(), LifecycleState::Initializing);
    assert_eq!(engine.component().calls(), ["init"]);

    let again = engine.start().unwrap_err();
    assert_eq!(again.kind, ErrorKind::InvalidTransition);
}

#[test]
fn start_hook_that_does_not_advance_fails_the_component() {
    let engine = LifecycleEngine::new(Reusable {
        lazy: true,
        ..Reusable::default()
    });

    let err = engine.start().unwrap_err();

    assert_eq!(engine.state(), LifecycleState::Failed);
    assert_eq!(err.kind, ErrorKind::HookFailed);
    let inner = err
        .cause()
        .and_then(|c| c.downcast_ref::<LifecycleError>())
        .expect("inner lifecycle error");
    assert_eq!(inner.kind, ErrorKind::InvalidTransition);
    assert!(inner.message.contains("after_start"));
}

#[test]
fn listener_may_advance_prep_states() {
    let engine = LifecycleEngine::new(Reusable {
        lazy: true,
        ..Reusable::default()
    });
    engine.add_lifecycle_listener(listener_fn(|event: &LifecycleEvent<'_>| {
        let next = match event.kind() {
            BEFORE_START_EVENT => LifecycleState::Starting,
            BEFORE_STOP_EVENT => LifecycleState::Stopping,
            _ => return,
        };
        event
            .lifecycle()
            .set_state(next)
            .expect("prep -> active is a guarded write");
    }));

    engine.start().unwrap();
    assert_eq!(engine.state(), LifecycleState::Started);

    engine.stop().unwrap();
    assert_eq!(engine.state(), LifecycleState::Stopped);
}

#[test]
fn start_hook_reporting_failure_is_cleaned_up_by_stop() {
    let engine = LifecycleEngine::new(Reusable {
        give_up: true,
        ..Reusable::default()
    });
    let log = journal(&engine);

    engine.start().expect("controlled failure is not an error");

    assert_eq!(engine.state(), LifecycleState::Stopped);
    assert_eq!(engine.component().calls(), ["init", "start", "stop"]);
    assert_eq!(
        events(&log),
        ["before_init", "after_init", "before_start", "before_stop", "after_stop"]
    );
}

#[test]
fn stop_from_failed_skips_stopping_prep() {
    let engine = LifecycleEngine::new(Reusable::failing_on("start"));
    engine.start().unwrap_err();
    *engine.component().fail_on.lock() = None;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.add_lifecycle_listener(listener_fn(move |event: &LifecycleEvent<'_>| {
        sink.lock()
            .push((event.kind().to_string(), event.lifecycle().state()));
    }));

    engine.stop().unwrap();

    assert_eq!(engine.state(), LifecycleState::Stopped);
    assert_eq!(
        *seen.lock(),
        [
            ("before_stop".to_string(), LifecycleState::Failed),
            ("after_stop".to_string(), LifecycleState::Stopped),
        ]
    );
}

#[test]
fn start_from_failed_stops_first() {
    let engine = LifecycleEngine::new(Reusable::failing_on("start"));
    engine.start().unwrap_err();
    *engine.component().fail_on.lock() = None;
    let log = journal(&engine);

    engine.start().unwrap();

    assert_eq!(engine.state(), LifecycleState::Started);
    assert_eq!(engine.component().calls(), ["init", "start", "stop", "start"]);
    assert_eq!(
        events(&log),
        ["before_stop", "after_stop", "before_start", "after_start"]
    );
}

#[test]
fn stop_hook_error_marks_failed() {
    let engine = LifecycleEngine::new(Reusable::default());
    engine.start().unwrap();
    *engine.component().fail_on.lock() = Some("stop");

    let err = engine.stop().unwrap_err();

    assert_eq!(err.payload, Payload::Phase(Phase::Stop));
    assert_eq!(engine.state(), LifecycleState::Failed);
}

#[test]
fn destroy_from_failed_survives_failing_cleanup() {
    let engine = LifecycleEngine::new(Reusable::failing_on("start"));
    engine.start().unwrap_err();
    *engine.component().fail_on.lock() = Some("stop");

    engine.destroy().expect("destroy proceeds after failed cleanup");

    assert_eq!(engine.state(), LifecycleState::Destroyed);
    assert_eq!(
        engine.component().calls(),
        ["init", "start", "stop", "destroy"]
    );
}

#[test]
fn destroy_hook_error_marks_failed() {
    let engine = LifecycleEngine::new(Reusable::failing_on("destroy"));

    let err = engine.destroy().unwrap_err();

    assert_eq!(err.payload, Payload::Phase(Phase::Destroy));
    assert_eq!(engine.state(), LifecycleState::Failed);
}

#[test]
fn set_state_outside_a_phase_is_refused() {
    let engine = LifecycleEngine::new(Reusable::default());
    engine.init().unwrap();

    let err = engine.set_state(LifecycleState::Failed).unwrap_err();

    assert_eq!(err.kind, ErrorKind::InvalidState);
    assert_eq!(engine.state(), LifecycleState::Initialized);
}

#[test]
fn custom_events_carry_payload() {
    let engine = LifecycleEngine::new(Reusable::default());
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    engine.add_lifecycle_listener(listener_fn(move |event: &LifecycleEvent<'_>| {
        if event.kind() == PERIODIC_EVENT {
            *sink.lock() = event.data_as::<u32>().copied();
        }
    }));

    engine.fire_lifecycle_event(PERIODIC_EVENT, Some(Arc::new(7u32)));

    assert_eq!(*seen.lock(), Some(7));
    assert_eq!(engine.state(), LifecycleState::New);
}

#[test]
fn guarded_write_payload_rides_on_the_next_event() {
    let engine = LifecycleEngine::new(Reusable {
        lazy: true,
        ..Reusable::default()
    });
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.add_lifecycle_listener(listener_fn(move |event: &LifecycleEvent<'_>| {
        sink.lock()
            .push((event.kind().to_string(), event.data_as::<u32>().copied()));
    }));
    engine.add_lifecycle_listener(listener_fn(|event: &LifecycleEvent<'_>| {
        if event.kind() == BEFORE_START_EVENT {
            event
                .lifecycle()
                .set_state_with(LifecycleState::Starting, Some(Arc::new(42u32)))
                .expect("prep -> active is a guarded write");
        }
    }));

    engine.start().unwrap();

    assert_eq!(engine.state(), LifecycleState::Started);
    assert_eq!(
        *seen.lock(),
        [
            ("before_init".to_string(), None),
            ("after_init".to_string(), None),
            ("before_start".to_string(), None),
            ("after_start".to_string(), Some(42)),
        ]
    );

    engine.fire_lifecycle_event(PERIODIC_EVENT, None);
    assert_eq!(seen.lock().last(), Some(&("periodic".to_string(), None)));
}

#[test]
fn single_use_start_from_failed_is_refused_once_cleanup_destroys_it() {
    let engine = LifecycleEngine::new(OneShot::failing_on("start"));
    engine.start().unwrap_err();
    assert_eq!(engine.state(), LifecycleState::Failed);
    *engine.component().fail_on.lock() = None;

    let err = engine.start().unwrap_err();

    assert_eq!(err.kind, ErrorKind::InvalidTransition);
    assert_eq!(
        err.payload,
        Payload::Transition {
            from: LifecycleState::Destroyed,
            attempted: "before_start".into(),
        }
    );
    assert_eq!(engine.state(), LifecycleState::Destroyed);
    assert_eq!(
        engine.component().calls(),
        ["init", "start", "stop", "destroy"]
    );
}

#[test]
fn panicking_start_hook_leaves_component_failed() {
    let engine = LifecycleEngine::new(Reusable::panicking_on("start"));

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.start()));

    assert!(outcome.is_err(), "the panic should propagate");
    assert_eq!(engine.state(), LifecycleState::Failed);

    engine.start().expect("a failed component restarts through stop");
    assert_eq!(engine.state(), LifecycleState::Started);
    assert_eq!(
        engine.component().calls(),
        ["init", "start", "stop", "start"]
    );
}

#[test]
fn panicking_listener_leaves_component_failed() {
    let engine = LifecycleEngine::new(Reusable::default());
    let armed = Arc::new(AtomicBool::new(true));
    let trigger = Arc::clone(&armed);
    engine.add_lifecycle_listener(listener_fn(move |event: &LifecycleEvent<'_>| {
        if event.kind() == BEFORE_START_EVENT && trigger.swap(false, Ordering::SeqCst) {
            panic!("listener blew up");
        }
    }));

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.start()));

    assert!(outcome.is_err(), "the panic should propagate");
    assert!(!armed.load(Ordering::SeqCst));
    assert_eq!(engine.state(), LifecycleState::Failed);

    engine.stop().unwrap();
    assert_eq!(engine.state(), LifecycleState::Stopped);
    engine.destroy().unwrap();
    assert_eq!(engine.state(), LifecycleState::Destroyed);
    assert_eq!(engine.component().calls(), ["init", "stop", "destroy"]);
}
