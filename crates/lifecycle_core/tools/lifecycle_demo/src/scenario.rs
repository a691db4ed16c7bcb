use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::Mutex;
use tracing::info;

use lifecycle_core::error::log_error;
use lifecycle_core::lifecycle::{
    available_phases, ActivationGate, Component, Lifecycle, LifecycleEngine, LifecycleEvent,
    LifecycleListener, LifecycleState, Phase,
};
use lifecycle_core::HookResult;

use crate::config::Config;

/// One observed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub component: String,
    pub event: String,
    pub state: LifecycleState,
}

/// Listener that appends every event of one component to a shared journal.
pub struct JournalListener {
    component: String,
    journal: Arc<Mutex<Vec<JournalEntry>>>,
}

impl JournalListener {
    pub fn new(component: impl Into<String>, journal: Arc<Mutex<Vec<JournalEntry>>>) -> Self {
        Self {
            component: component.into(),
            journal,
        }
    }
}

impl LifecycleListener for JournalListener {
    fn lifecycle_event(&self, event: &LifecycleEvent<'_>) {
        self.journal.lock().push(JournalEntry {
            component: self.component.clone(),
            event: event.kind().to_string(),
            state: event.lifecycle().state(),
        });
    }
}

/// Leaf service. With `ONE_SHOT` it is destroyed as soon as it stops.
pub struct Service<const ONE_SHOT: bool> {
    name: String,
    fail: Option<Phase>,
}

impl<const ONE_SHOT: bool> Service<ONE_SHOT> {
    pub fn new(name: impl Into<String>, fail: Option<Phase>) -> Self {
        Self {
            name: name.into(),
            fail,
        }
    }

    fn run_hook(&self, phase: Phase) -> HookResult {
        info!(service = %self.name, phase = phase.label(), "hook");
        if self.fail == Some(phase) {
            return Err(anyhow!("{} refused to {}", self.name, phase.label()).into());
        }
        Ok(())
    }
}

impl<const ONE_SHOT: bool> Component for Service<ONE_SHOT> {
    const SINGLE_USE: bool = ONE_SHOT;

    fn name(&self) -> &str {
        &self.name
    }

    fn init_internal(&self, _lifecycle: &dyn Lifecycle) -> HookResult {
        self.run_hook(Phase::Init)
    }

    fn start_internal(&self, lifecycle: &dyn Lifecycle) -> HookResult {
        self.run_hook(Phase::Start)?;
        Ok(lifecycle.set_state(LifecycleState::Starting)?)
    }

    fn stop_internal(&self, lifecycle: &dyn Lifecycle) -> HookResult {
        self.run_hook(Phase::Stop)?;
        Ok(lifecycle.set_state(LifecycleState::Stopping)?)
    }

    fn destroy_internal(&self, _lifecycle: &dyn Lifecycle) -> HookResult {
        self.run_hook(Phase::Destroy)
    }
}

/// Container that propagates its phases to its children: in order on the
/// way up, in reverse order on the way down.
pub struct Server {
    name: String,
    children: Vec<Arc<dyn Lifecycle>>,
}

impl Server {
    pub fn new(name: impl Into<String>, children: Vec<Arc<dyn Lifecycle>>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }
}

impl Component for Server {
    fn name(&self) -> &str {
        &self.name
    }

    fn init_internal(&self, _lifecycle: &dyn Lifecycle) -> HookResult {
        for child in &self.children {
            child.init()?;
        }
        Ok(())
    }

    fn start_internal(&self, lifecycle: &dyn Lifecycle) -> HookResult {
        lifecycle.set_state(LifecycleState::Starting)?;
        for child in &self.children {
            child.start()?;
        }
        Ok(())
    }

    fn stop_internal(&self, lifecycle: &dyn Lifecycle) -> HookResult {
        lifecycle.set_state(LifecycleState::Stopping)?;
        for child in self.children.iter().rev() {
            child.stop()?;
        }
        Ok(())
    }

    fn destroy_internal(&self, _lifecycle: &dyn Lifecycle) -> HookResult {
        for child in self.children.iter().rev() {
            child.destroy()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    pub journal: Vec<JournalEntry>,
    /// (component, state) after the run, server first.
    pub final_states: Vec<(String, LifecycleState)>,
    /// Phases the server reported as failed, with the error text.
    pub failures: Vec<(Phase, String)>,
    /// Planned phases the server's state no longer offered, so never called.
    pub skipped: Vec<(Phase, LifecycleState)>,
    /// Whether the server's activation gate was open while it was started.
    pub served: bool,
}

/// Build the component tree described by `config` and run start, stop, destroy.
pub fn run(config: &Config) -> Report {
    let journal = Arc::new(Mutex::new(Vec::new()));

    let mut children: Vec<(String, Arc<dyn Lifecycle>)> = Vec::with_capacity(config.children);
    for idx in 0..config.children {
        let name = format!("service-{idx}");
        let fail = if idx + 1 == config.children { config.fail } else { None };
        let child: Arc<dyn Lifecycle> = if config.single_use {
            Arc::new(LifecycleEngine::new(Service::<true>::new(name.clone(), fail)))
        } else {
            Arc::new(LifecycleEngine::new(Service::<false>::new(name.clone(), fail)))
        };
        child.add_lifecycle_listener(Arc::new(JournalListener::new(
            name.clone(),
            Arc::clone(&journal),
        )));
        children.push((name, child));
    }

    let server = LifecycleEngine::new(Server::new(
        "server",
        children.iter().map(|(_, child)| Arc::clone(child)).collect(),
    ));
    server.add_lifecycle_listener(Arc::new(JournalListener::new("server", Arc::clone(&journal))));
    let gate = Arc::new(ActivationGate::new());
    server.add_lifecycle_listener(gate.clone());

    let mut failures = Vec::new();
    let mut skipped = Vec::new();
    let mut served = false;
    for phase in [Phase::Start, Phase::Stop, Phase::Destroy] {
        let state = server.state();
        if !available_phases(state).contains(&phase) {
            info!(phase = phase.label(), %state, "phase not available, skipping");
            skipped.push((phase, state));
            continue;
        }

        let outcome = match phase {
            Phase::Init => server.init(),
            Phase::Start => server.start(),
            Phase::Stop => server.stop(),
            Phase::Destroy => server.destroy(),
        };
        if let Err(e) = outcome {
            log_error(&e);
            failures.push((phase, e.to_string()));
        }
        if phase == Phase::Start {
            served = gate
                .run_if_active(|| info!(state = %server.state(), "server accepting work"))
                .is_some();
        }
    }

    let mut final_states = vec![("server".to_string(), server.state())];
    final_states.extend(children.iter().map(|(name, child)| (name.clone(), child.state())));

    let journal = journal.lock().clone();
    Report {
        journal,
        final_states,
        failures,
        skipped,
        served,
    }
}
