//! The orchestrator tying clock, bus and APIs together

use chrono::{DateTime, Utc};
use hauto_asyncable::Asyncable;
use hauto_config::HautoConfig;
use hauto_core::events::{EVT_CLOSE, EVT_INIT, EVT_INTENT_SUBSCRIBED, EVT_READY, EVT_START, EVT_STOP};
use hauto_core::{Clock, CoreState, EventName, HautoError, HautoResult, Parent, Payload};
use hauto_event_bus::{EventBus, FireOutcome, IntoIntent, WaitPolicy};
use hauto_intent::{Handler, Intent};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::ApiRegistry;
use crate::apis::{Moment, Trigger};
use crate::runner::CoreRunner;

/// A running automation environment
///
/// Always handled through an `Arc`; see [`Hautomate::new`].
pub struct Hautomate {
    config: HautoConfig,
    clock: Clock,
    bus: Arc<EventBus>,
    apis: ApiRegistry,
    state: Mutex<CoreState>,
    stopped: watch::Sender<bool>,
}

impl Hautomate {
    /// Build a core with the built-in Trigger and Moment APIs registered
    ///
    /// Further APIs should be registered through [`Hautomate::apis`] before
    /// [`Hautomate::start`]; they are attached while `INIT` is handled.
    pub fn new(config: HautoConfig) -> HautoResult<Arc<Self>> {
        config
            .validate()
            .map_err(|e| HautoError::config(e.to_string()))?;
        let clock = config.moment.clock()?;
        let (stopped, _) = watch::channel(false);

        let core = Arc::new_cyclic(|weak: &Weak<Hautomate>| {
            let runner = Arc::new(CoreRunner::new(weak.clone()));
            Hautomate {
                config,
                clock,
                bus: Arc::new(EventBus::with_runner(clock, runner)),
                apis: ApiRegistry::new(),
                state: Mutex::new(CoreState::Initialized),
                stopped,
            }
        });

        core.apis.register(Arc::new(Trigger::new()))?;
        core.apis.register(Arc::new(Moment::new(clock)))?;

        let weak = Arc::downgrade(&core);
        let attach: Handler = Asyncable::safe_sync(move |_ctx| {
            if let Some(core) = weak.upgrade() {
                core.apis.attach_all(&core)?;
            }
            Ok(())
        });
        core.bus.subscribe(EVT_INIT, attach);

        Ok(core)
    }

    pub fn config(&self) -> &HautoConfig {
        &self.config
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Current virtual time
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn apis(&self) -> &ApiRegistry {
        &self.apis
    }

    /// Shortcut for the built-in Trigger API
    pub fn trigger(&self) -> HautoResult<Arc<Trigger>> {
        self.apis.get_as::<Trigger>(Trigger::NAME)
    }

    /// Shortcut for the built-in Moment API
    pub fn moment(&self) -> HautoResult<Arc<Moment>> {
        self.apis.get_as::<Moment>(Moment::NAME)
    }

    pub fn state(&self) -> CoreState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_ready(&self) -> bool {
        self.state() == CoreState::Ready
    }

    /// Whether the core has started and is not yet shutting down
    pub fn is_running(&self) -> bool {
        matches!(self.state(), CoreState::Starting | CoreState::Ready)
    }

    fn transition(&self, to: CoreState) -> HautoResult<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let from = *state;
        if !from.can_transition_to(to) {
            return Err(HautoError::InvalidTransition { from, to });
        }
        *state = to;
        info!(%from, %to, "Core state changed");
        Ok(())
    }

    /// Register an intent (or bare handler) for `event`
    ///
    /// Once the core is ready, `INTENT_SUBSCRIBED` is announced for it.
    pub fn subscribe(&self, event: impl Into<EventName>, intent: impl IntoIntent) -> Intent {
        let intent = self.bus.subscribe(event, intent);

        if self.is_ready() && Handle::try_current().is_ok() {
            let mut payload = Payload::new();
            payload.insert("intent".into(), intent.id().to_string().into());
            payload.insert("event".into(), intent.event().as_str().into());
            self.bus.dispatch(EVT_INTENT_SUBSCRIBED, Parent::Core, payload);
        }
        intent
    }

    /// Register an intent under the event it was built for
    pub fn register(&self, intent: Intent) -> Intent {
        let event = intent.event().clone();
        self.subscribe(event, intent)
    }

    pub fn unsubscribe(&self, intent: &Intent) -> bool {
        self.bus.unsubscribe(intent)
    }

    /// Fire an event from outside the core
    pub async fn fire(
        &self,
        event: impl Into<EventName>,
        parent: Parent,
        wait: Option<WaitPolicy>,
        payload: Payload,
    ) -> FireOutcome {
        self.bus.fire(event, parent, wait, payload).await
    }

    async fn announce(&self, event: &str, wait: Option<WaitPolicy>) {
        let outcome = self.bus.fire(event, Parent::Core, wait, Payload::new()).await;
        for run in outcome.raised() {
            if let Err(err) = &run.result {
                warn!(event, intent = %run.intent.id(), error = %err, "Lifecycle listener failed");
            }
        }
        debug!(event, done = outcome.done.len(), pending = outcome.pending.len(), "Announced");
    }

    /// Bring the core up to `READY`
    pub async fn start(&self) -> HautoResult<()> {
        let state = self.state();
        if state != CoreState::Initialized {
            return Err(HautoError::InvalidTransition {
                from: state,
                to: CoreState::Starting,
            });
        }

        info!("Starting hautomate");
        self.announce(EVT_INIT, Some(WaitPolicy::AllCompleted)).await;
        self.transition(CoreState::Starting)?;
        self.announce(EVT_START, Some(WaitPolicy::AllCompleted)).await;
        self.transition(CoreState::Ready)?;
        self.announce(EVT_READY, None).await;
        Ok(())
    }

    /// Shut the core down and release [`Hautomate::run`]
    pub async fn stop(&self) -> HautoResult<()> {
        info!("Stopping hautomate");
        self.transition(CoreState::Closing)?;
        self.announce(EVT_CLOSE, Some(WaitPolicy::AllCompleted)).await;
        self.transition(CoreState::Stopped)?;
        self.announce(EVT_STOP, Some(WaitPolicy::AllCompleted)).await;
        self.stopped.send_replace(true);
        Ok(())
    }

    /// Start, then wait until [`Hautomate::stop`] completes
    pub async fn run(&self) -> HautoResult<()> {
        self.start().await?;
        self.wait_stopped().await;
        Ok(())
    }

    /// Wait until the core has stopped
    pub async fn wait_stopped(&self) {
        let mut rx = self.stopped.subscribe();
        // the sender lives as long as `self`
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl std::fmt::Debug for Hautomate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hautomate")
            .field("state", &self.state())
            .field("clock", &self.clock)
            .field("bus", &self.bus)
            .finish()
    }
}
