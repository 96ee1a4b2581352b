//! Event bus for hautomate
//!
//! The [`EventBus`] maps event names to the intents waiting on them. Firing
//! an event builds one [`Context`] per matching intent and dispatches each
//! pair on its own task through the installed [`IntentRunner`]. The caller
//! chooses how long to wait with a [`WaitPolicy`].
//!
//! Intents registered under the wildcard `*` see every event except the
//! lifecycle meta-events, so that listening to everything never feeds back
//! into an endless stream of notifications.

mod dispatch;
mod runner;

pub use dispatch::{CompletedRun, FireOutcome, PendingRun, WaitPolicy};
pub use runner::{BasicRunner, IntentRunner};

use dashmap::DashMap;
use hauto_core::{Clock, Context, EventName, Parent, Payload};
use hauto_intent::{Handler, Intent, IntentBuilder};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Anything that can be subscribed to an event
pub trait IntoIntent {
    fn into_intent(self, event: &EventName) -> Intent;
}

/// An intent is registered under the subscription's event name, even when it
/// was declared for another one; [`Intent::event`] keeps the declared name.
impl IntoIntent for Intent {
    fn into_intent(self, event: &EventName) -> Intent {
        if self.event() != event {
            warn!(
                intent = %self.id(),
                declared = %self.event(),
                subscribed = %event,
                "Subscribing intent under another event than it declares"
            );
        }
        self
    }
}

/// A bare handler becomes an intent with no checks and no limit
impl IntoIntent for Handler {
    fn into_intent(self, event: &EventName) -> Intent {
        IntentBuilder::new(event.clone()).handler(self).declare()
    }
}

/// The registry of intents and the dispatcher of firings
pub struct EventBus {
    registry: DashMap<EventName, Vec<Intent>>,
    runner: Arc<dyn IntentRunner>,
    clock: Clock,
}

impl EventBus {
    /// Create a bus that runs intents with [`BasicRunner`]
    pub fn new(clock: Clock) -> Self {
        Self::with_runner(clock, Arc::new(BasicRunner))
    }

    pub fn with_runner(clock: Clock, runner: Arc<dyn IntentRunner>) -> Self {
        Self {
            registry: DashMap::new(),
            runner,
            clock,
        }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Register an intent (or bare handler) for `event`
    ///
    /// Subscribing the same intent twice registers it twice. `event` decides
    /// which firings reach the intent, whatever event it was declared for.
    pub fn subscribe(&self, event: impl Into<EventName>, intent: impl IntoIntent) -> Intent {
        let event = event.into();
        let intent = intent.into_intent(&event);
        debug!(event = %event, intent = %intent.id(), "Subscribing intent");

        self.registry
            .entry(event)
            .or_default()
            .push(intent.clone());
        intent
    }

    /// Remove every registration of `intent`
    ///
    /// Returns whether anything was removed.
    pub fn unsubscribe(&self, intent: &Intent) -> bool {
        let mut removed = false;
        for mut entry in self.registry.iter_mut() {
            let before = entry.len();
            entry.retain(|registered| registered != intent);
            removed |= entry.len() != before;
        }
        self.registry.retain(|_, intents| !intents.is_empty());

        if removed {
            debug!(intent = %intent.id(), "Unsubscribed intent");
        }
        removed
    }

    /// Intents registered for exactly `event`
    pub fn intents(&self, event: impl Into<EventName>) -> Vec<Intent> {
        self.registry
            .get(&event.into())
            .map(|intents| intents.clone())
            .unwrap_or_default()
    }

    /// Number of distinct event names with at least one intent
    pub fn event_count(&self) -> usize {
        self.registry.len()
    }

    fn matching(&self, event: &EventName) -> Vec<Intent> {
        let mut intents = self.intents(event.clone());
        if !event.is_meta() && !event.is_any() {
            intents.extend(self.intents(EventName::any()));
        }
        intents
    }

    /// Dispatch `event` to its intents without waiting for any of them
    ///
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(
        &self,
        event: impl Into<EventName>,
        parent: Parent,
        payload: Payload,
    ) -> Vec<PendingRun> {
        let event = event.into();
        let intents = self.matching(&event);
        let when = self.clock.now();

        debug!(event = %event, %parent, intents = intents.len(), "Firing event");

        intents
            .into_iter()
            .map(|intent| {
                let ctx = Context::new(
                    event.clone(),
                    payload.clone(),
                    intent.id(),
                    parent.clone(),
                    when,
                    self.clock,
                );
                trace!(event = %event, intent = %intent.id(), context = %ctx.id(), "Dispatching");

                let runner = self.runner.clone();
                let task_intent = intent.clone();
                let handle = tokio::spawn(async move { runner.run(task_intent, ctx).await });
                PendingRun::new(intent, handle)
            })
            .collect()
    }

    /// Fire `event` and wait for its intents according to `wait`
    ///
    /// With `wait = None` nothing is awaited: every dispatched intent comes
    /// back in `pending`.
    pub async fn fire(
        &self,
        event: impl Into<EventName>,
        parent: Parent,
        wait: Option<WaitPolicy>,
        payload: Payload,
    ) -> FireOutcome {
        let runs = self.dispatch(event, parent, payload);
        match wait {
            None => FireOutcome {
                done: Vec::new(),
                pending: runs,
            },
            Some(policy) => dispatch::wait(runs, policy).await,
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.registry.len())
            .finish()
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus = Arc<EventBus>;
