//! Trigger API: intents keyed on event names

use dashmap::DashMap;
use hauto_asyncable::Asyncable;
use hauto_check::Check;
use hauto_core::events::EVT_ANY;
use hauto_core::{Context, EventName, HautoError, HautoResult};
use hauto_intent::{Handler, IntentBuilder};
use regex::RegexBuilder;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::api::Api;
use crate::hautomate::Hautomate;

const WAITER_CAPACITY: usize = 16;

type Waiters = DashMap<EventName, broadcast::Sender<Context>>;

/// Builds intents for events, and waits on them
#[derive(Debug, Default)]
pub struct Trigger {
    waiters: Arc<Waiters>,
}

impl Trigger {
    pub const NAME: &'static str = "trigger";

    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for a specific event
    pub fn on(&self, event: impl Into<EventName>) -> IntentBuilder {
        IntentBuilder::new(event)
    }

    /// Listen for any of several events
    pub fn any<I, S>(&self, events: I) -> HautoResult<IntentBuilder>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternatives: Vec<String> = events
            .into_iter()
            .map(|event| regex::escape(EventName::new(event).as_str()))
            .collect();
        if alternatives.is_empty() {
            return Err(HautoError::config("any() needs at least one event name"));
        }
        self.re_match(&alternatives.join("|"))
    }

    /// Listen for events whose name begins with `part`
    pub fn startswith(&self, part: &str) -> HautoResult<IntentBuilder> {
        self.re_match(&format!("{}.*", regex::escape(part)))
    }

    /// Listen for events whose name ends with `part`
    pub fn endswith(&self, part: &str) -> HautoResult<IntentBuilder> {
        self.re_match(&format!(".*{}", regex::escape(part)))
    }

    /// Listen for events whose name contains `mid`
    pub fn contains(&self, mid: &str) -> HautoResult<IntentBuilder> {
        self.re_match(&format!(".*{}.*", regex::escape(mid)))
    }

    /// Listen for events whose whole name matches `pattern`, ignoring case
    pub fn re_match(&self, pattern: &str) -> HautoResult<IntentBuilder> {
        let regex = RegexBuilder::new(&format!("^(?:{pattern})$"))
            .case_insensitive(true)
            .build()
            .map_err(|e| HautoError::config(format!("invalid event pattern '{pattern}': {e}")))?;

        let check = Check::new(move |ctx| Ok(regex.is_match(ctx.event().as_str())))
            .named(format!("re_match({pattern})"));
        Ok(IntentBuilder::new(EVT_ANY).check(check))
    }

    /// Wait for the next firing of `event`
    ///
    /// Giving up after `timeout` only drops this waiter; others waiting on
    /// the same event are unaffected.
    pub async fn wait_for(
        &self,
        event: impl Into<EventName>,
        timeout: Option<Duration>,
    ) -> HautoResult<Context> {
        let event = event.into();
        let rx = self
            .waiters
            .entry(event.clone())
            .or_insert_with(|| broadcast::channel(WAITER_CAPACITY).0)
            .subscribe();
        let mut waiter = Waiter {
            rx: Some(rx),
            waiters: &self.waiters,
            event: event.clone(),
        };

        trace!(event = %event, "Waiting for event");
        match timeout {
            Some(after) => tokio::time::timeout(after, waiter.next())
                .await
                .map_err(|_| HautoError::Timeout {
                    event: event.to_string(),
                    after,
                })?,
            None => waiter.next().await,
        }
    }

    /// Number of events someone is currently waiting on
    pub fn waiting(&self) -> usize {
        self.waiters.len()
    }

    fn notify(waiters: &Waiters, ctx: Context) {
        let event = ctx.event().clone();
        if let Some(tx) = waiters.get(&event) {
            let woken = tx.send(ctx).unwrap_or(0);
            debug!(event = %event, woken, "Woke event waiters");
        }
        waiters.remove_if(&event, |_, tx| tx.receiver_count() == 0);
    }
}

/// One caller of [`Trigger::wait_for`]
///
/// Leaving prunes the event's sender once nobody else is waiting on it.
struct Waiter<'a> {
    rx: Option<broadcast::Receiver<Context>>,
    waiters: &'a Waiters,
    event: EventName,
}

impl Waiter<'_> {
    async fn next(&mut self) -> HautoResult<Context> {
        let Some(rx) = self.rx.as_mut() else {
            return Err(HautoError::Invocation(format!(
                "waiter for '{}' already left",
                self.event
            )));
        };
        loop {
            match rx.recv().await {
                Ok(ctx) => return Ok(ctx),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(HautoError::Invocation(format!(
                        "waiters for '{}' were dropped",
                        self.event
                    )))
                }
            }
        }
    }
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        self.rx = None;
        self.waiters
            .remove_if(&self.event, |_, tx| tx.receiver_count() == 0);
    }
}

impl Api for Trigger {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn attach(&self, core: &Arc<Hautomate>) -> HautoResult<()> {
        let waiters = self.waiters.clone();
        let listener: Handler = Asyncable::safe_sync(move |ctx: Context| {
            Trigger::notify(&waiters, ctx);
            Ok(())
        });
        core.subscribe(EVT_ANY, listener);
        Ok(())
    }
}
