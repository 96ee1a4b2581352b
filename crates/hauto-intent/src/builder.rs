//! Builder for [`Intent`]

use hauto_check::{Check, Cooldown};
use hauto_core::{EventName, HautoError, HautoResult};

use crate::intent::{Handler, Intent};

/// Collects the configuration of an intent
///
/// Finish with [`IntentBuilder::build`] when the body is known up front, or
/// with [`IntentBuilder::declare`] to create the intent first and
/// [`Intent::bind`] a body later.
#[derive(Debug)]
pub struct IntentBuilder {
    event: EventName,
    checks: Vec<Check>,
    cooldown: Option<Cooldown>,
    limit: Option<u64>,
    handler: Option<Handler>,
}

impl IntentBuilder {
    pub fn new(event: impl Into<EventName>) -> Self {
        Self {
            event: event.into(),
            checks: Vec::new(),
            cooldown: None,
            limit: None,
            handler: None,
        }
    }

    pub fn check(mut self, check: impl Into<Check>) -> Self {
        self.checks.push(check.into());
        self
    }

    pub fn checks<I, C>(mut self, checks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Check>,
    {
        self.checks.extend(checks.into_iter().map(Into::into));
        self
    }

    pub fn cooldown(mut self, cooldown: Cooldown) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    /// Run at most `limit` times; zero means unlimited
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    pub fn handler(mut self, handler: Handler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Build a ready intent
    pub fn build(self) -> HautoResult<Intent> {
        if self.handler.is_none() {
            return Err(HautoError::config(format!(
                "intent for '{}' has no handler; use declare() to bind one later",
                self.event
            )));
        }
        Ok(self.declare())
    }

    /// Build the intent, bound only if a handler was given
    pub fn declare(self) -> Intent {
        Intent::assemble(
            self.event,
            self.checks,
            self.cooldown,
            self.limit,
            self.handler,
        )
    }
}
