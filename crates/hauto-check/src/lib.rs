//! Admission checks for intents
//!
//! Before an intent body runs, its [`Check`]s are evaluated concurrently
//! against the firing [`Context`](hauto_core::Context). If every check
//! admits, the intent's optional [`Cooldown`] gets the final say.
//!
//! # Key Types
//!
//! - [`Check`] - A predicate over the firing context
//! - [`Cooldown`] - Rate limiting, either [`Throttle`] or [`Debounce`]
//! - [`EntityCheck`], [`ValueCheck`] - Payload matchers
//! - [`all_checks_pass`] - The admission pipeline

pub mod check;
pub mod cooldown;
pub mod matchers;
mod pipeline;

pub use check::{Check, CheckResult, Predicate};
pub use cooldown::{Cooldown, CooldownConfig, CooldownKind, Debounce, Edge, Throttle};
pub use matchers::{split_entity_id, EntityCheck, ValueCheck};
pub use pipeline::all_checks_pass;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Utc};
    use hauto_core::{Clock, Context, IntentId, Parent, Payload};
    use serde_json::Value;

    pub fn ctx_named(event: &str) -> Context {
        let clock = Clock::realtime();
        Context::new(
            event,
            Payload::new(),
            IntentId::next(),
            Parent::external("test"),
            clock.now(),
            clock,
        )
    }

    pub fn ctx_at(when: DateTime<Utc>) -> Context {
        Context::new(
            "DUMMY",
            Payload::new(),
            IntentId::next(),
            Parent::external("test"),
            when,
            Clock::realtime(),
        )
    }

    pub fn ctx_with(payload: Value) -> Context {
        let payload = match payload {
            Value::Object(map) => map,
            _ => Payload::new(),
        };
        let clock = Clock::realtime();
        Context::new(
            "STATE_CHANGED",
            payload,
            IntentId::next(),
            Parent::external("test"),
            clock.now(),
            clock,
        )
    }
}
