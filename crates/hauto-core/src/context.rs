//! Context type describing why and when an intent is being invoked

use chrono::{DateTime, Utc};
use ulid::Ulid;

use crate::clock::Clock;
use crate::event::{EventName, IntentId, Parent, Payload};

/// Execution context under which an intent fires
///
/// A fresh Context is built for every (event, intent) pair at fire time.
/// It is immutable, and no two Contexts ever compare equal, even when built
/// from identical inputs.
#[derive(Debug, Clone)]
pub struct Context {
    id: Ulid,
    event: EventName,
    payload: Payload,
    target: IntentId,
    parent: Parent,
    when: DateTime<Utc>,
    created_at: DateTime<Utc>,
    clock: Clock,
}

impl Context {
    /// Create a context for `target`, fired at virtual time `when`
    pub fn new(
        event: impl Into<EventName>,
        payload: Payload,
        target: IntentId,
        parent: Parent,
        when: DateTime<Utc>,
        clock: Clock,
    ) -> Self {
        Self {
            id: Ulid::new(),
            event: event.into(),
            payload,
            target,
            parent,
            when,
            created_at: clock.now(),
            clock,
        }
    }

    /// Unique identifier for this context
    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn event(&self) -> &EventName {
        &self.event
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Look up a single payload value
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.payload.get(key)
    }

    /// The intent being invoked
    pub fn target(&self) -> IntentId {
        self.target
    }

    pub fn parent(&self) -> &Parent {
        &self.parent
    }

    /// Virtual time of the firing this context describes
    pub fn when(&self) -> DateTime<Utc> {
        self.when
    }

    /// Virtual time at which this context was built
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The clock of the runtime that fired this context
    pub fn clock(&self) -> &Clock {
        &self.clock
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Context {}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(when: DateTime<Utc>) -> Context {
        Context::new(
            "DUMMY",
            Payload::new(),
            IntentId::next(),
            Parent::external("test"),
            when,
            Clock::realtime(),
        )
    }

    #[test]
    fn test_contexts_are_never_alike() {
        let now = Utc::now();
        let left = build(now);
        let right = build(now);
        assert_ne!(left, right);
        assert_ne!(left.id(), right.id());
        assert_eq!(left.when(), right.when());
    }

    #[test]
    fn test_accessors() {
        let now = Utc::now() - chrono::Duration::seconds(7);
        let mut payload = Payload::new();
        payload.insert("entity_id".into(), serde_json::json!("light.kitchen"));

        let ctx = Context::new(
            "state_changed",
            payload,
            IntentId::next(),
            Parent::Core,
            now,
            Clock::realtime(),
        );

        assert_eq!(ctx.event(), "STATE_CHANGED");
        assert_eq!(ctx.get("entity_id"), Some(&serde_json::json!("light.kitchen")));
        assert_eq!(ctx.when(), now);
        assert!(ctx.created_at() >= now);
        assert_eq!(ctx.parent(), &Parent::Core);
    }
}
