//! Event names, payloads and causal parents

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::events::{EVT_ANY, META_EVENTS};

/// Data carried by a fired event
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Event name identifier, always normalized to uppercase
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct EventName(String);

impl EventName {
    /// Create a new event name
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_uppercase())
    }

    /// Get the event name as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The wildcard name that matches every non-meta event
    pub fn any() -> Self {
        Self(EVT_ANY.to_string())
    }

    /// Check if this is the wildcard name
    pub fn is_any(&self) -> bool {
        self.0 == EVT_ANY
    }

    /// Check if this is a reserved lifecycle notification
    pub fn is_meta(&self) -> bool {
        META_EVENTS.contains(&self.0.as_str())
    }
}

impl From<&str> for EventName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EventName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&String> for EventName {
    fn from(s: &String) -> Self {
        Self::new(s)
    }
}

impl From<EventName> for String {
    fn from(name: EventName) -> String {
        name.0
    }
}

impl PartialEq<str> for EventName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for EventName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static NEXT_INTENT_ID: AtomicU64 = AtomicU64::new(0);

/// Unique identifier of an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntentId(u64);

impl IntentId {
    /// Allocate the next process-wide intent id
    pub fn next() -> Self {
        Self(NEXT_INTENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "intent-{}", self.0)
    }
}

/// Whoever caused a firing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum Parent {
    /// The orchestrator itself (lifecycle meta-events)
    Core,
    /// Another intent, from within its body
    Intent(IntentId),
    /// A registered API
    Api(String),
    /// Anything outside the runtime: platform bridges, tests, the CLI
    External(String),
}

impl Parent {
    pub fn external(name: impl Into<String>) -> Self {
        Parent::External(name.into())
    }

    pub fn api(name: impl Into<String>) -> Self {
        Parent::Api(name.into())
    }
}

impl fmt::Display for Parent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parent::Core => f.write_str("CORE:Hautomate"),
            Parent::Intent(id) => write!(f, "{id}"),
            Parent::Api(name) => write!(f, "API:{name}"),
            Parent::External(name) => f.write_str(name),
        }
    }
}
