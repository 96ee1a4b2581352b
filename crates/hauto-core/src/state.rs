//! Lifecycle states for the core and for intents

use serde::{Deserialize, Serialize};
use std::fmt;

/// Current state of the orchestrator
///
/// The only legal path is
/// `Initialized -> Starting -> Ready -> Closing -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoreState {
    Initialized,
    Starting,
    Ready,
    Closing,
    Stopped,
}

impl CoreState {
    /// The state that must follow this one, if any
    pub fn next(self) -> Option<CoreState> {
        match self {
            CoreState::Initialized => Some(CoreState::Starting),
            CoreState::Starting => Some(CoreState::Ready),
            CoreState::Ready => Some(CoreState::Closing),
            CoreState::Closing => Some(CoreState::Stopped),
            CoreState::Stopped => None,
        }
    }

    /// Whether `to` directly follows this state
    pub fn can_transition_to(self, to: CoreState) -> bool {
        self.next() == Some(to)
    }

    /// Startup and shutdown phases, where intent notifications are muted
    pub fn is_transitional(self) -> bool {
        matches!(self, CoreState::Starting | CoreState::Closing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CoreState::Initialized => "INITIALIZED",
            CoreState::Starting => "STARTING",
            CoreState::Ready => "READY",
            CoreState::Closing => "CLOSING",
            CoreState::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for CoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state of an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentState {
    /// Declared but not yet bound to a handler
    Initialized,
    Ready,
    Paused,
    /// Terminal
    Cancelled,
}

impl fmt::Display for IntentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntentState::Initialized => "INITIALIZED",
            IntentState::Ready => "READY",
            IntentState::Paused => "PAUSED",
            IntentState::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}
