//! Error taxonomy shared by every hautomate crate

use std::time::Duration;
use thiserror::Error;

use crate::state::CoreState;

/// Result type for hautomate operations
pub type HautoResult<T> = Result<T, HautoError>;

/// A predicate deliberately refused admission and said why
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("check '{check}' rejected: {reason}")]
pub struct CheckError {
    /// Name (or description) of the check that raised
    pub check: String,
    /// Reason supplied by the predicate
    pub reason: String,
}

impl CheckError {
    pub fn new(check: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the runtime
#[derive(Debug, Clone, Error)]
pub enum HautoError {
    /// Malformed check, cooldown or intent construction
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A predicate signalled rejection through an error
    #[error(transparent)]
    Check(#[from] CheckError),

    /// A predicate or handler is broken (it panicked)
    #[error("defect in {origin}: {message}")]
    Defect { origin: String, message: String },

    /// Lookup of an unregistered API, intent or other named item
    #[error("{kind} '{name}' does not exist")]
    NotFound { kind: &'static str, name: String },

    /// A waiter gave up
    #[error("timed out after {after:?} waiting for '{event}'")]
    Timeout { event: String, after: Duration },

    /// A lifecycle transition that skips or reverses a state
    #[error("invalid lifecycle transition {from} -> {to}")]
    InvalidTransition { from: CoreState, to: CoreState },

    /// The scheduler could not run a call
    #[error("invocation failed: {0}")]
    Invocation(String),
}

impl HautoError {
    /// Shorthand for [`HautoError::Configuration`]
    pub fn config(message: impl Into<String>) -> Self {
        HautoError::Configuration(message.into())
    }

    /// Shorthand for [`HautoError::NotFound`]
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        HautoError::NotFound {
            kind,
            name: name.into(),
        }
    }
}
