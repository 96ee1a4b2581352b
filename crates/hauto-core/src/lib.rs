//! Core types for hautomate
//!
//! This crate provides the fundamental types shared by every other crate in
//! the workspace: the firing [`Context`], [`EventName`] and [`Payload`], the
//! virtual [`Clock`], lifecycle states, and the [`HautoError`] taxonomy.

pub mod clock;
mod context;
mod error;
mod event;
mod state;

pub use clock::{Clock, Scale};
pub use context::Context;
pub use error::{CheckError, HautoError, HautoResult};
pub use event::{EventName, IntentId, Parent, Payload};
pub use state::{CoreState, IntentState};

/// Reserved event names
pub mod events {
    /// Wildcard: intents subscribed here see every non-meta event
    pub const EVT_ANY: &str = "*";

    /// Internal initialization, APIs attach their listeners here
    pub const EVT_INIT: &str = "INIT";

    /// Core is starting, user-level handlers attach here
    pub const EVT_START: &str = "START";

    /// Core is ready to process events
    pub const EVT_READY: &str = "READY";

    /// A new intent was subscribed on the bus
    pub const EVT_INTENT_SUBSCRIBED: &str = "INTENT_SUBSCRIBED";

    /// An admitted intent is about to run its body
    pub const EVT_INTENT_START: &str = "INTENT_START";

    /// An intent body has finished
    pub const EVT_INTENT_END: &str = "INTENT_END";

    /// Core is closing
    pub const EVT_CLOSE: &str = "CLOSE";

    /// Core has stopped
    pub const EVT_STOP: &str = "STOP";

    /// Lifecycle notifications, never matched by [`EVT_ANY`]
    pub const META_EVENTS: &[&str] = &[
        EVT_INIT,
        EVT_START,
        EVT_READY,
        EVT_INTENT_SUBSCRIBED,
        EVT_INTENT_START,
        EVT_INTENT_END,
        EVT_CLOSE,
        EVT_STOP,
    ];
}
