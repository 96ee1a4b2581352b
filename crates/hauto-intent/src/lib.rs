//! Intents for hautomate
//!
//! An [`Intent`] pairs an event name with a body, the [`Check`]s that
//! gate it, an optional [`Cooldown`] and a run limit. Intents move through
//! a small state machine:
//!
//! ```text
//! INITIALIZED --bind--> READY <--pause/unpause--> PAUSED
//!                         \                        /
//!                          +-----> CANCELLED <----+
//! ```
//!
//! [`Check`]: hauto_check::Check
//! [`Cooldown`]: hauto_check::Cooldown

mod builder;
mod intent;

pub use builder::IntentBuilder;
pub use intent::{Handler, Intent, RunStatus};
