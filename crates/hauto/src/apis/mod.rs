//! Built-in APIs
//!
//! - [`Trigger`] - intents on event names and patterns, waiting for events
//! - [`Moment`] - the virtual clock's heartbeat and time-based intents

pub mod moment;
pub mod trigger;

pub use moment::{Moment, MomentSpec, MomentaryCheck};
pub use trigger::Trigger;
