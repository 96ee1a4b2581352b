//! Event-driven automation runtime
//!
//! [`Hautomate`] owns a virtual [`Clock`](hauto_core::Clock), an
//! [`EventBus`](hauto_event_bus::EventBus) and a registry of [`Api`]s. It
//! walks through its lifecycle announcing each step on the bus:
//!
//! ```text
//! INIT -> (starting) START -> (ready) READY ... (closing) CLOSE -> (stopped) STOP
//! ```
//!
//! # Example
//!
//! ```ignore
//! use hauto::{Hautomate, HautoConfig};
//!
//! let core = Hautomate::new(HautoConfig::default())?;
//! let trigger = core.trigger()?;
//! core.register(trigger.on("doorbell").handler(ring).build()?);
//! core.run().await?;
//! ```

pub mod api;
pub mod apis;
mod hautomate;
mod runner;

pub use crate::api::{Api, ApiRegistry};
pub use crate::apis::moment::{EVT_TIME_SLIPPAGE, EVT_TIME_UPDATE};
pub use crate::apis::{Moment, MomentSpec, MomentaryCheck, Trigger};
pub use crate::hautomate::Hautomate;

pub use hauto_config::HautoConfig;
pub use hauto_core::{events, Context, EventName, HautoError, HautoResult, Parent, Payload};
pub use hauto_event_bus::{FireOutcome, WaitPolicy};
pub use hauto_intent::{Handler, Intent, IntentBuilder, RunStatus};
