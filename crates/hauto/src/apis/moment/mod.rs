//! Moment API: the clock's heartbeat and time-based intents
//!
//! Once the core is ready, `TIME_UPDATE` fires every `resolution` real
//! seconds. Time-based intents listen to it and gate themselves with a
//! [`MomentaryCheck`]. When a tick arrives noticeably late, `TIME_SLIPPAGE`
//! fires with the observed `lag`.

mod check;
mod spec;

pub use check::MomentaryCheck;
pub use spec::MomentSpec;

use chrono::{DateTime, Utc};
use hauto_asyncable::Asyncable;
use hauto_check::{Check, Cooldown};
use hauto_core::events::EVT_READY;
use hauto_core::{Clock, HautoError, HautoResult, Parent, Payload, Scale};
use hauto_intent::{Handler, IntentBuilder};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::api::Api;
use crate::hautomate::Hautomate;

/// Fired on every tick
pub const EVT_TIME_UPDATE: &str = "TIME_UPDATE";

/// Fired when a tick arrives later than the slippage tolerance allows
pub const EVT_TIME_SLIPPAGE: &str = "TIME_SLIPPAGE";

/// Absolute and relative dates and times
#[derive(Debug, Clone, Copy)]
pub struct Moment {
    clock: Clock,
}

impl Moment {
    pub const NAME: &'static str = "moment";

    pub fn new(clock: Clock) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Current virtual time
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Convert seconds between real and virtual time
    pub fn scale_time(&self, seconds: f64, to: Scale) -> f64 {
        self.clock.scale(seconds, to)
    }

    /// Run at a specific moment
    ///
    /// Absolute moments run once unless the builder's limit is changed;
    /// daily moments run every day.
    pub fn at(&self, moment: impl Into<MomentSpec>) -> IntentBuilder {
        let moment = moment.into();
        let builder =
            IntentBuilder::new(EVT_TIME_UPDATE).check(Check::custom(MomentaryCheck::new(moment)));
        if moment.is_absolute() {
            builder.limit(1)
        } else {
            builder
        }
    }

    /// Run once, `delay` of virtual time from now
    pub fn soon(&self, delay: Duration) -> HautoResult<IntentBuilder> {
        let at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|delay| self.now().checked_add_signed(delay))
            .ok_or_else(|| HautoError::config(format!("delay {delay:?} is out of range")))?;
        Ok(self.at(at))
    }

    /// Run every `delta` of virtual time, starting at `start` or right away
    pub fn every(
        &self,
        delta: Duration,
        start: Option<DateTime<Utc>>,
    ) -> HautoResult<IntentBuilder> {
        let throttle = Cooldown::throttle(delta.as_secs_f64(), 1.0)?;
        let builder = IntentBuilder::new(EVT_TIME_UPDATE).cooldown(throttle);
        Ok(match start {
            Some(start) => builder.check(Check::custom(MomentaryCheck::new(start))),
            None => builder,
        })
    }
}

impl Api for Moment {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn attach(&self, core: &Arc<Hautomate>) -> HautoResult<()> {
        let weak = Arc::downgrade(core);
        let on_ready: Handler = Asyncable::safe_sync(move |_ctx| {
            tokio::spawn(tick(weak.clone()));
            Ok(())
        });
        core.subscribe(EVT_READY, on_ready);
        Ok(())
    }
}

/// Heartbeat of a ready core
async fn tick(core: Weak<Hautomate>) {
    debug!("Starting clock ticks");

    loop {
        let (bus, clock) = match core.upgrade() {
            Some(core) if core.is_ready() => (core.bus().clone(), *core.clock()),
            _ => break,
        };

        bus.dispatch(EVT_TIME_UPDATE, Parent::api(Moment::NAME), Payload::new());

        let resolution = clock.resolution();
        let started = Instant::now();
        tokio::time::sleep(Duration::from_secs_f64(resolution)).await;
        let lag = started.elapsed().as_secs_f64();

        if lag > resolution + clock.slippage_tolerance() {
            warn!("lag of {:.6}s, {}ms", lag, (lag * 1000.0).round());
            let mut payload = Payload::new();
            payload.insert("lag".into(), lag.into());
            bus.dispatch(EVT_TIME_SLIPPAGE, Parent::api(Moment::NAME), payload);
        }
    }

    debug!("Stopped clock ticks");
}
