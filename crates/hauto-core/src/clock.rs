//! Virtual clock
//!
//! Time inside hautomate is virtual: it starts at an `epoch` and advances at
//! `speed` virtual seconds per real second. Every time-based check reads the
//! clock through the firing's [`Context`](crate::Context), so the whole
//! runtime can be sped up or anchored in the past for testing.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{HautoError, HautoResult};

/// Default seconds between `TIME_UPDATE` ticks
pub const DEFAULT_RESOLUTION: f64 = 1.0;

/// Default extra lag tolerated between ticks before `TIME_SLIPPAGE` fires
pub const DEFAULT_SLIPPAGE_TOLERANCE: f64 = 0.1;

/// Direction of a time conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    /// Virtual seconds to real seconds
    ToReal,
    /// Real seconds to virtual seconds
    ToVirtual,
}

/// Monotonic, scalable time source
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    resolution: f64,
    speed: f64,
    slippage_tolerance: f64,
    epoch: DateTime<Utc>,
    anchor: Instant,
}

impl Clock {
    /// Create a clock starting now, at the given tick resolution and speed
    pub fn new(resolution: f64, speed: f64) -> HautoResult<Self> {
        if !(speed.is_finite() && speed > 0.0) {
            return Err(HautoError::config(format!(
                "clock speed must be positive, got {speed}"
            )));
        }
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(HautoError::config(format!(
                "clock resolution must be positive, got {resolution}"
            )));
        }

        Ok(Self {
            resolution,
            speed,
            slippage_tolerance: DEFAULT_SLIPPAGE_TOLERANCE,
            epoch: Utc::now(),
            anchor: Instant::now(),
        })
    }

    /// A realtime clock with default resolution
    pub fn realtime() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            speed: 1.0,
            slippage_tolerance: DEFAULT_SLIPPAGE_TOLERANCE,
            epoch: Utc::now(),
            anchor: Instant::now(),
        }
    }

    /// Start virtual time at a specific instant
    pub fn with_epoch(mut self, epoch: DateTime<Utc>) -> Self {
        self.epoch = epoch;
        self
    }

    /// Set the tolerated tick lag, in seconds
    pub fn with_slippage_tolerance(mut self, tolerance: f64) -> Self {
        self.slippage_tolerance = tolerance.max(0.0);
        self
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    pub fn slippage_tolerance(&self) -> f64 {
        self.slippage_tolerance
    }

    /// Current virtual time
    ///
    /// Saturates at the latest representable instant instead of overflowing.
    pub fn now(&self) -> DateTime<Utc> {
        let virtual_secs = self.anchor.elapsed().as_secs_f64() * self.speed;
        // float to int casts saturate at i64::MAX
        let elapsed = chrono::Duration::microseconds((virtual_secs * 1_000_000.0) as i64);
        self.epoch
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Convert seconds between real and virtual time
    pub fn scale(&self, seconds: f64, to: Scale) -> f64 {
        match to {
            Scale::ToReal => seconds / self.speed,
            Scale::ToVirtual => seconds * self.speed,
        }
    }

    /// [`Clock::scale`] for durations, clamped at zero
    pub fn scale_duration(&self, duration: Duration, to: Scale) -> Duration {
        Duration::from_secs_f64(self.scale(duration.as_secs_f64(), to).max(0.0))
    }

    /// The virtual distance covered by one tick
    pub fn tick_window(&self) -> f64 {
        self.resolution * self.speed
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::realtime()
    }
}
