//! Runtime configuration
//!
//! ```yaml
//! log_level: debug
//! worker_threads: 8
//! moment:
//!   resolution: 1.0
//!   speed: 2.0
//!   epoch: 2020-01-01T00:00:00Z
//!   slippage_tolerance: 0.1
//! ```

use chrono::{DateTime, Utc};
use hauto_core::clock::{DEFAULT_RESOLUTION, DEFAULT_SLIPPAGE_TOLERANCE};
use hauto_core::{Clock, HautoResult};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Top-level configuration of a hautomate instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HautoConfig {
    /// Default tracing filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Upper bound on threads running blocking handlers
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    #[serde(default)]
    pub moment: MomentConfig,
}

/// Clock and ticking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MomentConfig {
    /// Real seconds between `TIME_UPDATE` ticks
    #[serde(default = "default_resolution")]
    pub resolution: f64,

    /// Virtual seconds per real second
    #[serde(default = "default_speed")]
    pub speed: f64,

    /// Virtual start time, defaults to the moment the clock is built
    #[serde(default)]
    pub epoch: Option<DateTime<Utc>>,

    /// Extra lag, in seconds, tolerated between ticks
    #[serde(default = "default_slippage_tolerance")]
    pub slippage_tolerance: f64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_worker_threads() -> usize {
    8
}

fn default_resolution() -> f64 {
    DEFAULT_RESOLUTION
}

fn default_speed() -> f64 {
    1.0
}

fn default_slippage_tolerance() -> f64 {
    DEFAULT_SLIPPAGE_TOLERANCE
}

impl Default for HautoConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            worker_threads: default_worker_threads(),
            moment: MomentConfig::default(),
        }
    }
}

impl Default for MomentConfig {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            speed: default_speed(),
            epoch: None,
            slippage_tolerance: default_slippage_tolerance(),
        }
    }
}

impl HautoConfig {
    /// Check values serde cannot
    pub fn validate(&self) -> ConfigResult<()> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::invalid("log_level", "must not be empty"));
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::invalid("worker_threads", "must be at least 1"));
        }
        self.moment.validate()
    }
}

impl MomentConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(ConfigError::invalid(
                "moment.resolution",
                format!("must be positive, got {}", self.resolution),
            ));
        }
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(ConfigError::invalid(
                "moment.speed",
                format!("must be positive, got {}", self.speed),
            ));
        }
        if !(self.slippage_tolerance.is_finite() && self.slippage_tolerance >= 0.0) {
            return Err(ConfigError::invalid(
                "moment.slippage_tolerance",
                format!("must not be negative, got {}", self.slippage_tolerance),
            ));
        }
        Ok(())
    }

    /// Build the clock this configuration describes, starting now
    pub fn clock(&self) -> HautoResult<Clock> {
        let clock = Clock::new(self.resolution, self.speed)?
            .with_slippage_tolerance(self.slippage_tolerance);
        Ok(match self.epoch {
            Some(epoch) => clock.with_epoch(epoch),
            None => clock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HautoConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.moment.resolution, 1.0);
        assert_eq!(config.moment.speed, 1.0);
        assert_eq!(config.moment.slippage_tolerance, 0.1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = HautoConfig::default();
        config.worker_threads = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "worker_threads"
        ));

        let mut config = HautoConfig::default();
        config.moment.speed = 0.0;
        assert!(config.validate().is_err());

        let mut config = HautoConfig::default();
        config.moment.resolution = -1.0;
        assert!(config.validate().is_err());

        let mut config = HautoConfig::default();
        config.moment.slippage_tolerance = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clock_from_config() {
        let epoch: DateTime<Utc> = "2020-01-01T00:00:00Z".parse().unwrap();
        let moment = MomentConfig {
            speed: 2.0,
            epoch: Some(epoch),
            ..MomentConfig::default()
        };

        let clock = moment.clock().unwrap();
        assert_eq!(clock.speed(), 2.0);
        assert_eq!(clock.epoch(), epoch);
    }
}
