//! YAML configuration for hautomate
//!
//! Configuration covers logging, the size of the blocking pool, and the
//! virtual clock. Values may be pulled from the environment with the
//! `!env_var NAME` tag.
//!
//! # Example
//!
//! ```ignore
//! use hauto_config::load_config;
//!
//! let config = load_config("hautomate.yaml")?;
//! let clock = config.moment.clock()?;
//! ```

mod config;
mod error;
mod loader;

pub use config::{HautoConfig, MomentConfig};
pub use error::{ConfigError, ConfigResult};
pub use loader::load_config;
