//! Per-city temperature history with rolling window statistics.
//!
//! This crate provides a service that:
//! - Records timestamped temperature samples per city
//! - Persists each city's history durably before acknowledging a sample
//! - Prunes samples that fall outside the retention window
//! - Reports max, min, mean and the dominant weather condition over the window
//! - Flags samples that cross configured alert bounds
//!
//! Samples are stored in Kelvin; statistics are converted to the requested
//! display unit.
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/skylog/service.toml`:
//!
//! ```toml
//! [storage]
//! path = "~/.local/share/skylog/history"
//!
//! [retention]
//! window_secs = 86400
//! housekeeping_interval_secs = 600 # 0 disables background pruning
//!
//! [display]
//! unit = "celsius"
//!
//! [alerts]
//! lower = -10.0
//! upper = 40.0
//! unit = "celsius"
//! ```

pub mod config;
pub mod housekeeping;
pub mod service;

pub use config::{
    Config, ConfigError, DisplayConfig, RetentionConfig, StorageConfig, ValidationError,
};
pub use housekeeping::spawn_housekeeping;
pub use service::{AggregationService, RecordOutcome};
