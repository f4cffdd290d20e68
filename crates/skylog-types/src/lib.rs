//! Shared types for skylog weather sample histories.
//!
//! This crate holds the data model used by both the store and the service
//! layer, with no I/O of its own.
//!
//! # Features
//!
//! - [`SampleRecord`], an immutable timestamped observation in Kelvin
//! - [`EntityKey`], the normalized per-entity identifier
//! - [`TemperatureUnit`] and read-time unit conversion
//! - [`WindowStatistics`] derived over a retention window
//! - [`Thresholds`] for upper/lower temperature alerts
//!
//! # Example
//!
//! ```
//! use skylog_types::{EntityKey, SampleRecord, TemperatureUnit};
//! use time::OffsetDateTime;
//!
//! let key = EntityKey::new("Kolkata")?;
//! let sample = SampleRecord::new(OffsetDateTime::now_utc(), 302.4).with_category("haze");
//! let celsius = sample.value_in(TemperatureUnit::Celsius);
//! # let _ = (key, celsius);
//! # Ok::<(), skylog_types::ParseError>(())
//! ```

pub mod error;
pub mod thresholds;
pub mod types;
pub mod unit;

pub use error::{ParseError, ParseResult};
pub use thresholds::{ThresholdAlert, Thresholds};
pub use types::{EntityKey, SampleRecord, WindowStatistics};
pub use unit::TemperatureUnit;
