//! Core types for skylog sample histories.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

use crate::error::ParseError;
use crate::unit::TemperatureUnit;

/// Normalized identifier of an observed entity (for example a city).
///
/// Keys are trimmed and lowercased on construction so that `" Delhi "`,
/// `"delhi"` and `"DELHI"` all refer to the same history. Because the key
/// doubles as a file stem in durable storage, path separators, NUL bytes and
/// a leading `.` are rejected.
///
/// # Examples
///
/// ```
/// use skylog_types::EntityKey;
///
/// let key = EntityKey::new("  New Delhi ").unwrap();
/// assert_eq!(key.as_str(), "new delhi");
///
/// assert!(EntityKey::new("   ").is_err());
/// assert!(EntityKey::new("../etc").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct EntityKey(String);

impl EntityKey {
    /// Normalize and validate a raw entity name.
    pub fn new(raw: &str) -> Result<Self, ParseError> {
        let normalized = raw.trim().to_lowercase();

        let reason = if normalized.is_empty() {
            Some("key is empty")
        } else if normalized.starts_with('.') {
            Some("key must not start with '.'")
        } else if normalized.contains(['/', '\\', '\0']) {
            Some("key must not contain path separators")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(ParseError::InvalidEntity {
                key: raw.to_string(),
                reason,
            }),
            None => Ok(Self(normalized)),
        }
    }

    /// The normalized key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for EntityKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EntityKey {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl TryFrom<&str> for EntityKey {
    type Error = ParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityKey> for String {
    fn from(key: EntityKey) -> Self {
        key.0
    }
}

/// A single timestamped observation for one entity.
///
/// `value` is always held in the canonical unit (Kelvin). Conversion to a
/// display unit happens on read, see [`TemperatureUnit::convert`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SampleRecord {
    /// When the sample was observed (UTC).
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
    /// Measured value in the canonical unit.
    pub value: f64,
    /// Optional categorical label, such as a weather condition.
    #[cfg_attr(feature = "serde", serde(default))]
    pub category: Option<String>,
}

impl SampleRecord {
    /// Create a sample without a category. The timestamp is shifted to UTC.
    #[must_use]
    pub fn new(timestamp: OffsetDateTime, value: f64) -> Self {
        Self {
            timestamp: timestamp.to_offset(UtcOffset::UTC),
            value,
            category: None,
        }
    }

    /// Attach a category label. Blank labels are treated as absent.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        let trimmed = category.trim();
        self.category = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    /// The value expressed in `unit`.
    #[must_use]
    pub fn value_in(&self, unit: TemperatureUnit) -> f64 {
        unit.convert(self.value)
    }
}

/// Statistics derived from the in-window samples of one entity.
///
/// An empty window has no statistics at all; APIs return
/// `Option<WindowStatistics>` and use `None` for "no data".
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WindowStatistics {
    /// Unit that `max`, `min` and `mean` are expressed in.
    pub unit: TemperatureUnit,
    /// Largest value in the window.
    pub max: f64,
    /// Smallest value in the window.
    pub min: f64,
    /// Arithmetic mean of the converted values.
    pub mean: f64,
    /// Most frequent category, ties going to the one seen first.
    pub dominant_category: Option<String>,
    /// Number of samples in the window.
    pub sample_count: usize,
    /// Timestamp of the oldest sample in the window.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub oldest: OffsetDateTime,
    /// Timestamp of the newest sample in the window.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub newest: OffsetDateTime,
}
