//! On-disk layout of an entity's history and migration from older layouts.
//!
//! Each entity is persisted as one JSON document:
//!
//! ```json
//! {"version": 1, "entity": "delhi", "samples": [
//!     {"timestamp": "2024-10-16T12:00:00Z", "value": 301.2, "category": "haze"}
//! ]}
//! ```
//!
//! Version 0 is the layout written by earlier tooling: a bare array of
//! `{"timestamp", "temp_k", "condition"}` objects with naive UTC timestamps.
//! It is read transparently and rewritten in the current layout on the next
//! mutation.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use skylog_types::{EntityKey, SampleRecord};

use crate::error::{Error, Result};
use crate::history::EntityHistory;

/// Current layout version.
pub const LAYOUT_VERSION: u32 = 1;

#[derive(Serialize)]
struct PersistedHistoryRef<'a> {
    version: u32,
    entity: &'a str,
    samples: &'a [SampleRecord],
}

#[derive(Deserialize)]
struct PersistedHistory {
    version: u32,
    #[serde(default)]
    samples: Vec<SampleRecord>,
}

#[derive(Deserialize)]
struct LegacySample {
    #[serde(deserialize_with = "legacy_timestamp")]
    timestamp: OffsetDateTime,
    temp_k: f64,
    #[serde(default)]
    condition: Option<String>,
}

impl From<LegacySample> for SampleRecord {
    fn from(legacy: LegacySample) -> Self {
        let sample = SampleRecord::new(legacy.timestamp, legacy.temp_k);
        match legacy.condition {
            Some(condition) => sample.with_category(condition),
            None => sample,
        }
    }
}

/// Accepts RFC 3339 or a naive ISO-8601 timestamp, which is taken as UTC.
fn legacy_timestamp<'de, D>(deserializer: D) -> std::result::Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;

    if let Ok(ts) = OffsetDateTime::parse(&raw, &Rfc3339) {
        return Ok(ts);
    }

    let naive = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    PrimitiveDateTime::parse(&raw, naive)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{raw}': {e}")))
}

/// A history read back from disk.
#[derive(Debug)]
pub struct Decoded {
    /// The ordered samples.
    pub history: EntityHistory,
    /// Layout version found on disk.
    pub version: u32,
}

impl Decoded {
    /// Whether the file predates the current layout.
    pub fn needs_migration(&self) -> bool {
        self.version < LAYOUT_VERSION
    }
}

/// Serialize a history in the current layout.
pub fn encode(path: &Path, key: &EntityKey, samples: &[SampleRecord]) -> Result<Vec<u8>> {
    let doc = PersistedHistoryRef {
        version: LAYOUT_VERSION,
        entity: key.as_str(),
        samples,
    };
    serde_json::to_vec_pretty(&doc).map_err(|source| Error::Encoding {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a history file in any supported layout.
pub fn decode(path: &Path, bytes: &[u8]) -> Result<Decoded> {
    let encoding = |source| Error::Encoding {
        path: path.to_path_buf(),
        source,
    };

    let value: serde_json::Value = serde_json::from_slice(bytes).map_err(encoding)?;

    if value.is_array() {
        let legacy: Vec<LegacySample> = serde_json::from_value(value).map_err(encoding)?;
        let records = legacy.into_iter().map(SampleRecord::from).collect();
        return Ok(Decoded {
            history: EntityHistory::from_records(records),
            version: 0,
        });
    }

    let doc: PersistedHistory = serde_json::from_value(value).map_err(encoding)?;
    if doc.version > LAYOUT_VERSION {
        return Err(Error::UnsupportedLayout {
            path: path.to_path_buf(),
            version: doc.version,
        });
    }

    Ok(Decoded {
        history: EntityHistory::from_records(doc.samples),
        version: doc.version,
    })
}
