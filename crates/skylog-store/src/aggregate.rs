//! Window statistics over an entity's retained samples.
//!
//! [`aggregate`] is a pure function: it does no pruning of its own, so callers
//! pass the already-pruned in-window slice (see
//! [`EntityStore::prune`](crate::EntityStore::prune)).
//!
//! # Example
//!
//! ```
//! use skylog_store::aggregate;
//! use skylog_types::{SampleRecord, TemperatureUnit};
//! use time::OffsetDateTime;
//!
//! let now = OffsetDateTime::now_utc();
//! let samples = vec![
//!     SampleRecord::new(now, 283.15).with_category("rain"),
//!     SampleRecord::new(now, 293.15).with_category("clear"),
//!     SampleRecord::new(now, 303.15).with_category("rain"),
//! ];
//!
//! let stats = aggregate(&samples, TemperatureUnit::Celsius).unwrap();
//! assert!((stats.max - 30.0).abs() < 1e-9);
//! assert!((stats.mean - 20.0).abs() < 1e-9);
//! assert_eq!(stats.dominant_category.as_deref(), Some("rain"));
//!
//! assert!(aggregate(&[], TemperatureUnit::Celsius).is_none());
//! ```

use std::collections::HashMap;

use skylog_types::{SampleRecord, TemperatureUnit, WindowStatistics};

/// Compute statistics over `records`, with values converted to `unit`.
///
/// Values are converted before they are aggregated. Returns `None` for an
/// empty slice; an empty window has no statistics rather than zeroed ones.
pub fn aggregate(records: &[SampleRecord], unit: TemperatureUnit) -> Option<WindowStatistics> {
    let first = records.first()?;

    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;
    let mut sum = 0.0;
    let mut oldest = first.timestamp;
    let mut newest = first.timestamp;
    let mut categories = CategoryTally::default();

    for record in records {
        let value = unit.convert(record.value);
        max = max.max(value);
        min = min.min(value);
        sum += value;
        oldest = oldest.min(record.timestamp);
        newest = newest.max(record.timestamp);
        if let Some(category) = record.category.as_deref() {
            categories.add(category);
        }
    }

    Some(WindowStatistics {
        unit,
        max,
        min,
        mean: sum / records.len() as f64,
        dominant_category: categories.dominant().map(str::to_string),
        sample_count: records.len(),
        oldest,
        newest,
    })
}

/// Category counts with first-occurrence order, for a deterministic mode.
#[derive(Default)]
struct CategoryTally<'a> {
    // category -> (count, first position)
    counts: HashMap<&'a str, (usize, usize)>,
}

impl<'a> CategoryTally<'a> {
    fn add(&mut self, category: &'a str) {
        let next = self.counts.len();
        self.counts.entry(category).or_insert((0, next)).0 += 1;
    }

    /// Highest count wins; ties go to the category seen first.
    fn dominant(&self) -> Option<&'a str> {
        self.counts
            .iter()
            .min_by_key(|(_, (count, first))| (std::cmp::Reverse(*count), *first))
            .map(|(category, _)| *category)
    }
}
