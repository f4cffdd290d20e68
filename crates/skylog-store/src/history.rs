//! In-memory ordered sample log for a single entity.

use time::{Duration, OffsetDateTime};

use skylog_types::SampleRecord;

/// Start of the retention window ending at `now`.
///
/// Samples with `timestamp >= window_start(now, window)` are in the window.
pub fn window_start(now: OffsetDateTime, window: Duration) -> OffsetDateTime {
    now.saturating_sub(window)
}

/// Samples for one entity, ordered by timestamp ascending.
///
/// Samples sharing a timestamp keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityHistory {
    records: Vec<SampleRecord>,
}

impl EntityHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from records in any order.
    ///
    /// The sort is stable, so records with equal timestamps keep the order
    /// they were given in.
    pub fn from_records(mut records: Vec<SampleRecord>) -> Self {
        records.sort_by_key(|r| r.timestamp);
        Self { records }
    }

    /// Insert a sample at its sorted position.
    ///
    /// Samples usually arrive in time order and are pushed at the tail. A
    /// late sample (clock skew, backfill) is placed after every existing
    /// sample with the same or an earlier timestamp.
    ///
    /// Returns the index the sample was stored at.
    pub fn insert(&mut self, sample: SampleRecord) -> usize {
        match self.records.last() {
            Some(last) if last.timestamp > sample.timestamp => {
                let pos = self
                    .records
                    .partition_point(|r| r.timestamp <= sample.timestamp);
                self.records.insert(pos, sample);
                pos
            }
            _ => {
                self.records.push(sample);
                self.records.len() - 1
            }
        }
    }

    /// Undo an [`insert`](Self::insert) at `pos`.
    pub(crate) fn remove(&mut self, pos: usize) -> SampleRecord {
        self.records.remove(pos)
    }

    /// Number of leading samples older than `cutoff`.
    pub fn stale_count(&self, cutoff: OffsetDateTime) -> usize {
        self.records.partition_point(|r| r.timestamp < cutoff)
    }

    /// Drop every sample older than `cutoff`. Returns how many were removed.
    pub fn prune_before(&mut self, cutoff: OffsetDateTime) -> usize {
        let stale = self.stale_count(cutoff);
        self.records.drain(..stale);
        stale
    }

    /// Drop every sample outside the window ending at `now`.
    pub fn prune(&mut self, now: OffsetDateTime, window: Duration) -> usize {
        self.prune_before(window_start(now, window))
    }

    /// The ordered samples.
    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the history has no samples.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume the history, returning the ordered samples.
    pub fn into_records(self) -> Vec<SampleRecord> {
        self.records
    }
}
