//! Aggregation service: ingest, persist, prune and aggregate per entity.
//!
//! # Locking
//!
//! Each entity key gets its own `tokio::sync::Mutex`, created lazily the
//! first time the key is seen and never shared with another key. A `record`
//! call holds that lock for the whole append → prune → aggregate sequence,
//! so calls for the same entity are linearized while calls for different
//! entities run independently.
//!
//! The map from key to lock is itself behind a mutex, but that lock is only
//! held long enough to look up or insert a handle.
//!
//! There is no `.await` between taking an entity lock and finishing the
//! sequence. A `record` future dropped by a timeout has therefore either not
//! started the append or has completed it durably.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use tracing::debug;

use skylog_store::{EntityStore, Error, Result, Store, aggregate};
use skylog_types::{
    EntityKey, SampleRecord, TemperatureUnit, ThresholdAlert, Thresholds, WindowStatistics,
};

use crate::config::Config;

/// Lazily opened per-entity store, guarded by the entity's lock.
type EntityHandle = Arc<Mutex<Option<EntityStore>>>;

/// Result of recording one sample.
#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    /// Normalized entity key.
    pub entity: EntityKey,
    /// The sample that was just recorded, in the canonical unit.
    pub latest: SampleRecord,
    /// Statistics over the retained window, including `latest` when it falls
    /// inside the window. `None` when the window is empty.
    pub statistics: Option<WindowStatistics>,
    /// Unit the statistics are expressed in.
    pub unit: TemperatureUnit,
    /// Alert raised by the latest sample, if any.
    pub alert: Option<ThresholdAlert>,
}

impl RecordOutcome {
    /// The latest reading in the requested unit.
    pub fn latest_value(&self) -> f64 {
        self.latest.value_in(self.unit)
    }
}

/// The entry point for recording samples and querying window statistics.
pub struct AggregationService {
    store: Store,
    window: Duration,
    unit: TemperatureUnit,
    thresholds: Thresholds,
    entities: Mutex<HashMap<EntityKey, EntityHandle>>,
}

impl AggregationService {
    /// Create a service over `store` with a 24 hour window, Celsius display
    /// and no alert thresholds.
    pub fn new(store: Store) -> Self {
        Self {
            store,
            window: Duration::hours(24),
            unit: TemperatureUnit::default(),
            thresholds: Thresholds::default(),
            entities: Mutex::new(HashMap::new()),
        }
    }

    /// Open the configured store and apply the configured window, unit and
    /// thresholds.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = Store::open(&config.storage.path)?;
        Ok(Self::new(store)
            .with_window(config.retention.window())
            .with_unit(config.display.unit)
            .with_thresholds(config.alerts))
    }

    /// Set the retention window.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the default display unit.
    #[must_use]
    pub fn with_unit(mut self, unit: TemperatureUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Set the alert thresholds checked against each recorded sample.
    #[must_use]
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// The retention window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// The default display unit.
    pub fn unit(&self) -> TemperatureUnit {
        self.unit
    }

    /// The underlying store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Record a sample using the configured window and display unit.
    pub async fn record(
        &self,
        entity: &str,
        sample: SampleRecord,
        now: OffsetDateTime,
    ) -> Result<RecordOutcome> {
        self.record_with(entity, sample, now, self.window, self.unit)
            .await
    }

    /// Record a sample: append and persist it, prune the window ending at
    /// `now`, and aggregate what is left.
    ///
    /// If the append cannot be persisted the error is returned and the
    /// sample is not recorded. A persistence error from the following prune
    /// is also returned; the appended sample stays recorded in that case.
    pub async fn record_with(
        &self,
        entity: &str,
        sample: SampleRecord,
        now: OffsetDateTime,
        window: Duration,
        unit: TemperatureUnit,
    ) -> Result<RecordOutcome> {
        let key = EntityKey::new(entity)?;
        let handle = self.handle(&key).await;
        let mut slot = handle.lock().await;
        let entity_store = self.open_slot(&mut slot, &key)?;

        entity_store.append(sample.clone())?;
        let pruned = entity_store.prune(now, window)?;
        let statistics = aggregate(entity_store.records(), unit);

        debug!(
            "Recorded sample for {}: pruned {}, {} in window",
            entity_store.key(),
            pruned,
            entity_store.records().len()
        );

        let alert = if self.thresholds.is_empty() {
            None
        } else {
            self.thresholds
                .evaluate(sample.value, TemperatureUnit::CANONICAL)
        };

        Ok(RecordOutcome {
            entity: key,
            latest: sample,
            statistics,
            unit,
            alert,
        })
    }

    /// Statistics for an entity's window ending at `now`, without recording
    /// a sample.
    ///
    /// Stale samples are pruned first. Fails with [`Error::UnknownEntity`]
    /// when the entity has never been recorded; returns `Ok(None)` when it
    /// is known but has no samples in the window.
    pub async fn statistics(
        &self,
        entity: &str,
        now: OffsetDateTime,
        unit: TemperatureUnit,
    ) -> Result<Option<WindowStatistics>> {
        let key = EntityKey::new(entity)?;
        let handle = match self.existing_handle(&key).await {
            Some(handle) => handle,
            None if self.store.contains(&key) => self.handle(&key).await,
            None => return Err(Error::UnknownEntity(key.to_string())),
        };

        let mut slot = handle.lock().await;
        let entity_store = self.open_slot(&mut slot, &key)?;
        entity_store.prune(now, self.window)?;
        Ok(aggregate(entity_store.records(), unit))
    }

    /// The retained history of an entity, oldest first. Unknown entities
    /// yield an empty sequence.
    pub async fn history(&self, entity: &str) -> Result<Vec<SampleRecord>> {
        let key = EntityKey::new(entity)?;
        match self.existing_handle(&key).await {
            Some(handle) => {
                let mut slot = handle.lock().await;
                let entity_store = self.open_slot(&mut slot, &key)?;
                Ok(entity_store.records().to_vec())
            }
            None => self.store.load(&key),
        }
    }

    /// Prune every known entity against the window ending at `now`.
    ///
    /// Each entity is pruned under its own lock. Returns the total number of
    /// samples removed; the first persistence error stops the pass.
    pub async fn housekeep(&self, now: OffsetDateTime) -> Result<usize> {
        let mut keys = self.store.entities()?;
        keys.extend(self.entities.lock().await.keys().cloned());
        keys.sort();
        keys.dedup();

        let mut removed = 0;
        for key in keys {
            let handle = self.handle(&key).await;
            let mut slot = handle.lock().await;
            let entity_store = self.open_slot(&mut slot, &key)?;
            removed += entity_store.prune(now, self.window)?;
        }

        debug!("Housekeeping removed {} stale samples", removed);
        Ok(removed)
    }

    /// Get or create the lock handle for `key`.
    async fn handle(&self, key: &EntityKey) -> EntityHandle {
        let mut entities = self.entities.lock().await;
        Arc::clone(entities.entry(key.clone()).or_default())
    }

    async fn existing_handle(&self, key: &EntityKey) -> Option<EntityHandle> {
        self.entities.lock().await.get(key).cloned()
    }

    /// Open the entity's store on first use. Called with the entity lock held.
    fn open_slot<'a>(
        &self,
        slot: &'a mut Option<EntityStore>,
        key: &EntityKey,
    ) -> Result<&'a mut EntityStore> {
        let entity_store = match slot.take() {
            Some(entity_store) => entity_store,
            None => self.store.entity(key)?,
        };
        Ok(slot.insert(entity_store))
    }
}
