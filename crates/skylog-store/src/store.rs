//! Main store implementation.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

use skylog_types::{EntityKey, SampleRecord};

use crate::error::{Error, Result};
use crate::history::{EntityHistory, window_start};
use crate::layout;

const HISTORY_EXTENSION: &str = "json";

/// Root of the durable medium: one history file per entity.
///
/// A `Store` is created once at process start and hands out one
/// [`EntityStore`] per entity key. It never mutates history itself.
#[derive(Debug, Clone)]
pub struct Store {
    root: Option<PathBuf>,
}

impl Store {
    /// Open or create a store rooted at the given directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            fs::create_dir_all(path).map_err(|e| Error::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening history store at {}", path.display());
        Ok(Self {
            root: Some(path.to_path_buf()),
        })
    }

    /// Open the default store location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_store_path())
    }

    /// A store with no durable medium (for testing).
    pub fn open_in_memory() -> Self {
        Self { root: None }
    }

    /// Directory holding the history files, if durable.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn entity_path(&self, key: &EntityKey) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|root| root.join(format!("{}.{}", key, HISTORY_EXTENSION)))
    }

    /// Open the handle for an entity, loading any persisted history.
    ///
    /// An entity with no history yet gets an empty handle; the file is
    /// created on its first append.
    pub fn entity(&self, key: &EntityKey) -> Result<EntityStore> {
        let path = self.entity_path(key);
        let history = match &path {
            Some(path) => read_history(path, key)?.unwrap_or_default(),
            None => EntityHistory::new(),
        };

        Ok(EntityStore {
            key: key.clone(),
            path,
            history,
        })
    }

    /// Open the handle for an entity that must already have history.
    pub fn require(&self, key: &EntityKey) -> Result<EntityStore> {
        if !self.contains(key) {
            return Err(Error::UnknownEntity(key.to_string()));
        }
        self.entity(key)
    }

    /// Read the persisted history of an entity. Unknown entities yield an
    /// empty sequence.
    pub fn load(&self, key: &EntityKey) -> Result<Vec<SampleRecord>> {
        match self.entity_path(key) {
            Some(path) => Ok(read_history(&path, key)?
                .map(EntityHistory::into_records)
                .unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }

    /// Whether the entity has persisted history.
    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entity_path(key).is_some_and(|path| path.is_file())
    }

    /// List every entity with persisted history, sorted by key.
    pub fn entities(&self) -> Result<Vec<EntityKey>> {
        let Some(root) = &self.root else {
            return Ok(Vec::new());
        };

        let entries = fs::read_dir(root).map_err(|source| Error::Persistence {
            path: root.clone(),
            source,
        })?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::Persistence {
                path: root.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(HISTORY_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Skips temporary files and names that don't normalize to themselves
            match EntityKey::new(stem) {
                Ok(key) if key.as_str() == stem => keys.push(key),
                _ => debug!("Ignoring {} in history store", path.display()),
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// Durable, ordered history of one entity.
///
/// Every mutation is persisted with an atomic replace before it becomes
/// visible in memory, so the in-memory and on-disk views never diverge.
#[derive(Debug)]
pub struct EntityStore {
    key: EntityKey,
    path: Option<PathBuf>,
    history: EntityHistory,
}

impl EntityStore {
    /// The entity this store belongs to.
    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Path of the history file, if durable.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert a sample at its timestamp-ordered position and persist.
    ///
    /// On error the sample is not recorded: the in-memory history is rolled
    /// back and the file on disk still holds the previous history. NaN and
    /// infinite values are rejected with [`Error::InvalidSample`].
    pub fn append(&mut self, sample: SampleRecord) -> Result<()> {
        if !sample.value.is_finite() {
            return Err(Error::InvalidSample {
                entity: self.key.to_string(),
                value: sample.value,
            });
        }

        let pos = self.history.insert(sample);

        if let Err(e) = self.persist(self.history.records()) {
            self.history.remove(pos);
            return Err(e);
        }

        debug!(
            "Appended sample to {} at position {} ({} retained)",
            self.key,
            pos,
            self.history.len()
        );
        Ok(())
    }

    /// Remove every sample with `timestamp < now - window` and persist.
    ///
    /// Returns the number of samples removed. Nothing is written when no
    /// sample is stale.
    pub fn prune(&mut self, now: OffsetDateTime, window: Duration) -> Result<usize> {
        let cutoff = window_start(now, window);
        let stale = self.history.stale_count(cutoff);
        if stale == 0 {
            return Ok(0);
        }

        self.persist(&self.history.records()[stale..])?;
        self.history.prune_before(cutoff);

        debug!("Pruned {} stale samples from {}", stale, self.key);
        Ok(stale)
    }

    /// The current ordered history.
    pub fn records(&self) -> &[SampleRecord] {
        self.history.records()
    }

    fn persist(&self, samples: &[SampleRecord]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = layout::encode(path, &self.key, samples)?;
        write_atomic(path, &self.key, &bytes)
    }
}

/// Read and decode a history file. `Ok(None)` if the file does not exist.
fn read_history(path: &Path, key: &EntityKey) -> Result<Option<EntityHistory>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(Error::Persistence {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let decoded = layout::decode(path, &bytes)?;
    if decoded.needs_migration() {
        info!(
            "Read {} samples for {} from layout v{}; will rewrite as v{} on next change",
            decoded.history.len(),
            key,
            decoded.version,
            layout::LAYOUT_VERSION
        );
    }
    Ok(Some(decoded.history))
}

/// Write `bytes` to a temporary sibling of `path`, sync it, and rename it
/// over `path`. Readers see either the old file or the new one. The
/// directory is synced afterwards so the rename itself is durable.
fn write_atomic(path: &Path, key: &EntityKey, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = dir.join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4()));

    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if let Err(source) = result {
        let _ = fs::remove_file(&tmp);
        return Err(Error::Persistence {
            path: path.to_path_buf(),
            source,
        });
    }

    sync_dir(dir).map_err(|source| Error::Persistence {
        path: dir.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-10-16 12:00 UTC);

    fn key(name: &str) -> EntityKey {
        EntityKey::new(name).unwrap()
    }

    fn sample(hours_ago: i64, value: f64) -> SampleRecord {
        SampleRecord::new(NOW - Duration::hours(hours_ago), value)
    }

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("history")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_open_creates_directory() {
        let (dir, store) = temp_store();
        assert!(dir.path().join("history").is_dir());
        assert_eq!(store.root(), Some(dir.path().join("history").as_path()));
        assert!(store.entities().unwrap().is_empty());
    }

    #[test]
    fn test_load_unknown_entity_is_empty() {
        let (_dir, store) = temp_store();
        assert!(store.load(&key("Pune")).unwrap().is_empty());
        assert!(!store.contains(&key("Pune")));
    }

    #[test]
    fn test_require_unknown_entity() {
        let (_dir, store) = temp_store();
        let err = store.require(&key("Pune")).unwrap_err();
        assert!(matches!(err, Error::UnknownEntity(ref k) if k == "pune"));
        assert!(!err.is_persistence_failure());
    }

    #[test]
    fn test_append_persists_before_returning() {
        let (_dir, store) = temp_store();
        let mut delhi = store.entity(&key("Delhi")).unwrap();

        delhi.append(sample(2, 300.0).with_category("haze")).unwrap();
        delhi.append(sample(1, 301.0)).unwrap();

        let loaded = store.load(&key("DELHI")).unwrap();
        assert_eq!(loaded, delhi.records());
        assert!(store.contains(&key("delhi")));
        assert_eq!(
            delhi.path().unwrap().file_name().unwrap().to_str(),
            Some("delhi.json")
        );
    }

    #[test]
    fn test_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let expected = {
            let store = Store::open(dir.path()).unwrap();
            let mut mumbai = store.entity(&key("Mumbai")).unwrap();
            mumbai.append(sample(3, 299.5).with_category("rain")).unwrap();
            mumbai.append(sample(3, 299.7)).unwrap();
            mumbai.append(sample(1, 300.25).with_category("rain")).unwrap();
            mumbai.records().to_vec()
        };

        let store = Store::open(dir.path()).unwrap();
        let mumbai = store.entity(&key("mumbai")).unwrap();
        assert_eq!(mumbai.records(), expected.as_slice());
    }

    #[test]
    fn test_out_of_order_append_is_sorted_on_disk() {
        let (_dir, store) = temp_store();
        let mut chennai = store.entity(&key("Chennai")).unwrap();
        chennai.append(sample(1, 3.0)).unwrap();
        chennai.append(sample(5, 1.0)).unwrap();
        chennai.append(sample(3, 2.0)).unwrap();

        let values: Vec<f64> = store
            .load(&key("Chennai"))
            .unwrap()
            .iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_prune_removes_and_persists() {
        let (_dir, store) = temp_store();
        let mut kolkata = store.entity(&key("Kolkata")).unwrap();
        kolkata.append(sample(30, 1.0)).unwrap();
        kolkata.append(sample(25, 2.0)).unwrap();
        kolkata.append(sample(2, 3.0)).unwrap();

        assert_eq!(kolkata.prune(NOW, Duration::hours(24)).unwrap(), 2);
        assert_eq!(kolkata.prune(NOW, Duration::hours(24)).unwrap(), 0);

        let loaded = store.load(&key("Kolkata")).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].value, 3.0);
        assert!(loaded.iter().all(|r| r.timestamp >= NOW - Duration::hours(24)));
    }

    #[test]
    fn test_append_failure_leaves_history_unchanged() {
        let (dir, store) = temp_store();
        let mut delhi = store.entity(&key("Delhi")).unwrap();
        delhi.append(sample(2, 300.0)).unwrap();

        // Replace the store directory with a plain file so writes fail
        let root = dir.path().join("history");
        fs::remove_dir_all(&root).unwrap();
        fs::write(&root, b"not a directory").unwrap();

        let err = delhi.append(sample(1, 301.0)).unwrap_err();
        assert!(err.is_persistence_failure());
        assert_eq!(delhi.records().len(), 1);
        assert_eq!(delhi.records()[0].value, 300.0);
    }

    #[test]
    fn test_prune_failure_leaves_history_unchanged() {
        let (dir, store) = temp_store();
        let mut delhi = store.entity(&key("Delhi")).unwrap();
        delhi.append(sample(30, 290.0)).unwrap();
        delhi.append(sample(1, 300.0)).unwrap();

        let root = dir.path().join("history");
        fs::remove_dir_all(&root).unwrap();
        fs::write(&root, b"not a directory").unwrap();

        assert!(delhi.prune(NOW, Duration::hours(24)).is_err());
        assert_eq!(delhi.records().len(), 2);
    }

    #[test]
    fn test_no_temporary_files_left_behind() {
        let (dir, store) = temp_store();
        let mut pune = store.entity(&key("Pune")).unwrap();
        for i in 0..5 {
            pune.append(sample(i, 300.0 + i as f64)).unwrap();
        }
        pune.prune(NOW, Duration::hours(2)).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path().join("history"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["pune.json".to_string()]);
    }

    #[test]
    fn test_entities_lists_persisted_keys() {
        let (dir, store) = temp_store();
        for name in ["Mumbai", "Delhi", "Hyderabad"] {
            store
                .entity(&key(name))
                .unwrap()
                .append(sample(1, 300.0))
                .unwrap();
        }
        fs::write(dir.path().join("history").join(".scratch.tmp"), b"").unwrap();
        fs::write(dir.path().join("history").join("notes.txt"), b"").unwrap();

        let keys: Vec<String> = store
            .entities()
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(keys, vec!["delhi", "hyderabad", "mumbai"]);
    }

    #[test]
    fn test_legacy_file_is_migrated_on_next_write() {
        let (dir, store) = temp_store();
        let path = dir.path().join("history").join("delhi.json");
        fs::write(
            &path,
            br#"[{"timestamp": "2024-10-16T11:00:00", "temp_k": 301.15, "condition": "haze"}]"#,
        )
        .unwrap();

        let mut delhi = store.entity(&key("Delhi")).unwrap();
        assert_eq!(delhi.records().len(), 1);
        assert_eq!(delhi.records()[0].category.as_deref(), Some("haze"));

        delhi.append(sample(0, 302.0)).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(json["version"], layout::LAYOUT_VERSION);
        assert_eq!(json["samples"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_corrupt_file_is_persistence_failure() {
        let (dir, store) = temp_store();
        fs::write(dir.path().join("history").join("delhi.json"), b"{oops").unwrap();

        let err = store.entity(&key("Delhi")).unwrap_err();
        assert!(err.is_persistence_failure());
        assert!(store.load(&key("Delhi")).is_err());
    }

    #[test]
    fn test_non_finite_sample_is_rejected() {
        let (dir, store) = temp_store();
        let mut delhi = store.entity(&key("Delhi")).unwrap();
        delhi.append(sample(2, 300.0)).unwrap();
        let on_disk = fs::read(dir.path().join("history").join("delhi.json")).unwrap();

        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = delhi.append(sample(1, value)).unwrap_err();
            assert!(matches!(err, Error::InvalidSample { ref entity, .. } if entity == "delhi"));
            assert!(!err.is_persistence_failure());
        }

        assert_eq!(delhi.records().len(), 1);
        assert_eq!(
            fs::read(dir.path().join("history").join("delhi.json")).unwrap(),
            on_disk
        );

        // The entity stays readable and writable
        let mut reopened = Store::open(dir.path().join("history"))
            .unwrap()
            .entity(&key("Delhi"))
            .unwrap();
        assert_eq!(reopened.records(), delhi.records());
        reopened.append(sample(0, 301.0)).unwrap();
        assert_eq!(store.load(&key("Delhi")).unwrap().len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_sync_dir() {
        let dir = tempfile::tempdir().unwrap();
        sync_dir(dir.path()).unwrap();
        assert!(sync_dir(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_in_memory_store() {
        let store = Store::open_in_memory();
        let mut goa = store.entity(&key("Goa")).unwrap();
        goa.append(sample(1, 300.0)).unwrap();

        assert_eq!(goa.records().len(), 1);
        assert!(goa.path().is_none());
        assert!(store.load(&key("Goa")).unwrap().is_empty());
        assert!(store.entities().unwrap().is_empty());
    }
}
