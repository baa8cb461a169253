//! Persistent storage for inventory snapshots.
//!
//! One slot per category.  [`FileSnapshotStore`] keeps each slot as a JSON
//! file named after the profiler data type and replaces it atomically, so a
//! concurrent reader sees either the old snapshot or the new one.
use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::category::InventoryCategory;
use super::snapshot::InventorySnapshot;
use crate::error::{Error, Result};

const SLOT_EXTENSION: &str = "inventory.json";

/// Load/save/remove access to per-category snapshot slots.
#[cfg_attr(test, mockall::automock)]
pub trait SnapshotStore: Send + Sync + std::fmt::Debug {
    /// Read the slot for `category`. `Ok(None)` when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cache`] if the slot exists but cannot be read.
    fn load(&self, category: &InventoryCategory) -> Result<Option<InventorySnapshot>>;

    /// Replace the slot for `snapshot.category`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cache`] if the slot cannot be written.
    fn save(&self, snapshot: &InventorySnapshot) -> Result<()>;

    /// Delete the slot for `category`; a missing slot is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cache`] if the slot exists but cannot be removed.
    fn remove(&self, category: &InventoryCategory) -> Result<()>;
}

/// Snapshot slots stored as JSON files in a directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Store slots under `dir`, which is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the slots.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the slot for `category`, e.g. `SPHardwareDataType.inventory.json`.
    #[must_use]
    pub fn slot_path(&self, category: &InventoryCategory) -> PathBuf {
        self.dir
            .join(format!("{}.{SLOT_EXTENSION}", category.data_type()))
    }
}

fn cache_error(path: &Path, reason: impl std::fmt::Display) -> Error {
    Error::Cache {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, category: &InventoryCategory) -> Result<Option<InventorySnapshot>> {
        let path = self.slot_path(category);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(cache_error(&path, e)),
        };
        match serde_json::from_slice::<InventorySnapshot>(&bytes) {
            Ok(snapshot) if snapshot.category == *category => Ok(Some(snapshot)),
            Ok(snapshot) => {
                tracing::warn!(
                    path = %path.display(),
                    found = %snapshot.category,
                    "inventory slot holds another category, ignoring"
                );
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable inventory slot, ignoring");
                Ok(None)
            }
        }
    }

    fn save(&self, snapshot: &InventorySnapshot) -> Result<()> {
        let path = self.slot_path(&snapshot.category);
        std::fs::create_dir_all(&self.dir).map_err(|e| cache_error(&self.dir, e))?;
        let json = serde_json::to_vec_pretty(snapshot).map_err(|e| cache_error(&path, e))?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| cache_error(&self.dir, e))?;
        tmp.write_all(&json).map_err(|e| cache_error(tmp.path(), e))?;
        tmp.as_file().sync_all().map_err(|e| cache_error(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| cache_error(&path, e.error))?;
        tracing::debug!(path = %path.display(), items = snapshot.items.len(), "saved inventory slot");
        Ok(())
    }

    fn remove(&self, category: &InventoryCategory) -> Result<()> {
        let path = self.slot_path(category);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(cache_error(&path, e)),
        }
    }
}

/// In-process snapshot slots, for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    slots: Mutex<HashMap<InventoryCategory, InventorySnapshot>>,
}

impl MemorySnapshotStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<InventoryCategory, InventorySnapshot>> {
        self.slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, category: &InventoryCategory) -> Result<Option<InventorySnapshot>> {
        Ok(self.slots().get(category).cloned())
    }

    fn save(&self, snapshot: &InventorySnapshot) -> Result<()> {
        self.slots()
            .insert(snapshot.category.clone(), snapshot.clone());
        Ok(())
    }

    fn remove(&self, category: &InventoryCategory) -> Result<()> {
        self.slots().remove(category);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, TimeDelta};

    use super::*;
    use crate::inventory::snapshot::tests::record;

    fn snapshot(category: &str) -> InventorySnapshot {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        InventorySnapshot {
            category: InventoryCategory::new(category),
            items: vec![record(&[("machine_model", "Macmini9,1")])],
            fetched_at: now,
            expires_at: now + TimeDelta::hours(1),
        }
    }

    #[test]
    fn slot_path_uses_data_type() {
        let store = FileSnapshotStore::new("/var/cache/macprov");
        assert_eq!(
            store.slot_path(&InventoryCategory::hardware()),
            PathBuf::from("/var/cache/macprov/SPHardwareDataType.inventory.json")
        );
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("inventory"));
        let category = InventoryCategory::hardware();

        assert!(store.load(&category).unwrap().is_none());
        let snap = snapshot("Hardware");
        store.save(&snap).unwrap();
        assert_eq!(store.load(&category).unwrap(), Some(snap));

        store.remove(&category).unwrap();
        assert!(store.load(&category).unwrap().is_none());
        store.remove(&category).unwrap();
    }

    #[test]
    fn save_replaces_existing_slot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        let mut snap = snapshot("Hardware");
        store.save(&snap).unwrap();
        snap.items.clear();
        store.save(&snap).unwrap();
        let loaded = store.load(&InventoryCategory::hardware()).unwrap().unwrap();
        assert!(loaded.items.is_empty());
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn corrupt_slot_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        let category = InventoryCategory::hardware();
        std::fs::write(store.slot_path(&category), b"{ not json").unwrap();
        assert!(store.load(&category).unwrap().is_none());
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemorySnapshotStore::new();
        let snap = snapshot("Software");
        store.save(&snap).unwrap();
        assert_eq!(store.load(&snap.category).unwrap(), Some(snap.clone()));
        store.remove(&snap.category).unwrap();
        assert!(store.load(&snap.category).unwrap().is_none());
    }
}
