//! TTL-bounded inventory cache over `system_profiler`.
//!
//! Each category moves between three states: no slot stored, a valid slot
//! (`now < expires_at`), and an expired slot.  [`InventoryCache::get`] serves
//! a valid slot unchanged and otherwise runs the profiler once, persists the
//! result, and returns it.  Lookups for one category are serialized by a
//! per-category lock, so the expiry check and the refetch-and-save happen as
//! one step within the process.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::category::{InventoryCategory, parse_data_type_list};
use super::clock::Clock;
use super::snapshot::{InventorySnapshot, Record, records_from_profile};
use super::store::SnapshotStore;
use crate::error::{Error, Result};
use crate::exec::Executor;
use crate::logging::Log;
use crate::property_list::{PlistValue, read_property_list};

/// Absolute path of the profiling utility.
pub const SYSTEM_PROFILER: &str = "/usr/sbin/system_profiler";

/// Default snapshot lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

type SlotLock = Arc<Mutex<()>>;

/// Cached accessor for host inventory.
pub struct InventoryCache {
    executor: Arc<dyn Executor>,
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    log: Arc<dyn Log>,
    ttl: TimeDelta,
    /// Live category list, fetched once per cache instance.
    categories: Mutex<Option<Vec<InventoryCategory>>>,
    slot_locks: Mutex<HashMap<InventoryCategory, SlotLock>>,
}

impl std::fmt::Debug for InventoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryCache")
            .field("store", &self.store)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InventoryCache {
    /// Create a cache with the default one-hour TTL.
    #[must_use]
    pub fn new(
        executor: Arc<dyn Executor>,
        store: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
        log: Arc<dyn Log>,
    ) -> Self {
        Self {
            executor,
            store,
            clock,
            log,
            ttl: TimeDelta::hours(1),
            categories: Mutex::new(None),
            slot_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Override the snapshot lifetime.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        self
    }

    /// Categories the profiler supports, sorted.
    ///
    /// The list is fetched on first use and kept for the lifetime of the
    /// cache; it is never persisted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Execution`] if the profiler cannot be run.
    pub fn categories(&self) -> Result<Vec<InventoryCategory>> {
        let mut guard = lock(&self.categories);
        if let Some(list) = guard.as_ref() {
            return Ok(list.clone());
        }
        self.log.debug("listing profiler data types");
        let result = self
            .executor
            .run_checked(SYSTEM_PROFILER, &["-listDataTypes"])?;
        let list = parse_data_type_list(&result.stdout_lossy());
        *guard = Some(list.clone());
        Ok(list)
    }

    fn validate(&self, category: &InventoryCategory) -> Result<()> {
        let supported = self.categories()?;
        if supported.contains(category) {
            return Ok(());
        }
        Err(Error::InvalidCategory {
            category: category.to_string(),
            supported: supported
                .iter()
                .map(InventoryCategory::name)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    fn slot_lock(&self, category: &InventoryCategory) -> SlotLock {
        Arc::clone(lock(&self.slot_locks).entry(category.clone()).or_default())
    }

    /// Snapshot for `category`, refetched when absent or expired.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCategory`] for unsupported categories, and
    /// execution, parse or cache errors from a refetch.
    pub fn get(&self, category: &InventoryCategory) -> Result<InventorySnapshot> {
        self.validate(category)?;
        let slot = self.slot_lock(category);
        let _guard = lock(&slot);

        let now = self.clock.now();
        if let Some(snapshot) = self.store.load(category)?
            && snapshot.is_valid_at(now)
        {
            self.log
                .debug(&format!("inventory cache hit for {category}"));
            return Ok(snapshot);
        }

        let items = self.profile(category)?;
        let snapshot = InventorySnapshot {
            category: category.clone(),
            items,
            fetched_at: now,
            expires_at: now
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        self.store.save(&snapshot)?;
        Ok(snapshot)
    }

    fn profile(&self, category: &InventoryCategory) -> Result<Vec<Record>> {
        let data_type = category.data_type();
        self.log.debug(&format!("profiling {data_type}"));
        let result = self.executor.run_checked(
            SYSTEM_PROFILER,
            &[&data_type, "-detaillevel", "full", "-xml"],
        )?;
        let profile = read_property_list(&result.stdout)?;
        Ok(records_from_profile(profile)?)
    }

    /// Records of `category` whose `field` contains `substring`.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn find(
        &self,
        category: &InventoryCategory,
        field: &str,
        substring: &str,
    ) -> Result<Vec<Record>> {
        Ok(self.get(category)?.find(field, substring))
    }

    /// Sorted field names of the first record of `category`.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn keys(&self, category: &InventoryCategory) -> Result<Vec<String>> {
        Ok(self.get(category)?.keys())
    }

    /// Value of `field` in the first record of `category`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FieldNotFound`] when the field is absent, plus the
    /// errors of [`get`](Self::get).
    pub fn field(&self, category: &InventoryCategory, field: &str) -> Result<PlistValue> {
        self.get(category)?.field(field).cloned()
    }

    /// Items of `category` as a JSON array.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn to_json(&self, category: &InventoryCategory) -> Result<serde_json::Value> {
        Ok(self.get(category)?.to_json())
    }

    /// Drop the stored slot so the next [`get`](Self::get) refetches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cache`] if the slot cannot be removed.
    pub fn invalidate(&self, category: &InventoryCategory) -> Result<()> {
        let slot = self.slot_lock(category);
        let _guard = lock(&slot);
        self.store.remove(category)
    }
}
