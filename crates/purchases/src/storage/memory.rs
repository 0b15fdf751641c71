//! In-memory storage implementations
//!
//! Used by tests. Both stores can be told to fail so the
//! engine's failure paths can be exercised without a real disk or database.

use anyhow::{Result, anyhow, bail};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use super::{CheckpointStore, PurchaseStore, PurchaseWriter};
use crate::models::{Checkpoint, Purchase};

/// In-memory implementation of CheckpointStore
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    value: RwLock<Option<Checkpoint>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl InMemoryCheckpointStore {
    /// Create an empty store (first-run state)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a checkpoint
    pub fn with_checkpoint(checkpoint: Checkpoint) -> Self {
        let store = Self::new();
        *store.value.write().unwrap_or_else(PoisonError::into_inner) = Some(checkpoint);
        store
    }

    /// The currently stored checkpoint
    pub fn get(&self) -> Option<Checkpoint> {
        *self.value.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make subsequent saves fail (or succeed again)
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn load(&self) -> Result<Option<Checkpoint>> {
        Ok(self.get())
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            bail!("checkpoint storage is read-only");
        }
        let mut value = self.value.write().map_err(|_| anyhow!("checkpoint lock poisoned"))?;
        *value = Some(*checkpoint);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory implementation of PurchaseStore
///
/// Rows become visible only when a session commits.
#[derive(Default)]
pub struct InMemoryPurchaseStore {
    rows: RwLock<Vec<(i64, Purchase)>>,
    rejected_resources: RwLock<HashSet<String>>,
    unavailable: AtomicBool,
    opens: AtomicUsize,
    commits: AtomicUsize,
}

impl InMemoryPurchaseStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the destination being unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Reject every insert for this resource id
    pub fn reject_resource(&self, resource_id: impl Into<String>) {
        self.rejected_resources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(resource_id.into());
    }

    /// All committed rows as `(origin_id, purchase)`, in insertion order
    pub fn purchases(&self) -> Vec<(i64, Purchase)> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of sessions successfully opened
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of sessions committed
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    fn is_rejected(&self, resource_id: &str) -> bool {
        self.rejected_resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(resource_id)
    }
}

impl PurchaseStore for InMemoryPurchaseStore {
    fn open(&self) -> Result<Box<dyn PurchaseWriter + '_>> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("connection refused");
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryWriter {
            store: self,
            staged: Vec::new(),
        }))
    }
}

struct InMemoryWriter<'a> {
    store: &'a InMemoryPurchaseStore,
    staged: Vec<(i64, Purchase)>,
}

impl PurchaseWriter for InMemoryWriter<'_> {
    fn insert(&mut self, origin_id: i64, purchase: &Purchase) -> Result<()> {
        if self.store.is_rejected(&purchase.resource_id) {
            bail!("constraint violation on resource {}", purchase.resource_id);
        }
        self.staged.push((origin_id, purchase.clone()));
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let mut rows = self
            .store
            .rows
            .write()
            .map_err(|_| anyhow!("purchase lock poisoned"))?;
        rows.extend(self.staged);
        self.store.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn checkpoint(day: u32) -> Checkpoint {
        Checkpoint::new(Utc.with_ymd_and_hms(2020, 1, day, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_checkpoint_store_round_trip() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.load().unwrap().is_none());

        store.save(&checkpoint(5)).unwrap();
        assert_eq!(store.load().unwrap(), Some(checkpoint(5)));
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_checkpoint_store_failing_saves_keep_old_value() {
        let store = InMemoryCheckpointStore::with_checkpoint(checkpoint(1));
        store.set_fail_saves(true);

        assert!(store.save(&checkpoint(9)).is_err());
        assert_eq!(store.get(), Some(checkpoint(1)));
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_purchase_store_unavailable() {
        let store = InMemoryPurchaseStore::new();
        store.set_unavailable(true);
        assert!(store.open().is_err());
        assert_eq!(store.open_count(), 0);

        store.set_unavailable(false);
        assert!(store.open().is_ok());
    }

    #[test]
    fn test_uncommitted_rows_are_discarded() {
        let store = InMemoryPurchaseStore::new();
        let purchase = Purchase::new("r1", "1.00", Utc::now(), "x@example.com");
        {
            let mut writer = store.open().unwrap();
            writer.insert(1, &purchase).unwrap();
        }
        assert!(store.purchases().is_empty());
    }
}
