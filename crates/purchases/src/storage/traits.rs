//! Storage trait definitions

use crate::models::{Checkpoint, Purchase};
use anyhow::Result;

/// Durable home of the sync checkpoint
pub trait CheckpointStore {
    /// Load the saved checkpoint; `None` before the first successful cycle
    fn load(&self) -> Result<Option<Checkpoint>>;

    /// Persist the checkpoint. Must be durable before returning.
    fn save(&self, checkpoint: &Checkpoint) -> Result<()>;
}

/// Destination for extracted purchases
pub trait PurchaseStore {
    /// Open a write session
    ///
    /// This is the only call whose failure means the destination is
    /// unavailable; individual inserts may still fail afterwards.
    fn open(&self) -> Result<Box<dyn PurchaseWriter + '_>>;
}

/// A write session against the purchase store
pub trait PurchaseWriter {
    /// Insert one purchase tagged with the origin identifier
    fn insert(&mut self, origin_id: i64, purchase: &Purchase) -> Result<()>;

    /// Make every successful insert of this session durable
    fn commit(self: Box<Self>) -> Result<()>;
}
