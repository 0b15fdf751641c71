//! Storage traits and implementations
//!
//! Two stores back the sync engine: the checkpoint store remembers how far
//! transaction history has been synced, and the purchase store is the
//! destination purchases are written to. Both are trait objects so the
//! engine can run against in-memory stores in tests.

mod batch;
mod checkpoint_file;
mod memory;
mod sqlite;
mod traits;

pub use batch::{InsertReport, insert_batch};
pub use checkpoint_file::FileCheckpointStore;
pub use memory::{InMemoryCheckpointStore, InMemoryPurchaseStore};
pub use sqlite::{SqlitePurchaseStore, StoredPurchase};
pub use traits::{CheckpointStore, PurchaseStore, PurchaseWriter};
