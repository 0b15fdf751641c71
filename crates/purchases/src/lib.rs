//! Purchases crate - Business logic for syncing resource purchases
//!
//! This crate provides the pieces of the Tally sync daemon:
//! - Domain models (Purchase, Checkpoint, TimeWindow)
//! - PayPal reporting API client and token management
//! - Storage trait abstractions (checkpoint file, SQLite destination)
//! - Resumable sync engine and fixed-delay scheduler
//!
//! The binary in `crates/apps/tally` only wires these together.

pub mod config;
pub mod error;
pub mod models;
pub mod paypal;
pub mod storage;
pub mod sync;

pub use config::{PaypalEnvironment, Settings};
pub use error::{HttpStatusError, PersistenceRecordError, SyncError};
pub use models::{Checkpoint, Purchase, TimeWindow};
pub use paypal::{CredentialManager, PaypalClient, RawTransaction, ReportingApi, extract_purchase};
pub use storage::{
    CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore, InMemoryPurchaseStore,
    PurchaseStore, PurchaseWriter, SqlitePurchaseStore,
};
pub use sync::{
    Cycle, CycleOutcome, ScheduleSummary, Scheduler, Shutdown, SyncEngine, SyncOptions, SyncStats,
    plan_windows,
};
