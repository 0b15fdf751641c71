//! One synchronization cycle
//!
//! A cycle walks these states in order and either reaches the end or fails
//! without touching the checkpoint:
//!
//! ```text
//! REFRESH_CREDENTIAL -> PLAN_WINDOWS -> FETCH_EXTRACT -> PERSIST -> ADVANCE_CHECKPOINT
//! ```
//!
//! The checkpoint is saved only after every window was fetched and the
//! destination accepted the batch, so a failed cycle is simply re-run from
//! the same checkpoint. Delivery is at-least-once: a crash between PERSIST
//! and ADVANCE_CHECKPOINT inserts that batch again next time.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use log::{debug, info, warn};
use std::time::Instant;

use super::windows::{max_window, plan_windows_with};
use crate::error::{HttpStatusError, SyncError};
use crate::models::{Checkpoint, Purchase, TimeWindow};
use crate::paypal::{CredentialManager, ReportingApi, extract_purchase, fetch_window};
use crate::storage::{CheckpointStore, PurchaseStore, insert_batch};

/// Origin identifier written with every purchase unless configured otherwise
pub const DEFAULT_ORIGIN_ID: i64 = 868241175688151051;

/// Tunables for the sync engine
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Identifier stored alongside every inserted purchase
    pub origin_id: i64,
    /// Starting point when no checkpoint has been saved yet
    pub epoch: Checkpoint,
    /// Widest window sent to the reporting API
    pub max_window: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            origin_id: DEFAULT_ORIGIN_ID,
            epoch: Checkpoint::epoch(),
            max_window: max_window(),
        }
    }
}

/// Statistics from a completed cycle
#[derive(Debug, Default, Clone)]
pub struct SyncStats {
    /// Number of windows fetched from the reporting API
    pub windows_fetched: usize,
    /// Number of raw transactions returned across all windows
    pub transactions_seen: usize,
    /// Number of resource purchases extracted
    pub purchases_found: usize,
    /// Number of purchases written to the destination
    pub purchases_inserted: usize,
    /// Number of purchases the destination rejected
    pub purchases_rejected: usize,
    /// The checkpoint saved at the end of the cycle
    pub synchronized_until: Option<DateTime<Utc>>,
    /// Duration of the cycle
    pub duration_ms: u64,
}

/// How a successful cycle ended
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// The checkpoint was already at (or past) the current time
    UpToDate,
    /// Windows were synced and the checkpoint advanced
    Synced(SyncStats),
}

/// Something the scheduler can run repeatedly
pub trait Cycle {
    fn run_cycle(&mut self) -> Result<CycleOutcome, SyncError>;
}

/// The incremental sync engine
///
/// Owns the credential state and borrows the API client and both stores.
/// Cycles must not overlap; `&mut self` enforces that.
pub struct SyncEngine<'a> {
    api: &'a dyn ReportingApi,
    checkpoints: &'a dyn CheckpointStore,
    purchases: &'a dyn PurchaseStore,
    credentials: CredentialManager,
    options: SyncOptions,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        api: &'a dyn ReportingApi,
        checkpoints: &'a dyn CheckpointStore,
        purchases: &'a dyn PurchaseStore,
        credentials: CredentialManager,
        options: SyncOptions,
    ) -> Self {
        Self {
            api,
            checkpoints,
            purchases,
            credentials,
            options,
        }
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    /// Run one cycle as of `now`
    ///
    /// `now` is truncated to whole seconds; it bounds the last window and
    /// becomes the new checkpoint.
    pub fn run_cycle_at(&mut self, now: DateTime<Utc>) -> Result<CycleOutcome, SyncError> {
        let start = Instant::now();
        let now = now.trunc_subsecs(0);
        let mut stats = SyncStats::default();

        // REFRESH_CREDENTIAL
        let access_token = self
            .credentials
            .ensure_valid(self.api, now)?
            .secret()
            .to_string();

        // PLAN_WINDOWS
        let checkpoint = self.load_checkpoint()?;
        let mut windows =
            plan_windows_with(checkpoint.synchronized_until, now, self.options.max_window).peekable();
        if windows.peek().is_none() {
            debug!(
                "Checkpoint {} is not before {}; nothing to sync",
                checkpoint.synchronized_until, now
            );
            return Ok(CycleOutcome::UpToDate);
        }

        // FETCH_EXTRACT
        let mut batch: Vec<Purchase> = Vec::new();
        for window in windows {
            let found = self.fetch_and_extract(&window, &access_token, &mut stats)?;
            batch.extend(found);
        }
        stats.purchases_found = batch.len();

        // PERSIST
        if !batch.is_empty() {
            info!("{} new purchases found.", batch.len());
        }
        let writer = self
            .purchases
            .open()
            .map_err(SyncError::PersistenceUnavailable)?;
        let report = insert_batch(writer, self.options.origin_id, &batch)
            .map_err(SyncError::PersistenceUnavailable)?;
        stats.purchases_inserted = report.inserted;
        stats.purchases_rejected = report.rejected.len();

        // ADVANCE_CHECKPOINT
        let next = Checkpoint::new(now);
        self.checkpoints.save(&next).map_err(SyncError::Checkpoint)?;
        stats.synchronized_until = Some(next.synchronized_until);
        stats.duration_ms = start.elapsed().as_millis() as u64;

        Ok(CycleOutcome::Synced(stats))
    }

    fn load_checkpoint(&self) -> Result<Checkpoint, SyncError> {
        match self.checkpoints.load().map_err(SyncError::Checkpoint)? {
            Some(checkpoint) => Ok(checkpoint),
            None => {
                info!(
                    "No checkpoint found, starting from {}",
                    self.options.epoch.synchronized_until
                );
                Ok(self.options.epoch)
            }
        }
    }

    fn fetch_and_extract(
        &mut self,
        window: &TimeWindow,
        access_token: &str,
        stats: &mut SyncStats,
    ) -> Result<Vec<Purchase>, SyncError> {
        debug!("Fetching transactions for window {}", window);

        let raw = match fetch_window(self.api, window, access_token) {
            Ok(raw) => raw,
            Err(err) => {
                if is_unauthorized(&err) {
                    warn!("Access token was rejected; re-authenticating next cycle");
                    self.credentials.invalidate();
                }
                return Err(err);
            }
        };

        stats.windows_fetched += 1;
        stats.transactions_seen += raw.len();
        Ok(raw.iter().filter_map(extract_purchase).collect())
    }
}

impl Cycle for SyncEngine<'_> {
    fn run_cycle(&mut self) -> Result<CycleOutcome, SyncError> {
        self.run_cycle_at(Utc::now())
    }
}

fn is_unauthorized(err: &SyncError) -> bool {
    match err {
        SyncError::Fetch { source, .. } => source
            .downcast_ref::<HttpStatusError>()
            .is_some_and(HttpStatusError::is_unauthorized),
        _ => false,
    }
}
