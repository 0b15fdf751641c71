//! Sync engine for pulling purchases out of transaction history
//!
//! Cycles are resumable: a failed cycle leaves the checkpoint untouched and
//! the next one re-plans the exact same windows.

mod cycle;
mod scheduler;
mod windows;

pub use cycle::{Cycle, CycleOutcome, DEFAULT_ORIGIN_ID, SyncEngine, SyncOptions, SyncStats};
pub use scheduler::{DEFAULT_INTERVAL, ScheduleSummary, Scheduler, SharedShutdown, Shutdown};
pub use windows::{MAX_WINDOW_DAYS, Windows, max_window, plan_windows, plan_windows_with};
