//! Fixed-delay scheduling
//!
//! The next cycle starts one interval after the previous one *finished*, so
//! a slow cycle pushes the schedule back instead of queueing work. Failed
//! cycles are logged and the loop carries on.

use log::{error, info};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use super::cycle::{Cycle, CycleOutcome};

/// Default delay between cycles
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(20 * 60);

/// Shared handle to a shutdown signal.
pub type SharedShutdown = Arc<Shutdown>;

/// Stop signal checked between cycles
///
/// Requesting shutdown wakes a scheduler that is waiting for its next
/// cycle. A cycle already in progress always runs to completion.
#[derive(Debug, Default)]
pub struct Shutdown {
    requested: Mutex<bool>,
    signal: Condvar,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new shared signal wrapped in [`Arc`].
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Request shutdown and wake any waiter
    pub fn request(&self) {
        let mut requested = self.requested.lock().unwrap_or_else(PoisonError::into_inner);
        *requested = true;
        self.signal.notify_all();
    }

    pub fn is_requested(&self) -> bool {
        *self.requested.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for `timeout` or until shutdown is requested
    ///
    /// Returns `true` if shutdown was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let requested = self.requested.lock().unwrap_or_else(PoisonError::into_inner);
        let (requested, _) = self
            .signal
            .wait_timeout_while(requested, timeout, |requested| !*requested)
            .unwrap_or_else(PoisonError::into_inner);
        *requested
    }
}

/// What the scheduler did before it stopped
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScheduleSummary {
    /// Cycles started
    pub cycles: usize,
    /// Cycles that ended in an error
    pub failures: usize,
}

/// Runs cycles forever with a fixed delay between them
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run cycles until shutdown is requested
    ///
    /// The first cycle starts immediately.
    pub fn run(&self, cycle: &mut dyn Cycle, shutdown: &Shutdown) -> ScheduleSummary {
        let mut summary = ScheduleSummary::default();

        while !shutdown.is_requested() {
            summary.cycles += 1;
            if !self.run_once(cycle) {
                summary.failures += 1;
            }

            if shutdown.wait_timeout(self.interval) {
                break;
            }
        }

        info!(
            "Scheduler stopped after {} cycles ({} failed)",
            summary.cycles, summary.failures
        );
        summary
    }

    /// Run a single cycle and log how it went. Returns `false` on failure.
    pub fn run_once(&self, cycle: &mut dyn Cycle) -> bool {
        match cycle.run_cycle() {
            Ok(CycleOutcome::UpToDate) => {
                info!("Already up to date");
                true
            }
            Ok(CycleOutcome::Synced(stats)) => {
                info!(
                    "Synced {} windows: {} transactions, {} purchases found, {} inserted, {} rejected ({}ms)",
                    stats.windows_fetched,
                    stats.transactions_seen,
                    stats.purchases_found,
                    stats.purchases_inserted,
                    stats.purchases_rejected,
                    stats.duration_ms
                );
                true
            }
            Err(e) => {
                error!(
                    "Sync cycle failed ({}), retrying in {}s: {}",
                    e.kind(),
                    self.interval.as_secs(),
                    e
                );
                false
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::sync::SyncStats;
    use std::thread;
    use std::time::Instant;

    /// Plays back a script of outcomes, then requests shutdown
    struct ScriptedCycle {
        script: Vec<bool>,
        runs: usize,
        shutdown: SharedShutdown,
    }

    impl Cycle for ScriptedCycle {
        fn run_cycle(&mut self) -> Result<CycleOutcome, SyncError> {
            let ok = self.script.get(self.runs).copied().unwrap_or(true);
            self.runs += 1;
            if self.runs >= self.script.len() {
                self.shutdown.request();
            }
            if ok {
                Ok(CycleOutcome::Synced(SyncStats::default()))
            } else {
                Err(SyncError::Auth(anyhow::anyhow!("invalid_client")))
            }
        }
    }

    #[test]
    fn test_failures_do_not_stop_the_loop() {
        let shutdown = Shutdown::shared();
        let mut cycle = ScriptedCycle {
            script: vec![false, true, false, true],
            runs: 0,
            shutdown: shutdown.clone(),
        };

        let summary = Scheduler::new(Duration::from_millis(1)).run(&mut cycle, &shutdown);
        assert_eq!(summary, ScheduleSummary { cycles: 4, failures: 2 });
    }

    #[test]
    fn test_shutdown_before_start_runs_nothing() {
        let shutdown = Shutdown::shared();
        shutdown.request();
        let mut cycle = ScriptedCycle {
            script: vec![true],
            runs: 0,
            shutdown: shutdown.clone(),
        };

        let summary = Scheduler::default().run(&mut cycle, &shutdown);
        assert_eq!(summary.cycles, 0);
        assert_eq!(cycle.runs, 0);
    }

    #[test]
    fn test_shutdown_interrupts_wait() {
        let shutdown = Shutdown::shared();
        let waker = {
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                shutdown.request();
            })
        };

        let started = Instant::now();
        assert!(shutdown.wait_timeout(Duration::from_secs(60)));
        assert!(started.elapsed() < Duration::from_secs(30));
        waker.join().unwrap();
    }

    #[test]
    fn test_wait_times_out_without_shutdown() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.wait_timeout(Duration::from_millis(5)));
        assert!(!shutdown.is_requested());
    }
}
