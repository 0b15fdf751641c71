//! Errors that abort a sync cycle
//!
//! Every variant leaves the checkpoint where it was. The scheduler logs the
//! error and the next cycle retries the same range from scratch.

use crate::models::{Purchase, TimeWindow};

/// A sync cycle failed before it could advance the checkpoint
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Obtaining an access token failed
    #[error("authentication failed: {0:#}")]
    Auth(#[source] anyhow::Error),

    /// The reporting call for one window failed or returned malformed data
    #[error("failed to fetch transactions for window {window}: {source:#}")]
    Fetch {
        window: TimeWindow,
        #[source]
        source: anyhow::Error,
    },

    /// The destination store could not be reached
    #[error("destination store unavailable: {0:#}")]
    PersistenceUnavailable(#[source] anyhow::Error),

    /// Reading or writing the checkpoint failed
    #[error("checkpoint store failed: {0:#}")]
    Checkpoint(#[source] anyhow::Error),
}

impl SyncError {
    /// Short label used in log lines and stats
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Auth(_) => "auth",
            SyncError::Fetch { .. } => "fetch",
            SyncError::PersistenceUnavailable(_) => "persistence",
            SyncError::Checkpoint(_) => "checkpoint",
        }
    }
}

/// One purchase was rejected by the destination store
///
/// Not fatal: the rest of the batch is still written and the checkpoint
/// still advances.
#[derive(Debug, thiserror::Error)]
#[error("failed to insert purchase of {} by {}: {source:#}", purchase.resource_id, purchase.payer_email)]
pub struct PersistenceRecordError {
    pub purchase: Purchase,
    #[source]
    pub source: anyhow::Error,
}

/// The provider answered with a non-success HTTP status
#[derive(Debug, thiserror::Error)]
#[error("{operation} request returned HTTP {status}")]
pub struct HttpStatusError {
    pub operation: &'static str,
    pub status: u16,
}

impl HttpStatusError {
    /// Whether the provider rejected the access token
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_fetch_error_names_window() {
        let window = TimeWindow::new(
            Utc.with_ymd_and_hms(2019, 12, 2, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap(),
        );
        let err = SyncError::Fetch {
            window,
            source: HttpStatusError {
                operation: "list transactions",
                status: 500,
            }
            .into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("2019-12-02T00:00:00Z"));
        assert!(msg.contains("HTTP 500"));
        assert_eq!(err.kind(), "fetch");
    }

    #[test]
    fn test_unauthorized() {
        let err = HttpStatusError {
            operation: "list transactions",
            status: 401,
        };
        assert!(err.is_unauthorized());
    }
}
