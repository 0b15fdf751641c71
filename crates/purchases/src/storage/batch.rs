//! Best-effort batch insertion

use anyhow::{Context, Result};
use log::warn;

use super::PurchaseWriter;
use crate::error::PersistenceRecordError;
use crate::models::Purchase;

/// Outcome of writing one batch of purchases
#[derive(Debug, Default)]
pub struct InsertReport {
    /// Number of purchases written
    pub inserted: usize,
    /// Purchases the store refused, with the reason
    pub rejected: Vec<PersistenceRecordError>,
}

/// Insert every purchase, logging and skipping the ones the store rejects
///
/// Only a failed commit fails the whole batch.
pub fn insert_batch(
    mut writer: Box<dyn PurchaseWriter + '_>,
    origin_id: i64,
    purchases: &[Purchase],
) -> Result<InsertReport> {
    let mut report = InsertReport::default();

    for purchase in purchases {
        match writer.insert(origin_id, purchase) {
            Ok(()) => report.inserted += 1,
            Err(source) => {
                let err = PersistenceRecordError {
                    purchase: purchase.clone(),
                    source,
                };
                warn!("{}", err);
                report.rejected.push(err);
            }
        }
    }

    writer.commit().context("Failed to commit purchase batch")?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryPurchaseStore, PurchaseStore};
    use chrono::{TimeZone, Utc};

    fn purchase(resource_id: &str) -> Purchase {
        Purchase::new(
            resource_id,
            "4.99",
            Utc.with_ymd_and_hms(2020, 3, 1, 12, 0, 0).unwrap(),
            "buyer@example.com",
        )
    }

    #[test]
    fn test_insert_batch_all_accepted() {
        let store = InMemoryPurchaseStore::new();
        let batch = vec![purchase("a"), purchase("b")];

        let report = insert_batch(store.open().unwrap(), 7, &batch).unwrap();
        assert_eq!(report.inserted, 2);
        assert!(report.rejected.is_empty());
        assert_eq!(store.purchases(), vec![(7, purchase("a")), (7, purchase("b"))]);
    }

    #[test]
    fn test_insert_batch_continues_after_rejection() {
        let store = InMemoryPurchaseStore::new();
        store.reject_resource("bad");
        let batch = vec![purchase("a"), purchase("bad"), purchase("c")];

        let report = insert_batch(store.open().unwrap(), 7, &batch).unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].purchase.resource_id, "bad");
        assert_eq!(store.purchases().len(), 2);
    }

    #[test]
    fn test_insert_batch_empty_commits() {
        let store = InMemoryPurchaseStore::new();
        let report = insert_batch(store.open().unwrap(), 7, &[]).unwrap();
        assert_eq!(report.inserted, 0);
        assert_eq!(store.commit_count(), 1);
    }
}
