//! SQLite-based purchase storage

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{Connection, params};
use rusqlite_migration::{M, Migrations};

use super::traits::{PurchaseStore, PurchaseWriter};
use crate::models::Purchase;

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            CREATE TABLE resource_purchase (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts_purchased TEXT NOT NULL,
                resource_id TEXT NOT NULL,
                price TEXT NOT NULL,
                email TEXT NOT NULL,
                server_id INTEGER NOT NULL,
                synced_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_resource_purchase_resource
                ON resource_purchase(resource_id);
            CREATE INDEX idx_resource_purchase_email
                ON resource_purchase(email);
            "#,
        ),
    ])
}

/// A purchase row read back from the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPurchase {
    pub id: i64,
    pub origin_id: i64,
    pub purchase: Purchase,
}

/// SQLite destination for purchases
///
/// A fresh connection is opened for every write session, so a database that
/// has become unreachable is noticed on the next cycle rather than at startup.
pub struct SqlitePurchaseStore {
    db_path: PathBuf,
}

impl SqlitePurchaseStore {
    /// Create a store for the database file at `db_path`
    ///
    /// Nothing is opened until the first session.
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Open a connection and bring the schema up to date
    fn connect(&self) -> Result<Connection> {
        let mut conn = Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open database at {:?}", self.db_path))?;

        // WAL lets readers (reporting queries, the admin shell) keep working
        // while a batch is being written.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(conn)
    }

    /// List stored purchases, oldest first
    pub fn list_purchases(&self, limit: usize, offset: usize) -> Result<Vec<StoredPurchase>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, server_id, resource_id, price, ts_purchased, email
             FROM resource_purchase ORDER BY id ASC LIMIT ? OFFSET ?",
        )?;

        let rows = stmt.query_map(params![limit as i64, offset as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut purchases = Vec::new();
        for row in rows {
            let (id, origin_id, resource_id, price, ts_purchased, email) = row?;
            let purchased_at = DateTime::parse_from_rfc3339(&ts_purchased)
                .map(|dt| dt.with_timezone(&Utc))
                .with_context(|| format!("Invalid ts_purchased in row {}", id))?;
            purchases.push(StoredPurchase {
                id,
                origin_id,
                purchase: Purchase::new(resource_id, price, purchased_at, email),
            });
        }

        Ok(purchases)
    }

    /// Count stored purchases
    pub fn count_purchases(&self) -> Result<usize> {
        let conn = self.connect()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM resource_purchase", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl PurchaseStore for SqlitePurchaseStore {
    fn open(&self) -> Result<Box<dyn PurchaseWriter + '_>> {
        let conn = self.connect()?;
        conn.execute_batch("BEGIN IMMEDIATE")
            .context("Failed to start purchase transaction")?;
        Ok(Box::new(SqliteWriter { conn }))
    }
}

/// One transaction's worth of inserts
///
/// A failed insert only rolls back its own statement; the transaction stays
/// open for the rest of the batch. Dropping the writer without committing
/// rolls everything back.
struct SqliteWriter {
    conn: Connection,
}

impl PurchaseWriter for SqliteWriter {
    fn insert(&mut self, origin_id: i64, purchase: &Purchase) -> Result<()> {
        self.conn.execute(
            "INSERT INTO resource_purchase (ts_purchased, resource_id, price, email, server_id)
             VALUES (?, ?, ?, ?, ?)",
            params![
                purchase.purchased_at.to_rfc3339(),
                purchase.resource_id,
                purchase.price,
                purchase.payer_email,
                origin_id,
            ],
        )?;
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        debug!("Committed purchase batch");
        Ok(())
    }
}
