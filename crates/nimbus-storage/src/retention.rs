//! Cache retention sweep
//!
//! Cache tables hold disposable rows stamped with their insertion time as
//! Unix seconds (UTC). The sweep deletes rows whose age exceeds the retention
//! window; rows with a NULL timestamp are left alone.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::database::{Database, TxOutcome};
use crate::Result;

/// Maximum age of cache rows: 7 days
pub const CACHE_RETENTION_SECS: i64 = 7 * 24 * 60 * 60;

/// A table designated for the retention sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheTable {
    /// Table name
    pub table: String,
    /// INTEGER column holding the row's insertion time as Unix seconds
    pub timestamp_column: String,
}

impl CacheTable {
    pub fn new(table: impl Into<String>, timestamp_column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            timestamp_column: timestamp_column.into(),
        }
    }
}

impl Database {
    /// Delete rows older than the retention window from every configured
    /// cache table, in a single transaction. Returns the number of rows
    /// deleted.
    pub fn evict_expired_cache_rows(&self) -> Result<u64> {
        let config = self.config();
        if config.cache_tables.is_empty() {
            return Ok(0);
        }

        let tables = config.cache_tables.clone();
        let cutoff = Utc::now().timestamp() - config.cache_retention_secs;

        let deleted = self
            .run_in_transaction(|conn| {
                let mut total = 0u64;
                for cache in &tables {
                    let deleted = conn.execute(
                        &format!(
                            "DELETE FROM {} WHERE {} < ?1",
                            cache.table, cache.timestamp_column
                        ),
                        [cutoff],
                    )?;
                    total += deleted as u64;
                }
                Ok(TxOutcome::Commit(total))
            })?
            .unwrap_or(0);

        tracing::info!(rows = deleted, cutoff = cutoff, "Evicted expired cache rows");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use chrono::Duration;

    fn open_cache_db() -> Database {
        let config =
            StorageConfig::default().with_cache_table(CacheTable::new("cache", "ts"));
        let db = Database::open_in_memory(config).unwrap();
        db.create_table(
            "cache",
            "CREATE TABLE cache (id INTEGER PRIMARY KEY, ts INTEGER, val TEXT)",
        )
        .unwrap();
        db
    }

    fn insert_row(db: &Database, id: i64, ts: Option<i64>, val: &str) {
        db.with_connection(|conn| {
            conn.execute(
                "INSERT INTO cache (id, ts, val) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, ts, val],
            )?;
            Ok(())
        })
        .unwrap();
    }

    fn row_ids(db: &Database) -> Vec<i64> {
        db.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM cache ORDER BY id")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect();
            Ok(ids)
        })
        .unwrap()
    }

    #[test]
    fn test_evicts_rows_older_than_retention() {
        let db = open_cache_db();
        let now = Utc::now();

        insert_row(&db, 1, Some((now - Duration::days(8)).timestamp()), "x");
        let deleted = db.evict_expired_cache_rows().unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(row_ids(&db), Vec::<i64>::new());

        insert_row(&db, 2, Some((now - Duration::days(1)).timestamp()), "y");
        let deleted = db.evict_expired_cache_rows().unwrap();
        assert_eq!(deleted, 0);
        assert_eq!(row_ids(&db), vec![2]);
    }

    #[test]
    fn test_null_timestamps_survive() {
        let db = open_cache_db();

        insert_row(&db, 1, None, "x");
        let deleted = db.evict_expired_cache_rows().unwrap();

        assert_eq!(deleted, 0);
        assert_eq!(row_ids(&db), vec![1]);
    }

    #[test]
    fn test_no_cache_tables_is_noop() {
        let db = Database::open_in_memory(StorageConfig::default()).unwrap();
        assert_eq!(db.evict_expired_cache_rows().unwrap(), 0);
    }

    #[test]
    fn test_sweeps_multiple_tables() {
        let config = StorageConfig::default()
            .with_cache_table(CacheTable::new("thumbnails", "created_at"))
            .with_cache_table(CacheTable::new("responses", "fetched_at"));
        let db = Database::open_in_memory(config).unwrap();
        db.create_table(
            "thumbnails",
            "CREATE TABLE thumbnails (id INTEGER PRIMARY KEY, created_at INTEGER)",
        )
        .unwrap();
        db.create_table(
            "responses",
            "CREATE TABLE responses (id INTEGER PRIMARY KEY, fetched_at INTEGER)",
        )
        .unwrap();

        let stale = (Utc::now() - Duration::days(9)).timestamp();
        db.with_connection(|conn| {
            conn.execute("INSERT INTO thumbnails (id, created_at) VALUES (1, ?1)", [stale])?;
            conn.execute("INSERT INTO responses (id, fetched_at) VALUES (1, ?1)", [stale])?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.evict_expired_cache_rows().unwrap(), 2);
        assert_eq!(db.count_rows("thumbnails").unwrap(), 0);
        assert_eq!(db.count_rows("responses").unwrap(), 0);
    }
}
