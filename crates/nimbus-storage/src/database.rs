//! Database connection and operations

use parking_lot::Mutex;
use rusqlite::Connection;
use serde::Serialize;
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::worker::TransactionWorker;
use crate::{Result, StorageError};

/// Commit-or-rollback decision returned by a transaction block.
///
/// Returning `Err` from the block also rolls the transaction back, with the
/// error propagated to the caller (current-thread mode) or logged by the
/// worker (background mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome<T> {
    /// Commit the transaction and yield a value
    Commit(T),
    /// Discard every write made by the block
    Rollback,
}

pub struct Database {
    conn: Arc<Mutex<Connection>>,
    config: StorageConfig,
    worker: Arc<TransactionWorker>,
}

impl Database {
    /// Open (or create) the database file and spawn the transaction worker.
    ///
    /// A failed open is fatal: no handle is returned and nothing is spawned.
    pub fn open(config: StorageConfig) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&config.database_path)?;

        // Enable foreign keys
        conn.pragma_update(None, "foreign_keys", "ON")?;

        // WAL mode for better concurrent performance
        let _: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        tracing::info!(path = %config.database_path.display(), "Opened database");

        Self::with_connection_inner(conn, config)
    }

    pub fn open_in_memory(config: StorageConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Self::with_connection_inner(conn, config)
    }

    fn with_connection_inner(conn: Connection, config: StorageConfig) -> Result<Self> {
        let conn = Arc::new(Mutex::new(conn));
        let worker = Arc::new(TransactionWorker::spawn(Arc::clone(&conn))?);

        Ok(Self {
            conn,
            config,
            worker,
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Execute caller-provided DDL verbatim.
    ///
    /// The statement is not parsed or validated; the name is used for logging
    /// and error context only. A malformed statement surfaces as
    /// [`StorageError::Sqlite`].
    pub fn create_table(&self, name: &str, sql: &str) -> Result<()> {
        check_table_name(name)?;

        self.with_connection(|conn| {
            conn.execute_batch(sql)?;
            Ok(())
        })?;

        tracing::info!(table = %name, "Created table");
        Ok(())
    }

    /// Drop a table and all of its rows. Succeeds when the table does not exist.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        check_table_name(name)?;

        self.with_connection(|conn| {
            conn.execute(&format!("DROP TABLE IF EXISTS {name}"), [])?;
            Ok(())
        })?;

        tracing::info!(table = %name, "Dropped table");
        Ok(())
    }

    /// Delete all rows from a table, keeping its schema.
    pub fn empty_table(&self, name: &str) -> Result<()> {
        check_table_name(name)?;

        let deleted = self.with_connection(|conn| {
            let deleted = conn.execute(&format!("DELETE FROM {name}"), [])?;
            Ok(deleted)
        })?;

        tracing::info!(table = %name, rows = deleted, "Emptied table");
        Ok(())
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        check_table_name(name)?;

        self.with_connection(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    pub fn count_rows(&self, name: &str) -> Result<u64> {
        check_table_name(name)?;

        self.with_connection(|conn| {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {name}"), [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run a transaction block synchronously on the calling thread.
    ///
    /// Returns `Ok(Some(value))` when the block commits, `Ok(None)` when it
    /// asks for rollback, and `Err` when it fails (also rolled back).
    /// Concurrent callers serialize on the connection lock.
    pub fn run_in_transaction<T, F>(&self, f: F) -> Result<Option<T>>
    where
        F: FnOnce(&Connection) -> Result<TxOutcome<T>>,
    {
        let mut conn = self.conn.lock();
        run_transaction(&mut conn, f)
    }

    /// Enqueue a transaction block on the dedicated worker thread.
    ///
    /// Fire-and-forget: the call returns as soon as the block is queued.
    /// Blocks run in submission order and never interleave. Failures inside
    /// the block are logged by the worker.
    pub fn run_in_background_transaction<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&Connection) -> Result<TxOutcome<()>> + Send + 'static,
    {
        self.worker.submit(f)
    }

    pub fn info(&self) -> Result<DatabaseInfo> {
        self.with_connection(|conn| {
            let path = conn
                .path()
                .filter(|p| !p.is_empty())
                .unwrap_or(":memory:")
                .to_string();
            let journal_mode: String =
                conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;

            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )?;
            let names: Vec<String> = stmt
                .query_map([], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect();

            let mut tables = Vec::with_capacity(names.len());
            for name in names {
                let rows: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {name}"), [], |row| row.get(0))?;
                tables.push(TableInfo {
                    name,
                    rows: rows as u64,
                });
            }

            Ok(DatabaseInfo {
                path,
                journal_mode,
                tables,
            })
        })
    }

    /// Emit the current database state to the log.
    pub fn log_info(&self) -> Result<()> {
        let info = self.info()?;

        tracing::info!(
            path = %info.path,
            journal_mode = %info.journal_mode,
            tables = info.tables.len(),
            "Database info"
        );
        for table in &info.tables {
            tracing::info!(table = %table.name, rows = table.rows, "Table info");
        }

        Ok(())
    }

    /// Shut down the transaction worker (pending blocks still run) and, when
    /// this is the last handle, close the underlying connection.
    pub fn close(self) -> Result<()> {
        self.worker.shutdown();
        drop(self.worker);

        if let Some(mutex) = Arc::into_inner(self.conn) {
            mutex.into_inner().close().map_err(|(_, e)| e)?;
        }

        tracing::info!("Closed database");
        Ok(())
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            config: self.config.clone(),
            worker: Arc::clone(&self.worker),
        }
    }
}

/// Diagnostic snapshot of the database state
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseInfo {
    pub path: String,
    pub journal_mode: String,
    pub tables: Vec<TableInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub rows: u64,
}

pub(crate) fn run_transaction<T, F>(conn: &mut Connection, f: F) -> Result<Option<T>>
where
    F: FnOnce(&Connection) -> Result<TxOutcome<T>>,
{
    let tx = conn.transaction()?;

    match f(&tx) {
        Ok(TxOutcome::Commit(value)) => {
            tx.commit()?;
            Ok(Some(value))
        }
        Ok(TxOutcome::Rollback) => {
            tx.rollback()?;
            Ok(None)
        }
        // The transaction rolls back when dropped
        Err(e) => Err(e),
    }
}

// Names are interpolated into SQL verbatim, like the caller-supplied DDL.
// Only emptiness is rejected.
fn check_table_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(StorageError::EmptyTableName);
    }
    Ok(())
}
