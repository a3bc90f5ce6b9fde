//! Nimbus Storage Layer
//!
//! SQLite-based persistence for the Nimbus client: table lifecycle helpers,
//! transactional execution on the calling thread or on a dedicated background
//! worker, and a retention sweep for cache tables.
//!
//! Callers supply raw SQL; the facade forwards it verbatim. The usual forms:
//!
//! - Create: `CREATE TABLE contacts (id INTEGER PRIMARY KEY, phone TEXT UNIQUE NOT NULL, country TEXT)`
//! - Insert: `INSERT INTO contacts (phone, country) VALUES (?1, ?2)`, fails on a UNIQUE conflict
//! - Upsert: `REPLACE INTO contacts (phone, country) VALUES (?1, ?2)`, overwrites on a UNIQUE conflict
//! - Update: `UPDATE contacts SET country = ?1 WHERE phone = ?2`, affects all matching rows
//! - Delete: `DELETE FROM contacts WHERE country = ?1`, affects all matching rows
//! - Drop: `DROP TABLE IF EXISTS contacts`

mod config;
mod database;
mod error;
mod retention;
mod worker;

pub use config::StorageConfig;
pub use database::{Database, DatabaseInfo, TableInfo, TxOutcome};
pub use error::StorageError;
pub use retention::{CacheTable, CACHE_RETENTION_SECS};

pub type Result<T> = std::result::Result<T, StorageError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
