//! Storage configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::retention::{CacheTable, CACHE_RETENTION_SECS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Maximum age of cache rows before the retention sweep deletes them
    pub cache_retention_secs: i64,
    /// Tables subject to the retention sweep
    pub cache_tables: Vec<CacheTable>,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("nimbus.db"),
            cache_retention_secs: CACHE_RETENTION_SECS,
            cache_tables: Vec::new(),
        }
    }

    /// Designate a table for the retention sweep
    pub fn with_cache_table(mut self, table: CacheTable) -> Self {
        self.cache_tables.push(table);
        self
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("Nimbus"))
            .unwrap_or_else(|| PathBuf::from(".nimbus"))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

// Simple dirs implementation for the platform data directory
mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}
