use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Settings for the embedded sled document store
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding the database files
    /// Default: "./db"
    #[serde(default = "default_db_root_dir")]
    pub db_root_dir: PathBuf,

    /// Page cache size in bytes
    /// Default: 64MB
    #[serde(default = "default_cache_capacity_bytes")]
    pub cache_capacity_bytes: u64,

    /// Background flush interval; `None` leaves flushing to explicit calls
    #[serde(default = "default_flush_every_ms")]
    pub flush_every_ms: Option<u64>,

    #[serde(default = "default_use_compression")]
    pub use_compression: bool,

    /// Open a throwaway database that is removed when the store is dropped
    #[serde(default)]
    pub temporary: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_root_dir: default_db_root_dir(),
            cache_capacity_bytes: default_cache_capacity_bytes(),
            flush_every_ms: default_flush_every_ms(),
            use_compression: default_use_compression(),
            temporary: false,
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.temporary && self.db_root_dir.as_os_str().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "storage.db_root_dir must be set unless storage.temporary is enabled".into(),
            )));
        }

        if self.cache_capacity_bytes == 0 {
            return Err(Error::Config(ConfigError::Message(
                "storage.cache_capacity_bytes must be greater than 0".into(),
            )));
        }

        if let Some(0) = self.flush_every_ms {
            return Err(Error::Config(ConfigError::Message(
                "storage.flush_every_ms must be at least 1ms when set".into(),
            )));
        }

        Ok(())
    }
}

fn default_db_root_dir() -> PathBuf {
    PathBuf::from("./db")
}
fn default_cache_capacity_bytes() -> u64 {
    64 * 1024 * 1024
}
fn default_flush_every_ms() -> Option<u64> {
    Some(100)
}
fn default_use_compression() -> bool {
    true
}
