//! Configuration structures for BurrowDB.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage configuration for the database engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one file per table.
    pub data_dir: PathBuf,
    /// Number of cached pages beyond which the pool starts evicting.
    pub pool_working_set: usize,
    /// Hard ceiling on cached pages; the pool never grows past this.
    pub pool_ceiling: usize,
    /// Enable fsync after page writes.
    pub fsync_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            pool_working_set: 64,
            pool_ceiling: 128,
            fsync_enabled: true,
        }
    }
}

impl StorageConfig {
    /// Returns the ceiling, clamped to at least the working set.
    ///
    /// A ceiling below the working set would make the eviction threshold
    /// unreachable, so the pool treats the larger of the two as the cap.
    pub fn effective_ceiling(&self) -> usize {
        self.pool_ceiling.max(self.pool_working_set).max(1)
    }
}
