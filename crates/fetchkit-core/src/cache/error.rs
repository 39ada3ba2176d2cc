use thiserror::Error;

use super::storage::StorageError;

/// Failure to persist a cache entry.
///
/// Reads never produce this: a missing, corrupt or unreadable entry is a miss.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to serialize cache entry for {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write cache entry for {key}: {source}")]
    Storage {
        key: String,
        #[source]
        source: StorageError,
    },
}

impl CacheError {
    pub fn key(&self) -> &str {
        match self {
            CacheError::Serialize { key, .. } | CacheError::Storage { key, .. } => key,
        }
    }
}
