//! Storage media the ephemeral cache writes through.
//!
//! The cache never touches a global store directly; it is handed a
//! `StoragePort` at construction. Two media ship with the crate:
//! `MemoryStorage` for an in-process session and `FileStorage` for a
//! directory of JSON files that survives restarts.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// File extension for entries written by `FileStorage`.
const ENTRY_EXTENSION: &str = "json";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// A key-value medium addressed by string keys.
///
/// Operations are synchronous and atomic per key. `ttl` is a retention hint
/// for media that expire on their own; the built-in media record nothing and
/// keep entries until they are removed.
pub trait StoragePort: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn write(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every key the medium holds, not only the ones the cache wrote.
    fn wipe_all(&self) -> Result<(), StorageError>;
}

/// In-process storage backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl StoragePort for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), StorageError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries().remove(key);
        Ok(())
    }

    fn wipe_all(&self) -> Result<(), StorageError> {
        self.entries().clear();
        Ok(())
    }
}

/// Directory-backed storage, one file per key.
///
/// File names are the SHA-256 of the key, so keys of any length or content
/// map to a fixed-length name. The first line of each file holds the
/// hex-encoded key; a file whose header does not match is treated as absent.
/// Writes go to a temporary file in the same directory and are renamed into
/// place, so readers see either the old entry or the new one.
///
/// `wipe_all` deletes every regular file in the directory, including files
/// other code placed there.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let name = hex::encode(hasher.finalize());
        self.dir.join(format!("{}.{}", name, ENTRY_EXTENSION))
    }

    fn header(key: &str) -> String {
        hex::encode(key.as_bytes())
    }
}

impl StoragePort for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let contents = match std::fs::read_to_string(self.entry_path(key)) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match contents.split_once('\n') {
            Some((header, value)) if header == Self::header(key) => Ok(Some(value.to_string())),
            _ => {
                debug!(key, "Entry file belongs to another key or has no header");
                Ok(None)
            }
        }
    }

    fn write(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), StorageError> {
        let mut file = NamedTempFile::new_in(&self.dir)?;
        writeln!(file, "{}", Self::header(key))?;
        file.write_all(value.as_bytes())?;
        file.persist(self.entry_path(key)).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn wipe_all(&self) -> Result<(), StorageError> {
        let mut removed = 0usize;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        debug!(dir = %self.dir.display(), removed, "Wiped storage directory");
        Ok(())
    }
}
