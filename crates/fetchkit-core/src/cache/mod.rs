//! Ephemeral key-value caching.
//!
//! `EphemeralCache` stores JSON values under caller-chosen keys together with
//! their write time and answers "is this still fresh?" without any network
//! I/O. Freshness is decided when an entry is read; nothing is swept in the
//! background.
//!
//! The storage medium is injected through `StoragePort`:
//! - `MemoryStorage` for a single process session
//! - `FileStorage` for a directory of JSON files

pub mod clock;
pub mod error;
pub mod manager;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CacheError;
pub use manager::{CachedEntry, EphemeralCache, DEFAULT_MAX_AGE};
pub use storage::{FileStorage, MemoryStorage, StorageError, StoragePort};
