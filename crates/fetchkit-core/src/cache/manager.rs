use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::error::CacheError;
use super::storage::StoragePort;

/// Default max age for `EphemeralCache::get`.
/// Five minutes keeps list views snappy without serving data that is badly out of date.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(300);

/// Stored form of an entry: `{ "value": <T>, "ts": <epoch millis> }`.
#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    value: &'a T,
    ts: i64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope<T> {
    value: T,
    ts: i64,
}

/// A cache entry read back regardless of freshness.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry<T> {
    pub value: T,
    written_at_ms: i64,
    observed_at_ms: i64,
}

impl<T> CachedEntry<T> {
    pub fn written_at(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.written_at_ms)
            .single()
            .unwrap_or_default()
    }

    /// Age at the moment the entry was read. Negative under clock skew.
    pub fn age(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.observed_at_ms - self.written_at_ms)
    }

    pub fn is_fresh(&self, max_age: Duration) -> bool {
        is_within(self.observed_at_ms, self.written_at_ms, max_age)
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age().num_minutes();
        if minutes < 1 {
            // Covers clock skew too
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

fn is_within(now_ms: i64, written_at_ms: i64, max_age: Duration) -> bool {
    let age = i128::from(now_ms) - i128::from(written_at_ms);
    age < max_age.as_millis() as i128
}

/// Time-bounded key-value cache over a pluggable storage medium.
///
/// Expiry happens at read time only. Stale entries stay in the medium until
/// they are overwritten, purged or the medium is cleared, so they can still
/// be looked at with `inspect`.
///
/// Clone is cheap and every clone shares the same medium.
#[derive(Clone)]
pub struct EphemeralCache {
    storage: Arc<dyn StoragePort>,
    clock: Arc<dyn Clock>,
    default_max_age: Duration,
}

impl EphemeralCache {
    pub fn new(storage: Arc<dyn StoragePort>) -> Self {
        Self {
            storage,
            clock: Arc::new(SystemClock),
            default_max_age: DEFAULT_MAX_AGE,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_default_max_age(mut self, max_age: Duration) -> Self {
        self.default_max_age = max_age;
        self
    }

    pub fn default_max_age(&self) -> Duration {
        self.default_max_age
    }

    /// Write `value` under `key`, replacing whatever was there.
    pub fn try_set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        max_age: Duration,
    ) -> Result<(), CacheError> {
        let envelope = EnvelopeRef {
            value,
            ts: self.clock.now_millis(),
        };
        let contents = serde_json::to_string(&envelope).map_err(|source| CacheError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.storage
            .write(key, &contents, max_age)
            .map_err(|source| CacheError::Storage {
                key: key.to_string(),
                source,
            })?;
        debug!(key, "Cache entry written");
        Ok(())
    }

    /// Like `try_set`, but logs failures instead of returning them.
    /// Returns whether the entry was written.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, max_age: Duration) -> bool {
        match self.try_set(key, value, max_age) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Failed to write cache entry");
                false
            }
        }
    }

    /// Fresh value under `key`, using the cache's default max age.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_within(key, self.default_max_age)
    }

    /// Fresh value under `key`. Missing, expired and unparseable entries are all `None`.
    pub fn get_within<T: DeserializeOwned>(&self, key: &str, max_age: Duration) -> Option<T> {
        let entry = self.inspect::<T>(key)?;
        if entry.is_fresh(max_age) {
            Some(entry.value)
        } else {
            debug!(key, age_ms = entry.age().num_milliseconds(), "Cache entry expired");
            None
        }
    }

    /// Read the entry under `key` whatever its age.
    pub fn inspect<T: DeserializeOwned>(&self, key: &str) -> Option<CachedEntry<T>> {
        let raw = match self.storage.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                debug!(key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str::<Envelope<T>>(&raw) {
            Ok(envelope) => Some(CachedEntry {
                value: envelope.value,
                written_at_ms: envelope.ts,
                observed_at_ms: self.clock.now_millis(),
            }),
            Err(e) => {
                debug!(key, error = %e, "Unparseable cache entry, treating as miss");
                None
            }
        }
    }

    /// Remove the entry under `key` only.
    pub fn purge(&self, key: &str) {
        if let Err(e) = self.storage.remove(key) {
            warn!(key, error = %e, "Failed to purge cache entry");
        }
    }

    /// Wipe the whole storage medium.
    ///
    /// This is not scoped to cache entries: anything else the host stored in
    /// the same medium is removed as well.
    pub fn clear(&self) {
        if let Err(e) = self.storage.wipe_all() {
            warn!(error = %e, "Failed to clear cache storage");
        }
    }
}

impl std::fmt::Debug for EphemeralCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralCache")
            .field("default_max_age", &self.default_max_age)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
