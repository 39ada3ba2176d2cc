use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};

use crate::api::RemoteError;
use crate::auth::{CredentialSource, StaticCredential};
use crate::cache::EphemeralCache;
use crate::status::{ErrorKind, StatusController};

use super::invalidation::Invalidation;

type Fetcher<T> =
    Box<dyn Fn(Option<String>) -> BoxFuture<'static, Result<T, RemoteError>> + Send + Sync>;

/// Whether remote calls need a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthPolicy {
    /// Abort before calling out when no credential is available.
    Required,
    /// Call out with whatever credential is available, possibly none.
    #[default]
    Anonymous,
}

/// Snapshot of everything a view needs to render a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct ResourceState<T> {
    pub data: T,
    pub loading: bool,
    pub error: Option<String>,
    pub message: Option<String>,
}

struct MissingCredential;

/// A remotely backed value read through the ephemeral cache.
///
/// Reads are cache-first: a fresh entry under `key` is returned without
/// calling the fetcher. Writes go through `mutate`, which invalidates the
/// affected keys once the remote call succeeds. Every outcome is mirrored
/// into the resource's own `StatusController`; remote errors never escape
/// as `Err`, callers get `None` and the status carries the message.
///
/// Overlapping calls are not coalesced. Two concurrent misses both call the
/// fetcher and the one that finishes last owns the cache entry.
pub struct Resource<T> {
    key: String,
    max_age: Duration,
    cache: EphemeralCache,
    status: StatusController,
    data: Mutex<T>,
    fetcher: Fetcher<T>,
    credentials: Arc<dyn CredentialSource>,
    auth: AuthPolicy,
    fetched_message: String,
    mutated_message: String,
}

impl<T> Resource<T>
where
    T: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new<F, Fut>(key: impl Into<String>, cache: EphemeralCache, fetcher: F) -> Self
    where
        F: Fn(Option<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, RemoteError>> + Send + 'static,
    {
        let max_age = cache.default_max_age();
        Self {
            key: key.into(),
            max_age,
            cache,
            status: StatusController::new(),
            data: Mutex::new(T::default()),
            fetcher: Box::new(move |credential| fetcher(credential).boxed()),
            credentials: Arc::new(StaticCredential::none()),
            auth: AuthPolicy::Anonymous,
            fetched_message: "Data loaded".to_string(),
            mutated_message: "Changes saved".to_string(),
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Use `source` for credentials and require one for every call.
    pub fn with_credentials(mut self, source: Arc<dyn CredentialSource>) -> Self {
        self.credentials = source;
        self.auth = AuthPolicy::Required;
        self
    }

    pub fn with_auth_policy(mut self, auth: AuthPolicy) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_status(mut self, status: StatusController) -> Self {
        self.status = status;
        self
    }

    pub fn with_messages(mut self, fetched: impl Into<String>, mutated: impl Into<String>) -> Self {
        self.fetched_message = fetched.into();
        self.mutated_message = mutated.into();
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn status(&self) -> &StatusController {
        &self.status
    }

    fn lock_data(&self) -> MutexGuard<'_, T> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last value loaded into this resource, or `T::default()`.
    pub fn data(&self) -> T {
        self.lock_data().clone()
    }

    pub fn state(&self) -> ResourceState<T> {
        let status = self.status.snapshot();
        ResourceState {
            data: self.data(),
            loading: status.loading,
            error: status.error,
            message: status.message,
        }
    }

    /// Tear the resource down. Later remote calls are refused. Calls still in
    /// flight may finish and write through to the shared cache, but leave data
    /// and status alone.
    pub fn dispose(&self) {
        self.status.dispose();
    }

    fn credential(&self) -> Result<Option<String>, MissingCredential> {
        let credential = self.credentials.credential();
        if credential.is_none() && self.auth == AuthPolicy::Required {
            warn!(key = %self.key, "No credential available, skipping remote call");
            self.status.fail(ErrorKind::MissingCredential, "");
            return Err(MissingCredential);
        }
        Ok(credential)
    }

    /// Read-through: fresh cache entry if there is one, otherwise the remote.
    pub async fn fetch(&self) -> Option<T> {
        if let Some(value) = self.cache.get_within::<T>(&self.key, self.max_age) {
            debug!(key = %self.key, "Cache hit");
            if !self.status.is_disposed() {
                *self.lock_data() = value.clone();
                self.status.settle();
            }
            return Some(value);
        }

        debug!(key = %self.key, "Cache miss");
        self.load().await
    }

    /// Fetch from the remote regardless of what the cache holds.
    pub async fn refetch(&self) -> Option<T> {
        self.load().await
    }

    async fn load(&self) -> Option<T> {
        if self.status.is_disposed() {
            debug!(key = %self.key, "Resource disposed, not fetching");
            return None;
        }
        let credential = self.credential().ok()?;
        self.status.begin_and_clear();

        match (self.fetcher)(credential).await {
            Ok(value) => {
                let written = self.cache.try_set(&self.key, &value, self.max_age);
                if self.status.is_disposed() {
                    debug!(key = %self.key, "Resource disposed during fetch");
                    return Some(value);
                }

                *self.lock_data() = value.clone();
                match written {
                    Ok(()) => self.status.succeed(self.fetched_message.as_str()),
                    Err(e) => {
                        warn!(key = %self.key, error = %e, "Fetched value could not be cached");
                        self.status.fail(ErrorKind::CacheWrite, e.to_string());
                    }
                }
                Some(value)
            }
            Err(e) => {
                error!(key = %self.key, error = %e, "Fetch failed");
                self.status.fail(e.kind(), e.detail());
                None
            }
        }
    }

    /// Run a remote write and purge this resource's own cache entry on success.
    pub async fn mutate<R, M, Fut>(&self, op: M) -> Option<R>
    where
        M: FnOnce(Option<String>) -> Fut,
        Fut: Future<Output = Result<R, RemoteError>>,
    {
        self.mutate_with(op, Invalidation::own()).await
    }

    /// Run a remote write, then apply `invalidation` if it succeeded.
    /// A failed write leaves the cache untouched.
    pub async fn mutate_with<R, M, Fut>(&self, op: M, invalidation: Invalidation) -> Option<R>
    where
        M: FnOnce(Option<String>) -> Fut,
        Fut: Future<Output = Result<R, RemoteError>>,
    {
        if self.status.is_disposed() {
            debug!(key = %self.key, "Resource disposed, not mutating");
            return None;
        }
        let credential = self.credential().ok()?;
        self.status.begin_and_clear();

        match op(credential).await {
            Ok(output) => {
                for key in invalidation.keys(&self.key) {
                    debug!(key, "Invalidating cache entry");
                    self.cache.purge(key);
                }
                if self.status.is_disposed() {
                    debug!(key = %self.key, "Resource disposed during mutation");
                    return Some(output);
                }
                // A failed refetch leaves its error showing
                if invalidation.refetches() && self.load().await.is_none() {
                    return Some(output);
                }
                self.status.succeed(self.mutated_message.as_str());
                Some(output)
            }
            Err(e) => {
                error!(key = %self.key, error = %e, "Mutation failed");
                self.status.fail(e.kind(), e.detail());
                None
            }
        }
    }
}

impl<T> std::fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("key", &self.key)
            .field("max_age", &self.max_age)
            .field("auth", &self.auth)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
