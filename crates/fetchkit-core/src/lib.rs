//! fetchkit core - cached resource accessors for a remote REST service.
//!
//! Every read or write against the remote goes through a `Resource`, which
//! combines two pieces:
//! - `EphemeralCache`: time-bounded values in an injected storage medium
//! - `StatusController`: loading/error/message that clears itself
//!
//! The network side is any async function returning `Result<T, RemoteError>`;
//! `ApiClient` is the bundled HTTP implementation.

pub mod accessor;
pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod status;

pub use accessor::{AuthPolicy, Invalidation, Resource, ResourceState};
pub use api::{ApiClient, RemoteError};
pub use auth::{CredentialSource, Session, SessionData, StaticCredential};
pub use cache::{CacheError, EphemeralCache, FileStorage, MemoryStorage, StoragePort};
pub use config::Config;
pub use status::{ErrorKind, Status, StatusController};
