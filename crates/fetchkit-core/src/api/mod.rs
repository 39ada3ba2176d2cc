//! REST API client module.
//!
//! `ApiClient` is the concrete "perform network operation" capability used by
//! the accessors. Responses outside the 2xx range become a `RemoteError`,
//! which the accessors classify into status messages.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::RemoteError;
