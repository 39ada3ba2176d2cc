use serde::{Deserialize, Serialize};

/// Classification of a failed operation, used to build the text shown in
/// `Status::error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum ErrorKind {
    /// 401 from the remote service.
    Unauthorized,
    /// A credential was required and none was available; no call was made.
    MissingCredential,
    /// 400 from the remote service.
    Validation,
    /// 404 from the remote service.
    NotFound,
    /// Any other remote, network or decoding failure.
    Remote,
    /// The value was fetched but could not be persisted to the cache.
    CacheWrite,
}

impl ErrorKind {
    /// Human-readable message for this kind of failure.
    pub fn describe(&self, detail: &str) -> String {
        let detail = detail.trim();
        match self {
            ErrorKind::Unauthorized => "Session expired. Please log in again.".to_string(),
            ErrorKind::MissingCredential => "Not authenticated. Please log in.".to_string(),
            ErrorKind::Validation if detail.is_empty() => "Invalid request.".to_string(),
            ErrorKind::Validation => format!("Invalid request: {}", detail),
            ErrorKind::NotFound if detail.is_empty() => "Not found.".to_string(),
            ErrorKind::NotFound => format!("Not found: {}", detail),
            ErrorKind::Remote if detail.is_empty() => "Request failed.".to_string(),
            ErrorKind::Remote => format!("Error: {}", detail),
            ErrorKind::CacheWrite => "Could not save data for offline use.".to_string(),
        }
    }
}
