use thiserror::Error;

use crate::status::ErrorKind;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Unauthorized - credential may be expired")]
    Unauthorized,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl RemoteError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status {
            400 => RemoteError::Validation(truncated),
            401 => RemoteError::Unauthorized,
            404 => RemoteError::NotFound(truncated),
            _ => RemoteError::Status {
                status,
                body: truncated,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RemoteError::Unauthorized => ErrorKind::Unauthorized,
            RemoteError::Validation(_) => ErrorKind::Validation,
            RemoteError::NotFound(_) => ErrorKind::NotFound,
            RemoteError::Status { .. }
            | RemoteError::NetworkError(_)
            | RemoteError::InvalidResponse(_) => ErrorKind::Remote,
        }
    }

    /// Detail passed to `ErrorKind::describe` when reporting this error.
    pub fn detail(&self) -> String {
        match self {
            RemoteError::Unauthorized => String::new(),
            RemoteError::Validation(body) | RemoteError::NotFound(body) => body.clone(),
            RemoteError::NetworkError(e) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            RemoteError::NetworkError(_) => "Network error. Check your connection.".to_string(),
            other => other.to_string(),
        }
    }
}
