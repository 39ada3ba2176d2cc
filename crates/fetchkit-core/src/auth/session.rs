use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default token lifetime in minutes.
pub const TOKEN_EXPIRY_MINUTES: i64 = 30;

/// Something that can hand an accessor the current credential.
///
/// The credential is opaque: accessors only check for its presence and pass
/// it on to the remote operation.
pub trait CredentialSource: Send + Sync {
    fn credential(&self) -> Option<String>;
}

/// A credential that never changes.
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(Option<String>);

impl StaticCredential {
    pub fn new(credential: impl Into<String>) -> Self {
        Self(Some(credential.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl From<Option<String>> for StaticCredential {
    fn from(credential: Option<String>) -> Self {
        Self(credential.filter(|c| !c.is_empty()))
    }
}

impl CredentialSource for StaticCredential {
    fn credential(&self) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_in_minutes: i64,
}

impl SessionData {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            created_at: Utc::now(),
            expires_in_minutes: TOKEN_EXPIRY_MINUTES,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.created_at + Duration::minutes(self.expires_in_minutes)
    }
}

/// Shared, replaceable login session.
///
/// Accessors read the token at call time, so logging in or out is seen by
/// every accessor holding the session.
#[derive(Debug, Default)]
pub struct Session {
    data: RwLock<Option<SessionData>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update session with new data
    pub fn update(&self, data: SessionData) {
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = Some(data);
    }

    /// Clear session data
    pub fn clear(&self) {
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn data(&self) -> Option<SessionData> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CredentialSource for Session {
    fn credential(&self) -> Option<String> {
        self.data()
            .filter(|d| !d.is_expired())
            .map(|d| d.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_credential() {
        assert_eq!(StaticCredential::new("t").credential().as_deref(), Some("t"));
        assert_eq!(StaticCredential::none().credential(), None);
        assert_eq!(StaticCredential::from(Some(String::new())).credential(), None);
    }

    #[test]
    fn test_session_credential_lifecycle() {
        let session = Session::new();
        assert_eq!(session.credential(), None);

        session.update(SessionData::new("abc"));
        assert_eq!(session.credential().as_deref(), Some("abc"));

        session.clear();
        assert_eq!(session.credential(), None);
    }

    #[test]
    fn test_expired_session_has_no_credential() {
        let session = Session::new();
        let mut data = SessionData::new("abc");
        data.created_at = Utc::now() - Duration::minutes(TOKEN_EXPIRY_MINUTES + 1);
        assert!(data.is_expired());

        session.update(data);
        assert!(session.data().is_some());
        assert_eq!(session.credential(), None);
    }
}
