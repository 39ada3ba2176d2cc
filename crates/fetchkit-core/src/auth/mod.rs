//! Credentials handed to remote operations.
//!
//! This module provides:
//! - `CredentialSource`: where an accessor gets the current credential
//! - `Session`: a shared token that can be replaced or cleared at runtime
//! - `StaticCredential`: a fixed token, e.g. from configuration

pub mod session;

pub use session::{CredentialSource, Session, SessionData, StaticCredential};
