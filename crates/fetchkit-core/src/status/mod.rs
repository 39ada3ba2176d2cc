//! Transient status for UI-facing operations.
//!
//! A `StatusController` holds the loading flag, error text and success text
//! of one logical operation. Errors and messages clear themselves after
//! `DEFAULT_CLEAR_AFTER` so stale feedback never lingers on screen.

pub mod controller;
pub mod kind;

pub use controller::{Status, StatusController, DEFAULT_CLEAR_AFTER};
pub use kind::ErrorKind;
