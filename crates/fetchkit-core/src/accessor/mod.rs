//! Cached resource accessors.
//!
//! A `Resource` ties one cache key to one remote read, with its own
//! transient status. Every endpoint becomes a thin instantiation:
//!
//! - `fetch()` reads through the cache
//! - `mutate()` writes remotely, then invalidates (and optionally refetches)
//! - `state()` gives the data plus loading/error/message for rendering

pub mod invalidation;
pub mod resource;

pub use invalidation::Invalidation;
pub use resource::{AuthPolicy, Resource, ResourceState};
