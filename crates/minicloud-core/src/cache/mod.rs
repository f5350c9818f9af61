//! In-memory resource caching.
//!
//! This module provides the `ResourceCache` used to serve list reads with
//! bounded staleness. Concurrent reads of the same key share one fetch, and
//! mutations invalidate the affected keys so the next read reloads.

pub mod keys;
pub mod store;

pub use keys::CacheKey;
pub use store::{CacheEntry, ResourceCache};
