//! Client core for the MiniCloud backend.
//!
//! Front ends build a [`Console`] from a [`Config`] and a [`SessionStore`].
//! Protected calls carry the session token, a rejected token signs the user
//! out and raises the re-auth signal once, and list reads are cached per
//! resource with in-flight requests shared between callers.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod console;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError, BackendStatus, Gateway};
pub use auth::{CredentialStore, ReauthSignal, ReauthState, SessionStore};
pub use cache::{CacheKey, ResourceCache};
pub use config::{Config, Theme};
pub use console::{Console, DEFAULT_QUEUE};
