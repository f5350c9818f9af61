//! Authentication state for the MiniCloud client.
//!
//! This module provides:
//! - `SessionStore`: the active credential, persisted to `session.json`
//! - `ReauthSignal`: edge-triggered "sign in again" notification
//! - `CredentialStore`: remembered passwords via the OS keychain

pub mod credentials;
pub mod session;
pub mod signal;

pub use credentials::CredentialStore;
pub use session::{Credential, SessionStore, SESSION_FILE};
pub use signal::{ReauthSignal, ReauthState};
