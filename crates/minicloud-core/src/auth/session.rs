use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::ReauthSignal;

/// Session file name in the data directory
pub const SESSION_FILE: &str = "session.json";

/// The active bearer token and the account it belongs to.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub identity: String,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(token: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            identity: identity.into(),
            created_at: Utc::now(),
        }
    }
}

// Keep tokens out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("identity", &self.identity)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Process-wide session state, optionally backed by a JSON file.
///
/// Every mutation is written through to disk; persistence problems are logged
/// and never fail the operation.
#[derive(Debug)]
pub struct SessionStore {
    path: Option<PathBuf>,
    credential: RwLock<Option<Credential>>,
    signal: ReauthSignal,
}

impl SessionStore {
    /// Open the session stored at `path`. A missing or unreadable file means
    /// "not authenticated".
    pub fn open(path: PathBuf) -> Self {
        let credential = match read_session_file(&path) {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Ignoring unreadable session file");
                None
            }
        };
        debug!(authenticated = credential.is_some(), "Session loaded");

        Self {
            path: Some(path),
            credential: RwLock::new(credential),
            signal: ReauthSignal::new(),
        }
    }

    /// Session that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            path: None,
            credential: RwLock::new(None),
            signal: ReauthSignal::new(),
        }
    }

    /// Replace the active credential and re-arm the re-authentication signal.
    pub fn set_credential(&self, token: impl Into<String>, identity: impl Into<String>) {
        let credential = Credential::new(token, identity);
        let mut guard = self.write();
        self.persist(Some(&credential));
        info!(identity = %credential.identity, "Session started");
        *guard = Some(credential);
        drop(guard);
        self.signal.reset();
    }

    pub fn credential(&self) -> Option<Credential> {
        self.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.read().as_ref().map(|c| c.token.clone())
    }

    pub fn identity(&self) -> Option<String> {
        self.read().as_ref().map(|c| c.identity.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    /// Remove the active credential. Returns `false` if there was none.
    pub fn clear_credential(&self) -> bool {
        let mut guard = self.write();
        if guard.is_none() {
            return false;
        }
        *guard = None;
        self.persist(None);
        info!("Session cleared");
        true
    }

    /// Clear the session only if it still holds `token`.
    ///
    /// A rejection of a request sent with an older token must not wipe a
    /// credential issued by a later sign-in.
    pub fn clear_if_current(&self, token: &str) -> bool {
        let mut guard = self.write();
        match guard.as_ref() {
            Some(current) if current.token == token => {
                *guard = None;
                self.persist(None);
                info!("Session cleared after rejection");
                true
            }
            _ => false,
        }
    }

    pub fn reauth_signal(&self) -> &ReauthSignal {
        &self.signal
    }

    fn persist(&self, credential: Option<&Credential>) {
        let Some(ref path) = self.path else {
            return;
        };
        let result = match credential {
            Some(credential) => write_session_file(path, credential),
            None => remove_session_file(path),
        };
        if let Err(e) = result {
            warn!(error = %e, path = %path.display(), "Failed to persist session");
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Credential>> {
        self.credential.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Credential>> {
        self.credential.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn read_session_file(path: &Path) -> Result<Option<Credential>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).context("Failed to read session file")?;
    let credential = serde_json::from_str(&contents).context("Failed to parse session file")?;
    Ok(Some(credential))
}

fn write_session_file(path: &Path, credential: &Credential) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create session directory")?;
    }
    let contents = serde_json::to_string_pretty(credential)?;
    std::fs::write(path, contents).context("Failed to write session file")?;
    Ok(())
}

fn remove_session_file(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path).context("Failed to remove session file")?;
    }
    Ok(())
}
