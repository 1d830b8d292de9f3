//! Persisted login session
//!
//! A small JSON file `{ "isLoggedIn": bool, "user": {...} }`. A missing or
//! unreadable file means logged out; sessions do not expire.

use super::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default session file name, relative to the working directory
pub const DEFAULT_SESSION_FILE: &str = ".sheet_session.json";

/// The signed-in user as read from the users sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub is_logged_in: bool,
    #[serde(default)]
    pub user: Option<UserRecord>,
}

impl Session {
    /// The current user, only while logged in
    pub fn user(&self) -> Option<&UserRecord> {
        if self.is_logged_in {
            self.user.as_ref()
        } else {
            None
        }
    }
}

/// File-backed session storage
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SessionStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the session; any failure means logged out
    pub fn load(&self) -> Session {
        match fs::File::open(&self.path) {
            Ok(file) => match serde_json::from_reader::<_, Session>(file) {
                Ok(session) => {
                    debug!(path = ?self.path, logged_in = session.is_logged_in, "session loaded");
                    session
                }
                Err(e) => {
                    warn!("Failed to parse session file {:?}: {}. Treating as logged out.", self.path, e);
                    Session::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Session::default(),
            Err(e) => {
                warn!("Session file {:?} unreadable ({}). Treating as logged out.", self.path, e);
                Session::default()
            }
        }
    }

    pub fn current_user(&self) -> Option<UserRecord> {
        self.load().user().cloned()
    }

    /// Persist a logged-in session for `user`
    pub fn login(&self, user: UserRecord) -> Result<Session> {
        let session = Session {
            is_logged_in: true,
            user: Some(user),
        };
        let json = serde_json::to_string_pretty(&session)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, json)?;
        info!(path = ?self.path, "session saved");
        Ok(session)
    }

    /// Remove the session file; already logged out is not an error
    pub fn logout(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = ?self.path, "session cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
