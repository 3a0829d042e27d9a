use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::file::{FileAccess, SettingsError, remove_file, write_json_file};

pub const SESSION_FILE_NAME: &str = "session.json";

/// What is kept between runs to sign back in without a password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSession {
    pub refresh_token: String,
}

impl std::fmt::Debug for SavedSession {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("SavedSession").finish_non_exhaustive()
    }
}

/// Owner-only JSON file holding the [`SavedSession`] of the last sign-in.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SESSION_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the saved session. A missing or unreadable file means there is none.
    pub fn load(&self) -> Option<SavedSession> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return None,
            Err(error) => {
                tracing::warn!(path = ?self.path, error = %error, "cannot read saved session");
                return None;
            }
        };

        match serde_json::from_slice::<SavedSession>(&content) {
            Ok(saved) if !saved.refresh_token.trim().is_empty() => Some(saved),
            Ok(_) => None,
            Err(error) => {
                tracing::warn!(
                    path = ?self.path,
                    error = %error,
                    "ignoring corrupt saved session"
                );
                None
            }
        }
    }

    pub fn save(&self, session: &SavedSession) -> Result<(), SettingsError> {
        write_json_file(&self.path, session, FileAccess::Private)
    }

    pub fn clear(&self) -> Result<(), SettingsError> {
        remove_file(&self.path)
    }
}
