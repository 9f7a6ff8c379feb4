//! Session persistence
//!
//! Stores the last [`Session`] snapshot as JSON so cookies and the referer
//! survive between runs. By default the file lives in the system's standard
//! cache directory.

use super::Session;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading or storing a session
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// The platform has no cache directory for this user
    #[error("No cache directory available to keep the session in")]
    NoCacheDirectory,

    #[error("Cannot create session directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot read session from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing failed, or the session could not be encoded
    #[error("Cannot save session to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file exists but is not a session written by this tool
    #[error("Session file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// File name of the persisted session inside the store directory
const SESSION_FILE: &str = "session.json";

/// JSON file holding a persisted [`Session`]
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Opens the store in the platform cache directory
    ///
    /// - Linux: `~/.cache/tusubtitulo/session/session.json`
    /// - macOS: `~/Library/Caches/com.tusubtitulo.tusubtitulo/session/session.json`
    /// - Windows: `%LOCALAPPDATA%\tusubtitulo\tusubtitulo\cache\session\session.json`
    pub fn open_default() -> Result<Self, SessionStoreError> {
        let proj_dirs = directories::ProjectDirs::from("com", "tusubtitulo", "tusubtitulo")
            .ok_or(SessionStoreError::NoCacheDirectory)?;

        let dir = proj_dirs.cache_dir().join("session");
        fs::create_dir_all(&dir).map_err(|e| SessionStoreError::CreateDirectory {
            path: dir.clone(),
            source: e,
        })?;

        Ok(Self::at(dir.join(SESSION_FILE)))
    }

    /// Uses an explicit file path for the session
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the session file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored session
    ///
    /// Returns `Ok(None)` if nothing has been stored yet, and an error if the
    /// file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Option<Session>, SessionStoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| SessionStoreError::Read {
            path: self.path.clone(),
            source: e,
        })?;

        let session =
            serde_json::from_str(&content).map_err(|e| SessionStoreError::Corrupt {
                path: self.path.clone(),
                source: e,
            })?;

        Ok(Some(session))
    }

    /// Stores the session, replacing any previous one
    pub fn store(&self, session: &Session) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| SessionStoreError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        serde_json::to_string_pretty(session)
            .map_err(std::io::Error::from)
            .and_then(|content| fs::write(&self.path, content))
            .map_err(|e| SessionStoreError::Write {
                path: self.path.clone(),
                source: e,
            })
    }
}
