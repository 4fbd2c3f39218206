//! Unified path management for ghostwriter configuration and storage.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/ghostwriter/       # Config directory
//! ├── config.toml              # Behaviour settings
//! └── secret.json              # API keys
//!
//! ~/.local/share/ghostwriter/  # Data directory
//! └── storage/                 # DirStorage: one JSON file per key
//! ```

use std::path::PathBuf;

const APP_NAME: &str = "ghostwriter";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for ghostwriter_core::GhostError {
    fn from(err: PathError) -> Self {
        ghostwriter_core::GhostError::config(err.to_string())
    }
}

/// Platform paths for ghostwriter (XDG on Linux, the platform default elsewhere).
pub struct GhostwriterPaths;

impl GhostwriterPaths {
    /// Returns the configuration directory (e.g. `~/.config/ghostwriter/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the data directory (e.g. `~/.local/share/ghostwriter/`).
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or(PathError::HomeDirNotFound)
    }

    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Path to the secrets file.
    ///
    /// # Security Note
    ///
    /// Keep this file readable by the current user only (e.g. mode 600).
    pub fn secret_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("secret.json"))
    }

    /// Default local-storage directory.
    pub fn storage_dir() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("storage"))
    }
}
