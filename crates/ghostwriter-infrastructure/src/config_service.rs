//! Loading of `config.toml` and `secret.json`.

use crate::paths::GhostwriterPaths;
use ghostwriter_core::config::{GhostwriterConfig, OpenAIConfig, SecretConfig};
use ghostwriter_core::{GhostError, Result};
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_MODEL_ENV: &str = "OPENAI_MODEL_NAME";

/// Reads configuration and secrets from the config directory.
#[derive(Debug, Clone)]
pub struct ConfigService {
    config_file: PathBuf,
    secret_file: PathBuf,
}

impl ConfigService {
    /// Uses the platform config directory.
    pub fn default_location() -> Result<Self> {
        Ok(Self {
            config_file: GhostwriterPaths::config_file()?,
            secret_file: GhostwriterPaths::secret_file()?,
        })
    }

    /// Uses `config.toml` and `secret.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            config_file: dir.join("config.toml"),
            secret_file: dir.join("secret.json"),
        }
    }

    /// Loads `config.toml`; a missing or empty file yields the defaults.
    pub fn load_config(&self) -> Result<GhostwriterConfig> {
        match read_optional(&self.config_file)? {
            Some(content) if !content.trim().is_empty() => toml::from_str(&content).map_err(|e| {
                GhostError::config(format!(
                    "Failed to parse {}: {}",
                    self.config_file.display(),
                    e
                ))
            }),
            _ => Ok(GhostwriterConfig::default()),
        }
    }

    /// Loads `secret.json`; a missing file yields no secrets.
    pub fn load_secrets(&self) -> Result<SecretConfig> {
        match read_optional(&self.secret_file)? {
            Some(content) if !content.trim().is_empty() => {
                serde_json::from_str(&content).map_err(|e| {
                    GhostError::config(format!(
                        "Failed to parse {}: {}",
                        self.secret_file.display(),
                        e
                    ))
                })
            }
            _ => Ok(SecretConfig::default()),
        }
    }

    /// Resolves OpenAI credentials.
    ///
    /// Priority:
    /// 1. `secret.json` (`openai.api_key`, non-empty)
    /// 2. Environment variables (`OPENAI_API_KEY`, `OPENAI_MODEL_NAME`)
    pub fn openai_credentials(&self) -> Option<OpenAIConfig> {
        match self.load_secrets() {
            Ok(SecretConfig {
                openai: Some(openai),
            }) if !openai.api_key.trim().is_empty() => return Some(openai),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Ignoring unreadable secret file"),
        }

        let api_key = env::var(OPENAI_API_KEY_ENV).ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        Some(OpenAIConfig {
            api_key,
            model_name: env::var(OPENAI_MODEL_ENV).ok(),
        })
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
