//! Configuration model.
//!
//! `config.toml` holds behaviour settings, `secret.json` holds API keys.
//! Every field has a default so an empty or missing file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Root of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GhostwriterConfig {
    pub completion: CompletionSettings,
    pub autosave: AutosaveSettings,
    pub storage: StorageSettings,
}

/// Completion endpoint and request-debounce settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub model: String,
    pub endpoint: String,
    pub max_tokens: u32,
    /// Idle time after the last keystroke before a paragraph is sent
    pub debounce_ms: u64,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_OPENAI_MODEL.to_string(),
            endpoint: DEFAULT_OPENAI_ENDPOINT.to_string(),
            max_tokens: 1000,
            debounce_ms: 1_000,
        }
    }
}

impl CompletionSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Auto-save timing and retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveSettings {
    /// Idle time after the last change before an automatic snapshot
    pub idle_ms: u64,
    /// Automatic snapshots retained per document
    pub keep_auto_saves: usize,
}

impl Default for AutosaveSettings {
    fn default() -> Self {
        Self {
            idle_ms: 5_000,
            keep_auto_saves: crate::document::DEFAULT_KEEP_AUTO_SAVES,
        }
    }
}

impl AutosaveSettings {
    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }
}

/// Where the local storage directory lives. `None` means the platform data dir.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub dir: Option<PathBuf>,
}

/// Root of `secret.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretConfig {
    #[serde(default)]
    pub openai: Option<OpenAIConfig>,
}

/// OpenAI API credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIConfig {
    pub api_key: String,
    #[serde(default)]
    pub model_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: GhostwriterConfig = toml::from_str(
            r#"
            [autosave]
            idle_ms = 2500
            "#,
        )
        .unwrap();

        assert_eq!(config.autosave.idle(), Duration::from_millis(2500));
        assert_eq!(config.autosave.keep_auto_saves, 5);
        assert_eq!(config.completion.model, DEFAULT_OPENAI_MODEL);
        assert!(config.storage.dir.is_none());
    }

    #[test]
    fn test_empty_secret_json() {
        let secrets: SecretConfig = serde_json::from_str("{}").unwrap();
        assert!(secrets.openai.is_none());
    }
}
