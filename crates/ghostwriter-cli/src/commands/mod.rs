pub mod complete;
pub mod documents;

use anyhow::{Context, Result};
use ghostwriter_core::config::GhostwriterConfig;
use ghostwriter_infrastructure::{ConfigService, DirStorage, GhostwriterPaths, LocalDocumentStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration and document store shared by every command.
pub struct Workspace {
    pub config: GhostwriterConfig,
    pub config_service: ConfigService,
    pub store: LocalDocumentStore,
}

impl Workspace {
    pub fn load(config_dir: Option<&Path>, storage_dir: Option<&Path>) -> Result<Self> {
        let config_service = match config_dir {
            Some(dir) => ConfigService::in_dir(dir),
            None => ConfigService::default_location().context("Failed to locate config directory")?,
        };
        let config = config_service
            .load_config()
            .context("Failed to load config.toml")?;

        let storage_dir: PathBuf = match storage_dir {
            Some(dir) => dir.to_path_buf(),
            None => match &config.storage.dir {
                Some(dir) => dir.clone(),
                None => GhostwriterPaths::storage_dir().context("Failed to locate data directory")?,
            },
        };
        let storage = DirStorage::open(&storage_dir)
            .with_context(|| format!("Failed to open storage at {}", storage_dir.display()))?;
        tracing::debug!(dir = %storage_dir.display(), "Using document storage");

        Ok(Self {
            config,
            config_service,
            store: LocalDocumentStore::new(Arc::new(storage)),
        })
    }
}
