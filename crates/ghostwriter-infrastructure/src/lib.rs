pub mod config_service;
pub mod document_store;
pub mod dto;
pub mod paths;
pub mod storage;

pub use crate::config_service::ConfigService;
pub use crate::document_store::{
    LocalDocumentStore, RECOVERED_DOCUMENT_NAME, REGISTRY_KEY, document_id_from_key, document_key,
};
pub use crate::paths::GhostwriterPaths;
pub use crate::storage::{
    DirStorage, LocalStorage, MemoryStorage, StorageEvent, StorageOp, StorageSubscription,
};
