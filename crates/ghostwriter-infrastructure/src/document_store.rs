//! LocalStorage-based DocumentRepository implementation
//!
//! Storage layout:
//! ```text
//! ghostwriter.documents        -> registry: id -> {name, created, updated, versionCount}
//! ghostwriter.document.<id>    -> payload:  {versions, currentVersionIndex}
//! ```

use crate::dto::{
    RegistryDto, RegistryEntryDto, parse_payload, parse_registry, serialize_payload,
    serialize_registry,
};
use crate::storage::{LocalStorage, StorageOp};
use async_trait::async_trait;
use ghostwriter_core::document::{
    Document, DocumentMetadata, DocumentRepository, VersionHistory, now_millis,
};
use ghostwriter_core::{GhostError, Result};
use std::sync::Arc;

/// Storage key of the document registry.
pub const REGISTRY_KEY: &str = "ghostwriter.documents";

const DOCUMENT_KEY_PREFIX: &str = "ghostwriter.document.";

/// Name given to documents found in storage while rebuilding a lost registry.
pub const RECOVERED_DOCUMENT_NAME: &str = "Recovered document";

/// Storage key of one document's version-history payload.
pub fn document_key(id: &str) -> String {
    format!("{DOCUMENT_KEY_PREFIX}{id}")
}

/// Inverse of [`document_key`].
pub fn document_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(DOCUMENT_KEY_PREFIX)
}

/// Document repository persisted in a [`LocalStorage`].
pub struct LocalDocumentStore {
    storage: Arc<dyn LocalStorage>,
}

impl LocalDocumentStore {
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn LocalStorage> {
        &self.storage
    }

    /// Loads the registry, rebuilding it from the stored payloads when it is
    /// unreadable. The rebuilt registry is written by the next change.
    fn load_registry(&self) -> Result<RegistryDto> {
        let raw = self.storage.get(REGISTRY_KEY)?;
        match parse_registry(raw.as_deref()) {
            Ok(registry) => Ok(registry),
            Err(e) => {
                let registry = self.rebuild_registry()?;
                tracing::warn!(
                    error = %e,
                    recovered = registry.len(),
                    "Document registry unreadable, rebuilt from stored documents"
                );
                Ok(registry)
            }
        }
    }

    fn rebuild_registry(&self) -> Result<RegistryDto> {
        let mut registry = RegistryDto::new();
        for key in self.storage.keys()? {
            let Some(id) = document_id_from_key(&key) else {
                continue;
            };
            let Some(raw) = self.storage.get(&key)? else {
                continue;
            };
            let history = match parse_payload(id, &raw) {
                Ok(history) => history,
                Err(e) => {
                    tracing::warn!(id, error = %e, "Skipping unreadable document payload");
                    continue;
                }
            };

            let timestamps = history.versions().iter().map(|s| s.timestamp());
            let created = timestamps.clone().min().unwrap_or_else(now_millis);
            let updated = timestamps.max().unwrap_or(created);
            registry.insert(
                id.to_string(),
                RegistryEntryDto {
                    name: RECOVERED_DOCUMENT_NAME.to_string(),
                    created,
                    updated,
                    version_count: history.len(),
                },
            );
        }
        Ok(registry)
    }

    fn registry_op(registry: &RegistryDto) -> Result<StorageOp> {
        Ok(StorageOp::set(REGISTRY_KEY, serialize_registry(registry)?))
    }
}

#[async_trait]
impl DocumentRepository for LocalDocumentStore {
    async fn list(&self) -> Result<Vec<DocumentMetadata>> {
        let mut documents: Vec<DocumentMetadata> = self
            .load_registry()?
            .into_iter()
            .map(|(id, entry)| entry.into_metadata(id))
            .collect();

        // Most recently updated first
        documents.sort_by(|a, b| b.updated.cmp(&a.updated).then_with(|| a.name.cmp(&b.name)));
        Ok(documents)
    }

    async fn create(&self, name: &str) -> Result<Document> {
        let document = Document::new(name);

        let mut registry = self.load_registry()?;
        registry.insert(
            document.id().to_string(),
            RegistryEntryDto::from_metadata(&document.metadata),
        );

        self.storage.apply(vec![
            StorageOp::set(document_key(document.id()), serialize_payload(&document.history)?),
            Self::registry_op(&registry)?,
        ])?;

        tracing::info!(id = %document.id(), name, "Created document");
        Ok(document)
    }

    async fn open(&self, id: &str) -> Result<Document> {
        let registry = self.load_registry()?;
        let entry = registry
            .get(id)
            .cloned()
            .ok_or_else(|| GhostError::not_found("Document", id))?;

        let raw = self
            .storage
            .get(&document_key(id))?
            .ok_or_else(|| GhostError::corrupted("Document", id, "payload missing"))?;
        let history: VersionHistory = parse_payload(id, &raw)?;

        tracing::debug!(id, versions = history.len(), "Opened document");
        Ok(Document {
            metadata: entry.into_metadata(id.to_string()),
            history,
        })
    }

    async fn save(&self, document: &mut Document) -> Result<()> {
        document.touch();

        let mut registry = self.load_registry()?;
        registry.insert(
            document.id().to_string(),
            RegistryEntryDto::from_metadata(&document.metadata),
        );

        self.storage.apply(vec![
            StorageOp::set(document_key(document.id()), serialize_payload(&document.history)?),
            Self::registry_op(&registry)?,
        ])?;

        tracing::debug!(
            id = %document.id(),
            versions = document.metadata.version_count,
            "Saved document"
        );
        Ok(())
    }

    async fn rename(&self, id: &str, name: &str) -> Result<DocumentMetadata> {
        let mut registry = self.load_registry()?;
        let entry = registry
            .get_mut(id)
            .ok_or_else(|| GhostError::not_found("Document", id))?;
        entry.name = name.to_string();
        entry.updated = now_millis().max(entry.updated);
        let metadata = entry.clone().into_metadata(id.to_string());

        self.storage.apply(vec![Self::registry_op(&registry)?])?;

        tracing::info!(id, name, "Renamed document");
        Ok(metadata)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut registry = self.load_registry()?;
        registry.remove(id);

        self.storage.apply(vec![
            StorageOp::remove(document_key(id)),
            Self::registry_op(&registry)?,
        ])?;

        tracing::info!(id, "Deleted document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DirStorage, MemoryStorage};
    use ghostwriter_core::document::{Paragraph, PromptSettings, Snapshot};
    use tempfile::TempDir;

    fn memory_store() -> LocalDocumentStore {
        LocalDocumentStore::new(Arc::new(MemoryStorage::new()))
    }

    fn snapshot(input: &str) -> Snapshot {
        Snapshot::new(vec![Paragraph::new(input)], PromptSettings::default())
    }

    #[tokio::test]
    async fn test_create_and_open() {
        let store = memory_store();
        let created = store.create("Draft").await.unwrap();

        let opened = store.open(created.id()).await.unwrap();

        assert_eq!(opened.name(), "Draft");
        assert!(opened.history.is_empty());
        assert_eq!(opened.metadata.version_count, 0);
    }

    #[tokio::test]
    async fn test_save_updates_registry_and_payload() {
        let store = memory_store();
        let mut document = store.create("Draft").await.unwrap();
        document.history.append(snapshot("a"));
        document.history.append(snapshot("b"));

        store.save(&mut document).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].version_count, 2);

        let reopened = store.open(document.id()).await.unwrap();
        assert_eq!(reopened.history, document.history);
        assert_eq!(reopened.history.current_index(), Some(1));
    }

    #[tokio::test]
    async fn test_list_sorted_by_updated_desc() {
        let store = memory_store();
        let mut older = store.create("Older").await.unwrap();
        let mut newer = store.create("Newer").await.unwrap();
        older.metadata.updated = 0;
        store.save(&mut older).await.unwrap();
        newer.metadata.updated = i64::MAX - 1;
        store.save(&mut newer).await.unwrap();

        let names: Vec<_> = store.list().await.unwrap().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["Newer", "Older"]);
    }

    #[tokio::test]
    async fn test_open_unknown_is_not_found() {
        let store = memory_store();
        assert!(store.open("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_open_unparsable_payload_is_corrupted() {
        let storage = Arc::new(MemoryStorage::new());
        let store = LocalDocumentStore::new(storage.clone());
        let document = store.create("Draft").await.unwrap();

        storage.set(&document_key(document.id()), "{oops").unwrap();

        assert!(store.open(document.id()).await.unwrap_err().is_corrupted());
    }

    #[tokio::test]
    async fn test_open_missing_payload_is_corrupted() {
        let storage = Arc::new(MemoryStorage::new());
        let store = LocalDocumentStore::new(storage.clone());
        let document = store.create("Draft").await.unwrap();

        storage.remove(&document_key(document.id())).unwrap();

        assert!(store.open(document.id()).await.unwrap_err().is_corrupted());
    }

    #[tokio::test]
    async fn test_delete_removes_registry_and_payload() {
        let storage = Arc::new(MemoryStorage::new());
        let store = LocalDocumentStore::new(storage.clone());
        let keep = store.create("Keep").await.unwrap();
        let gone = store.create("Gone").await.unwrap();

        store.delete(gone.id()).await.unwrap();

        assert_eq!(storage.get(&document_key(gone.id())).unwrap(), None);
        let ids: Vec<_> = store.list().await.unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![keep.id().to_string()]);
        assert!(store.open(gone.id()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rename_touches_registry_only() {
        let storage = Arc::new(MemoryStorage::new());
        let store = LocalDocumentStore::new(storage.clone());
        let mut document = store.create("Draft").await.unwrap();
        document.history.append(snapshot("a"));
        store.save(&mut document).await.unwrap();
        let payload_before = storage.get(&document_key(document.id())).unwrap();

        let renamed = store.rename(document.id(), "Chapter 1").await.unwrap();

        assert_eq!(renamed.name, "Chapter 1");
        assert_eq!(renamed.version_count, 1);
        assert_eq!(storage.get(&document_key(document.id())).unwrap(), payload_before);
        assert_eq!(store.open(document.id()).await.unwrap().name(), "Chapter 1");
        assert!(store.rename("missing", "x").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_save_writes_both_keys_in_one_batch() {
        let storage = MemoryStorage::new();
        let mut observer = storage.handle().subscribe();
        let store = LocalDocumentStore::new(Arc::new(storage));
        let mut document = store.create("Draft").await.unwrap();
        // drain create events
        while observer.try_recv().is_some() {}

        document.history.append(snapshot("a"));
        store.save(&mut document).await.unwrap();

        let keys: Vec<_> = std::iter::from_fn(|| observer.try_recv()).map(|e| e.key).collect();
        assert_eq!(keys, vec![document_key(document.id()), REGISTRY_KEY.to_string()]);
    }

    #[tokio::test]
    async fn test_corrupted_registry_without_documents_is_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(REGISTRY_KEY, "not json").unwrap();
        let store = LocalDocumentStore::new(storage);

        assert!(store.list().await.unwrap().is_empty());
        store.create("Fresh").await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupted_registry_rebuilt_from_payloads() {
        let storage = Arc::new(MemoryStorage::new());
        let store = LocalDocumentStore::new(storage.clone());
        let mut document = store.create("Chapter").await.unwrap();
        document.history.append(snapshot("first"));
        document.history.append(snapshot("second"));
        store.save(&mut document).await.unwrap();
        let broken = store.create("Broken").await.unwrap();
        storage.set(&document_key(broken.id()), "{not a payload").unwrap();
        storage.set(REGISTRY_KEY, "not json").unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, document.id());
        assert_eq!(listed[0].name, RECOVERED_DOCUMENT_NAME);
        assert_eq!(listed[0].version_count, 2);
        assert!(listed[0].created <= listed[0].updated);

        let reopened = store.open(document.id()).await.unwrap();
        assert_eq!(reopened.history.current().unwrap().paragraphs()[0].input, "second");

        // the next change persists the rebuilt registry
        store.create("Fresh").await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 2);
        assert!(parse_registry(storage.get(REGISTRY_KEY).unwrap().as_deref()).is_ok());
    }

    #[tokio::test]
    async fn test_dir_storage_backend() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalDocumentStore::new(Arc::new(DirStorage::open(temp_dir.path()).unwrap()));
        let mut document = store.create("On disk").await.unwrap();
        document.history.append(snapshot("persisted"));
        store.save(&mut document).await.unwrap();

        let reopened_store =
            LocalDocumentStore::new(Arc::new(DirStorage::open(temp_dir.path()).unwrap()));
        let reopened = reopened_store.open(document.id()).await.unwrap();

        assert_eq!(reopened.history.len(), 1);
        assert_eq!(reopened.history.current().unwrap().paragraphs()[0].input, "persisted");
    }

    #[test]
    fn test_document_key_round_trip() {
        assert_eq!(document_id_from_key(&document_key("abc")), Some("abc"));
        assert_eq!(document_id_from_key(REGISTRY_KEY), None);
    }
}
