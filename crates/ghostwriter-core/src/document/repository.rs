//! Document repository trait.
//!
//! Defines the interface for document persistence operations.

use super::model::{Document, DocumentMetadata};
use crate::error::Result;
use async_trait::async_trait;

/// An abstract repository for managing document persistence.
///
/// The store owns the persisted representation: a registry of
/// [`DocumentMetadata`] and one version-history payload per document. It has
/// no notion of an "active" document; that belongs to the session.
///
/// # Implementation Notes
///
/// Implementations must make the payload and registry writes of [`save`],
/// [`create`] and [`delete`] visible together or not at all, so that no
/// observer sees a registry update paired with a stale history.
///
/// [`save`]: DocumentRepository::save
/// [`create`]: DocumentRepository::create
/// [`delete`]: DocumentRepository::delete
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Lists all documents, most recently updated first.
    async fn list(&self) -> Result<Vec<DocumentMetadata>>;

    /// Creates an empty document and registers it.
    async fn create(&self, name: &str) -> Result<Document>;

    /// Opens a document by id.
    ///
    /// # Returns
    ///
    /// - `Ok(Document)`: registry entry and payload both readable
    /// - `Err(GhostError::NotFound)`: the registry has no such id
    /// - `Err(GhostError::Corrupted)`: the payload is missing or unparsable
    async fn open(&self, id: &str) -> Result<Document>;

    /// Writes the history payload and refreshes the registry entry
    /// (`updated`, `version_count`) in one atomic step.
    async fn save(&self, document: &mut Document) -> Result<()>;

    /// Renames a document in the registry without touching its history.
    async fn rename(&self, id: &str, name: &str) -> Result<DocumentMetadata>;

    /// Removes both the registry entry and the payload.
    ///
    /// Deleting an unknown id is not an error.
    async fn delete(&self, id: &str) -> Result<()>;
}
