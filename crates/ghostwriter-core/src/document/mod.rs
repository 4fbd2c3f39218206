//! Document domain module.
//!
//! # Module Structure
//!
//! - `model`: paragraphs, snapshots, metadata and the `Document` aggregate
//! - `history`: `VersionHistory`, the per-document snapshot log with a cursor
//! - `repository`: `DocumentRepository`, the persistence interface

mod history;
mod model;
mod repository;

pub use history::{DEFAULT_KEEP_AUTO_SAVES, VersionHistory};
pub use model::{
    DEFAULT_SYSTEM_PROMPT, Document, DocumentMetadata, Paragraph, PromptSettings, Snapshot,
    UNTITLED_DOCUMENT_NAME, now_millis,
};
pub use repository::DocumentRepository;
