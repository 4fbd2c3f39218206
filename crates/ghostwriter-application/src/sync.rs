//! Cross-window change detection.
//!
//! Each window watches two storage keys: the registry and the payload of its
//! active document. Writes made by other windows arrive as [`StorageEvent`]s
//! and are turned into [`SyncNotice`]s for the session to act on.

use ghostwriter_core::WindowId;
use ghostwriter_infrastructure::dto::{parse_payload, parse_registry};
use ghostwriter_infrastructure::{REGISTRY_KEY, StorageEvent, document_key};

/// Something another window did to the active document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotice {
    /// Another window saved a version of the active document.
    ConflictDetected { remote_window: WindowId },
    /// The active document was renamed elsewhere.
    Renamed { name: String },
    /// The active document's payload was removed elsewhere.
    DeletedElsewhere,
}

/// How the user settles a [`SyncNotice::ConflictDetected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Re-open the document from storage and discard the live state.
    LoadChanges,
    /// Save the live state as a new version on top of the remote one.
    KeepMine,
}

/// Filters storage events down to the ones concerning the active document.
#[derive(Debug, Clone)]
pub struct CrossWindowSync {
    window: WindowId,
    document_id: String,
    payload_key: String,
    document_name: String,
}

impl CrossWindowSync {
    pub fn new(window: WindowId, document_id: &str, document_name: &str) -> Self {
        Self {
            window,
            document_id: document_id.to_string(),
            payload_key: document_key(document_id),
            document_name: document_name.to_string(),
        }
    }

    /// Switches to watching another document (after open/new) or records a
    /// local rename.
    pub fn track(&mut self, document_id: &str, document_name: &str) {
        if self.document_id != document_id {
            self.document_id = document_id.to_string();
            self.payload_key = document_key(document_id);
        }
        self.document_name = document_name.to_string();
    }

    pub fn window(&self) -> &WindowId {
        &self.window
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn handle_event(&mut self, event: &StorageEvent) -> Option<SyncNotice> {
        if event.key == self.payload_key {
            self.on_payload_change(event)
        } else if event.key == REGISTRY_KEY {
            self.on_registry_change(event)
        } else {
            None
        }
    }

    fn on_payload_change(&self, event: &StorageEvent) -> Option<SyncNotice> {
        let Some(raw) = event.new_value.as_deref() else {
            return Some(SyncNotice::DeletedElsewhere);
        };

        let history = match parse_payload(&self.document_id, raw) {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(
                    id = %self.document_id,
                    error = %e,
                    "Ignoring unreadable remote payload"
                );
                return None;
            }
        };

        let remote_window = history.latest()?.editor_window().clone();
        if remote_window == self.window {
            return None;
        }

        tracing::info!(
            id = %self.document_id,
            remote = %remote_window,
            "Document changed in another window"
        );
        Some(SyncNotice::ConflictDetected { remote_window })
    }

    fn on_registry_change(&mut self, event: &StorageEvent) -> Option<SyncNotice> {
        let registry = match parse_registry(event.new_value.as_deref()) {
            Ok(registry) => registry,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable remote registry");
                return None;
            }
        };

        let entry = registry.get(&self.document_id)?;
        if entry.name == self.document_name {
            return None;
        }

        self.document_name = entry.name.clone();
        Some(SyncNotice::Renamed {
            name: entry.name.clone(),
        })
    }
}
