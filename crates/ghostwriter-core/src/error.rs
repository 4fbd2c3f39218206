//! Error types for the Ghostwriter application.

use thiserror::Error;

/// A shared error type for the document and versioning layers.
///
/// Completion failures live in [`crate::completion::CompletionError`] and are
/// rendered into the output field rather than returned through this type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GhostError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// A persisted payload exists but cannot be parsed
    #[error("Corrupted {entity_type} '{id}': {message}")]
    Corrupted {
        entity_type: &'static str,
        id: String,
        message: String,
    },

    /// A version index outside of `[0, len - 1]`
    #[error("Version index {index} out of range (history has {len} versions)")]
    InvalidVersion { index: usize, len: usize },

    /// The backing local storage refused a write because it is full
    #[error("Storage quota exceeded: {needed} bytes needed, {quota} bytes allowed")]
    StorageQuotaExceeded { needed: usize, quota: usize },

    /// Another window changed the document and the change is not yet reconciled
    #[error("Document changed in window '{window}'; load its changes or keep yours first")]
    ConflictPending { window: String },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GhostError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a Corrupted error
    pub fn corrupted(
        entity_type: &'static str,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Corrupted {
            entity_type,
            id: id.into(),
            message: message.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a Corrupted error
    pub fn is_corrupted(&self) -> bool {
        matches!(self, Self::Corrupted { .. })
    }

    /// Check if this is a quota error
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::StorageQuotaExceeded { .. })
    }

    /// Check if this is an unreconciled cross-window conflict
    pub fn is_conflict_pending(&self) -> bool {
        matches!(self, Self::ConflictPending { .. })
    }

    /// Open failures that the session recovers from by creating a fresh document.
    pub fn is_recoverable_open_failure(&self) -> bool {
        self.is_not_found() || self.is_corrupted()
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for GhostError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for GhostError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for GhostError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, GhostError>`.
pub type Result<T> = std::result::Result<T, GhostError>;
