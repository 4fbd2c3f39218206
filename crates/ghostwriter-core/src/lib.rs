//! Core domain of Ghostwriter: editor snapshots, version histories, the
//! document repository interface and the completion service interface.

pub mod completion;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod window;

// Re-export common error type
pub use error::{GhostError, Result};
pub use window::WindowId;
