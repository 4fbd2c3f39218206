//! Application layer for Ghostwriter.
//!
//! Coordinates the domain model with the document store and the completion
//! service: one [`SessionController`] per window, debounced timers,
//! cross-window reconciliation and plain-text export.

pub mod debounce;
pub mod export;
pub mod session;
pub mod sync;

pub use debounce::Debouncer;
pub use session::{
    SessionController, SessionEvent, SessionHandle, SessionSettings, create_document,
};
pub use sync::{CrossWindowSync, Resolution, SyncNotice};
