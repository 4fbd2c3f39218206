//! Per-window editing session.
//!
//! A [`SessionController`] owns one active document and the live editor
//! state of a window, drives the completion and auto-save timers and reacts
//! to changes other windows make to the same storage.

mod controller;
mod event;
mod handle;

pub use controller::{SessionController, SessionSettings, create_document};
pub use event::SessionEvent;
pub use handle::SessionHandle;
