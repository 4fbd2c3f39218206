//! Per-window identity.

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::fmt;

const WINDOW_ID_LEN: usize = 12;

/// Random identifier of one editor window, stable for its lifetime.
///
/// Stamped on every snapshot the window authors so the origin of a change
/// is always attributable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(String);

impl WindowId {
    /// Generates a fresh random window id.
    pub fn generate() -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(WINDOW_ID_LEN)
            .map(char::from)
            .collect();
        Self(format!("window-{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Snapshots written before windows were tracked carry an empty id.
    pub fn is_unknown(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for WindowId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for WindowId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
