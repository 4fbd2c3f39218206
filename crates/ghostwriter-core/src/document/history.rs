//! Linear version history with a cursor.

use super::model::Snapshot;
use crate::editor::{EditorState, capture};
use crate::error::{GhostError, Result};
use crate::window::WindowId;

/// Number of automatic snapshots kept by default when trimming.
pub const DEFAULT_KEEP_AUTO_SAVES: usize = 5;

/// Ordered log of snapshots for one document plus the cursor of the
/// version currently displayed.
///
/// Invariant: the cursor is `None` exactly when the history is empty, and
/// otherwise points inside `versions`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionHistory {
    versions: Vec<Snapshot>,
    current_index: Option<usize>,
}

impl VersionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a history from its persisted parts.
    ///
    /// `current_index` uses the persisted convention of `-1` for "no version".
    pub fn from_parts(versions: Vec<Snapshot>, current_index: i64) -> Result<Self> {
        let len = versions.len();
        let current_index = match (current_index, len) {
            (-1, 0) => None,
            (index, len) if index >= 0 && (index as usize) < len => Some(index as usize),
            (index, len) => {
                return Err(GhostError::InvalidVersion {
                    index: index.max(0) as usize,
                    len,
                });
            }
        };
        Ok(Self {
            versions,
            current_index,
        })
    }

    pub fn versions(&self) -> &[Snapshot] {
        &self.versions
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// Cursor in the persisted convention (`-1` when empty).
    pub fn current_index_raw(&self) -> i64 {
        self.current_index.map(|index| index as i64).unwrap_or(-1)
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.current_index.map(|index| &self.versions[index])
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.versions.last()
    }

    /// True when the cursor sits on the newest version (or the history is empty).
    pub fn is_at_latest(&self) -> bool {
        match self.current_index {
            Some(index) => index + 1 == self.versions.len(),
            None => true,
        }
    }

    pub fn previous_index(&self) -> Option<usize> {
        self.current_index.and_then(|index| index.checked_sub(1))
    }

    pub fn next_index(&self) -> Option<usize> {
        self.current_index
            .map(|index| index + 1)
            .filter(|next| *next < self.versions.len())
    }

    pub fn can_go_back(&self) -> bool {
        self.previous_index().is_some()
    }

    pub fn can_go_forward(&self) -> bool {
        self.next_index().is_some()
    }

    pub fn auto_save_count(&self) -> usize {
        self.versions.iter().filter(|v| v.is_auto_save()).count()
    }

    /// Appends a snapshot and moves the cursor onto it.
    ///
    /// If the cursor is not on the last version, every later version is
    /// discarded first (redo history is lost on a new edit).
    pub fn append(&mut self, snapshot: Snapshot) {
        if let Some(index) = self.current_index {
            if index + 1 < self.versions.len() {
                tracing::debug!(
                    discarded = self.versions.len() - index - 1,
                    "Truncating redo history before append"
                );
                self.versions.truncate(index + 1);
            }
        }
        self.versions.push(snapshot);
        self.current_index = Some(self.versions.len() - 1);
    }

    /// Moves the cursor to `target` and returns the snapshot to rehydrate.
    ///
    /// When leaving the latest version, the live editor state is first
    /// appended as an automatic checkpoint so in-progress work survives.
    /// Out-of-range targets leave the history untouched.
    pub fn navigate(
        &mut self,
        target: usize,
        live: &EditorState,
        window: &WindowId,
    ) -> Result<&Snapshot> {
        if target >= self.versions.len() {
            return Err(GhostError::InvalidVersion {
                index: target,
                len: self.versions.len(),
            });
        }

        if self.is_at_latest() && self.current_index != Some(target) {
            let checkpoint = capture(live).as_auto_save().authored_by(window);
            self.append(checkpoint);
        }

        self.current_index = Some(target);
        Ok(&self.versions[target])
    }

    /// Deletes the oldest automatic snapshots beyond `keep`.
    ///
    /// Manual versions are never removed, nor is the version under the cursor.
    /// The cursor is shifted after each deletion so it keeps pointing at the
    /// same snapshot. Returns the number of versions removed.
    pub fn trim_auto_saves(&mut self, keep: usize) -> usize {
        let mut excess = self.auto_save_count().saturating_sub(keep);
        let mut removed = 0;
        let mut index = 0;

        while excess > 0 && index < self.versions.len() {
            let under_cursor = self.current_index == Some(index);
            if !self.versions[index].is_auto_save() || under_cursor {
                index += 1;
                continue;
            }

            self.versions.remove(index);
            if let Some(current) = self.current_index {
                if index < current {
                    self.current_index = Some(current - 1);
                }
            }
            excess -= 1;
            removed += 1;
        }

        if removed > 0 {
            tracing::debug!(removed, keep, "Trimmed automatic snapshots");
        }
        removed
    }
}
