//! Headless editor state and snapshot capture.
//!
//! `EditorState` is the projection a front end renders: a header row followed
//! by paragraph rows, plus the prompt settings. Snapshots are captured from it
//! and it is rebuilt from snapshots when navigating history.

use crate::document::{Paragraph, PromptSettings, Snapshot};

/// One rendered row of the editor table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorRow {
    /// Column header row; structural, never captured.
    Header,
    Paragraph(Paragraph),
}

/// Live, unsaved editor content of one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorState {
    rows: Vec<EditorRow>,
    prompt_settings: PromptSettings,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorState {
    /// Header row plus one empty paragraph, default prompt settings.
    pub fn new() -> Self {
        Self {
            rows: vec![EditorRow::Header, EditorRow::Paragraph(Paragraph::new(""))],
            prompt_settings: PromptSettings::default(),
        }
    }

    /// Rebuilds the editor from a snapshot's paragraphs and prompt settings.
    pub fn rehydrate(snapshot: &Snapshot) -> Self {
        let mut rows = Vec::with_capacity(snapshot.paragraphs().len() + 1);
        rows.push(EditorRow::Header);
        rows.extend(snapshot.paragraphs().iter().cloned().map(EditorRow::Paragraph));
        if rows.len() == 1 {
            rows.push(EditorRow::Paragraph(Paragraph::new("")));
        }

        Self {
            rows,
            prompt_settings: snapshot.prompt_settings().clone(),
        }
    }

    pub fn rows(&self) -> &[EditorRow] {
        &self.rows
    }

    /// Paragraph rows in display order, header rows skipped.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.rows.iter().filter_map(|row| match row {
            EditorRow::Paragraph(paragraph) => Some(paragraph),
            EditorRow::Header => None,
        })
    }

    pub fn paragraph(&self, id: &str) -> Option<&Paragraph> {
        self.paragraphs().find(|p| p.id == id)
    }

    fn paragraph_mut(&mut self, id: &str) -> Option<&mut Paragraph> {
        self.rows.iter_mut().find_map(|row| match row {
            EditorRow::Paragraph(paragraph) if paragraph.id == id => Some(paragraph),
            _ => None,
        })
    }

    pub fn prompt_settings(&self) -> &PromptSettings {
        &self.prompt_settings
    }

    /// Replaces the input text of a paragraph. Returns false for unknown ids.
    pub fn set_input(&mut self, id: &str, input: impl Into<String>) -> bool {
        match self.paragraph_mut(id) {
            Some(paragraph) => {
                paragraph.input = input.into();
                true
            }
            None => false,
        }
    }

    /// Replaces the generated text of a paragraph. Returns false for unknown ids.
    pub fn set_output(&mut self, id: &str, output: impl Into<String>) -> bool {
        match self.paragraph_mut(id) {
            Some(paragraph) => {
                paragraph.output = output.into();
                true
            }
            None => false,
        }
    }

    /// Inserts an empty paragraph after `after` (or at the end) and returns its id.
    pub fn insert_paragraph_after(&mut self, after: Option<&str>) -> String {
        let paragraph = Paragraph::new("");
        let id = paragraph.id.clone();
        let position = after
            .and_then(|after| {
                self.rows.iter().position(
                    |row| matches!(row, EditorRow::Paragraph(p) if p.id == after),
                )
            })
            .map(|index| index + 1)
            .unwrap_or(self.rows.len());
        self.rows.insert(position, EditorRow::Paragraph(paragraph));
        id
    }

    pub fn set_system_prompt(&mut self, system_prompt: impl Into<String>) {
        self.prompt_settings.system_prompt = system_prompt.into();
    }

    pub fn set_instructions(&mut self, instructions: impl Into<String>) {
        self.prompt_settings.instructions = instructions.into();
    }
}

/// Captures the editor content into a new snapshot stamped with the current time.
///
/// Header rows are skipped and a paragraph is omitted only when both its input
/// and output are empty. The auto-save flag and authoring window are left for
/// the caller to set.
pub fn capture(state: &EditorState) -> Snapshot {
    let paragraphs = state
        .paragraphs()
        .filter(|paragraph| !paragraph.is_blank())
        .cloned()
        .collect();
    Snapshot::new(paragraphs, state.prompt_settings().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(inputs: &[(&str, &str)]) -> EditorState {
        let mut state = EditorState::new();
        let first = state.paragraphs().next().map(|p| p.id.clone()).unwrap();
        let mut last = first.clone();
        for (index, (input, output)) in inputs.iter().enumerate() {
            let id = if index == 0 {
                first.clone()
            } else {
                state.insert_paragraph_after(Some(&last))
            };
            state.set_input(&id, *input);
            state.set_output(&id, *output);
            last = id;
        }
        state
    }

    #[test]
    fn test_capture_skips_header_and_blank_rows() {
        let mut state = state_with(&[("x", "y"), ("", ""), ("", "only output")]);
        state.insert_paragraph_after(None);

        let snapshot = capture(&state);

        let inputs: Vec<_> = snapshot.paragraphs().iter().map(|p| p.input.as_str()).collect();
        assert_eq!(inputs, vec!["x", ""]);
        assert_eq!(snapshot.paragraphs()[1].output, "only output");
        assert!(!snapshot.is_auto_save());
        assert!(snapshot.editor_window().is_unknown());
    }

    #[test]
    fn test_capture_preserves_paragraph_ids() {
        let state = state_with(&[("a", ""), ("b", "")]);
        let first = capture(&state);
        let second = capture(&state);

        let ids = |s: &Snapshot| s.paragraphs().iter().map(|p| p.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn test_rehydrate_round_trip() {
        let mut state = state_with(&[("x", "y"), ("second", "")]);
        state.set_instructions("FIRST PERSON");
        let snapshot = capture(&state);

        let rebuilt = EditorState::rehydrate(&snapshot);
        let recaptured = capture(&rebuilt);

        assert_eq!(recaptured.paragraphs(), snapshot.paragraphs());
        assert_eq!(recaptured.prompt_settings(), snapshot.prompt_settings());
        assert_eq!(rebuilt.rows()[0], EditorRow::Header);
    }

    #[test]
    fn test_rehydrate_empty_snapshot_leaves_one_row() {
        let snapshot = capture(&EditorState::new());
        assert!(snapshot.paragraphs().is_empty());

        let rebuilt = EditorState::rehydrate(&snapshot);
        assert_eq!(rebuilt.paragraphs().count(), 1);
    }

    #[test]
    fn test_insert_after_keeps_order() {
        let mut state = state_with(&[("a", ""), ("c", "")]);
        let first = state.paragraphs().next().unwrap().id.clone();
        let inserted = state.insert_paragraph_after(Some(&first));
        state.set_input(&inserted, "b");

        let inputs: Vec<_> = state.paragraphs().map(|p| p.input.clone()).collect();
        assert_eq!(inputs, vec!["a", "b", "c"]);
        assert!(!state.set_input("missing", "z"));
    }
}
