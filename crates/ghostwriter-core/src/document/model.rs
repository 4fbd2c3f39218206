//! Document domain model.
//!
//! A document is a lightweight [`DocumentMetadata`] record plus the (possibly
//! large) [`VersionHistory`] of editor [`Snapshot`]s, both keyed by the same id.

use super::history::VersionHistory;
use crate::window::WindowId;
use serde::{Deserialize, Serialize};

/// Default system prompt sent with every completion request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
    You are a professional ghost writer. You take my ideas and transform them into \
    well-written paragraphs for a book. You should expand my ideas where appropriate. I \
    might add instructions for you in ALL CAPS, enclosed in square brackets, like so: \
    [THIS IS AN INSTRUCTION]. Write for a normal kind of person but don't be Shakespeare! \
    Only return the finished text of the ghost writer.";

/// Display name given to documents created without one.
pub const UNTITLED_DOCUMENT_NAME: &str = "Untitled";

/// Current time as milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// One outline row: the author's input and the generated continuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Stable row identifier (UUID format), preserved across snapshots
    pub id: String,
    /// Text written by the user
    pub input: String,
    /// Text generated by the completion service
    pub output: String,
}

impl Paragraph {
    /// Creates a paragraph with a fresh id and empty output.
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            input: input.into(),
            output: String::new(),
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// A paragraph is blank only when both sides are empty.
    pub fn is_blank(&self) -> bool {
        self.input.is_empty() && self.output.is_empty()
    }
}

/// The two prompt fields shown above the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptSettings {
    pub system_prompt: String,
    #[serde(default)]
    pub instructions: String,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            instructions: String::new(),
        }
    }
}

impl PromptSettings {
    /// Builds the user message for one paragraph.
    ///
    /// Standing instructions, when present, precede the paragraph text.
    pub fn user_text(&self, input: &str) -> String {
        let instructions = self.instructions.trim();
        if instructions.is_empty() {
            input.to_string()
        } else {
            format!("{instructions}\n\n{input}")
        }
    }
}

/// Immutable record of the full editor state at one instant.
///
/// Fields are private; the only mutation paths are the consuming builders
/// used before a snapshot enters a history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    timestamp: i64,
    paragraphs: Vec<Paragraph>,
    prompt_settings: PromptSettings,
    #[serde(default)]
    is_auto_save: bool,
    #[serde(default)]
    editor_window: WindowId,
}

impl Snapshot {
    /// Builds a manual snapshot stamped with the current time.
    pub fn new(paragraphs: Vec<Paragraph>, prompt_settings: PromptSettings) -> Self {
        Self {
            timestamp: now_millis(),
            paragraphs,
            prompt_settings,
            is_auto_save: false,
            editor_window: WindowId::default(),
        }
    }

    /// Flags the snapshot as an automatic save.
    pub fn as_auto_save(mut self) -> Self {
        self.is_auto_save = true;
        self
    }

    /// Stamps the window that authored the snapshot.
    pub fn authored_by(mut self, window: &WindowId) -> Self {
        self.editor_window = window.clone();
        self
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    pub fn prompt_settings(&self) -> &PromptSettings {
        &self.prompt_settings
    }

    pub fn is_auto_save(&self) -> bool {
        self.is_auto_save
    }

    pub fn editor_window(&self) -> &WindowId {
        &self.editor_window
    }
}

/// Registry entry for one document.
///
/// Listing documents only ever touches these records, never the histories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Unique document identifier (UUID format)
    pub id: String,
    /// Human-readable document name
    pub name: String,
    /// Creation time (ms since epoch)
    pub created: i64,
    /// Last save time (ms since epoch)
    pub updated: i64,
    /// Number of versions in the persisted history
    pub version_count: usize,
}

/// A document: registry metadata plus its version history.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub metadata: DocumentMetadata,
    pub history: VersionHistory,
}

impl Document {
    /// Creates an empty document with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            metadata: DocumentMetadata {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.into(),
                created: now,
                updated: now,
                version_count: 0,
            },
            history: VersionHistory::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Refreshes the derived metadata fields before persisting.
    pub fn touch(&mut self) {
        self.metadata.updated = now_millis().max(self.metadata.updated);
        self.metadata.version_count = self.history.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_paragraph() {
        assert!(Paragraph::new("").is_blank());
        assert!(!Paragraph::new("").with_output("y").is_blank());
        assert!(!Paragraph::new("x").is_blank());
    }

    #[test]
    fn test_user_text_prepends_instructions() {
        let mut settings = PromptSettings::default();
        assert_eq!(settings.user_text("idea"), "idea");

        settings.instructions = "  Keep it short ".to_string();
        assert_eq!(settings.user_text("idea"), "Keep it short\n\nidea");
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let window = WindowId::from("w-test");
        let paragraphs = vec![Paragraph::new("x").with_output("y")];
        let snapshot = Snapshot::new(paragraphs, PromptSettings::default())
            .as_auto_save()
            .authored_by(&window);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["isAutoSave"], true);
        assert_eq!(json["editorWindow"], "w-test");
        assert!(json["promptSettings"]["systemPrompt"].is_string());
        assert_eq!(json["paragraphs"][0]["input"], "x");
    }

    #[test]
    fn test_touch_counts_versions() {
        let mut document = Document::new("Draft");
        document
            .history
            .append(Snapshot::new(Vec::new(), PromptSettings::default()));
        document.touch();

        assert_eq!(document.metadata.version_count, 1);
        assert!(document.metadata.updated >= document.metadata.created);
    }
}
