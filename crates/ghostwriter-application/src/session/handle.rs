use crate::sync::Resolution;
use ghostwriter_core::document::DocumentMetadata;
use ghostwriter_core::editor::EditorState;
use ghostwriter_core::{GhostError, Result, WindowId};
use tokio::sync::{mpsc, oneshot};

/// Commands queued on a running session
pub(crate) const COMMAND_BUFFER: usize = 64;

pub(crate) type Reply<T> = oneshot::Sender<Result<T>>;

/// Requests a [`SessionHandle`] sends to a running
/// [`SessionController`](super::SessionController).
#[derive(Debug)]
pub(crate) enum SessionCommand {
    EditInput {
        paragraph_id: String,
        input: String,
        reply: Reply<bool>,
    },
    EditOutput {
        paragraph_id: String,
        output: String,
        reply: Reply<bool>,
    },
    AddParagraph {
        after: Option<String>,
        reply: Reply<String>,
    },
    SetSystemPrompt {
        text: String,
        reply: Reply<()>,
    },
    SetInstructions {
        text: String,
        reply: Reply<()>,
    },
    Save {
        reply: Reply<()>,
    },
    Navigate {
        index: usize,
        reply: Reply<()>,
    },
    GoBack {
        reply: Reply<bool>,
    },
    GoForward {
        reply: Reply<bool>,
    },
    Rename {
        name: String,
        reply: Reply<()>,
    },
    NewDocument {
        name: String,
        reply: Reply<()>,
    },
    OpenDocument {
        id: String,
        reply: Reply<()>,
    },
    DeleteDocument {
        id: String,
        reply: Reply<()>,
    },
    ListDocuments {
        reply: Reply<Vec<DocumentMetadata>>,
    },
    Resolve {
        resolution: Resolution,
        reply: Reply<()>,
    },
    Editor {
        reply: Reply<EditorState>,
    },
    Metadata {
        reply: Reply<DocumentMetadata>,
    },
    PendingConflict {
        reply: Reply<Option<WindowId>>,
    },
    ExportText {
        reply: Reply<String>,
    },
}

/// Cloneable front end of a session driven by
/// [`SessionController::run`](super::SessionController::run).
///
/// Every call waits for the session loop to carry out the request. Once the
/// loop has stopped, calls fail with an internal error.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub(crate) fn new(commands: mpsc::Sender<SessionCommand>) -> Self {
        Self { commands }
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> SessionCommand) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| stopped())?;
        response.await.map_err(|_| stopped())?
    }

    pub async fn edit_input(&self, paragraph_id: &str, input: impl Into<String>) -> Result<bool> {
        let paragraph_id = paragraph_id.to_string();
        let input = input.into();
        self.request(|reply| SessionCommand::EditInput {
            paragraph_id,
            input,
            reply,
        })
        .await
    }

    pub async fn edit_output(&self, paragraph_id: &str, output: impl Into<String>) -> Result<bool> {
        let paragraph_id = paragraph_id.to_string();
        let output = output.into();
        self.request(|reply| SessionCommand::EditOutput {
            paragraph_id,
            output,
            reply,
        })
        .await
    }

    pub async fn add_paragraph(&self, after: Option<&str>) -> Result<String> {
        let after = after.map(str::to_string);
        self.request(|reply| SessionCommand::AddParagraph { after, reply })
            .await
    }

    pub async fn set_system_prompt(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.request(|reply| SessionCommand::SetSystemPrompt { text, reply })
            .await
    }

    pub async fn set_instructions(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.request(|reply| SessionCommand::SetInstructions { text, reply })
            .await
    }

    pub async fn save(&self) -> Result<()> {
        self.request(|reply| SessionCommand::Save { reply }).await
    }

    pub async fn navigate(&self, index: usize) -> Result<()> {
        self.request(|reply| SessionCommand::Navigate { index, reply })
            .await
    }

    pub async fn go_back(&self) -> Result<bool> {
        self.request(|reply| SessionCommand::GoBack { reply }).await
    }

    pub async fn go_forward(&self) -> Result<bool> {
        self.request(|reply| SessionCommand::GoForward { reply }).await
    }

    pub async fn rename(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.request(|reply| SessionCommand::Rename { name, reply })
            .await
    }

    pub async fn new_document(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.request(|reply| SessionCommand::NewDocument { name, reply })
            .await
    }

    pub async fn open_document(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.request(|reply| SessionCommand::OpenDocument { id, reply })
            .await
    }

    pub async fn delete_document(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.request(|reply| SessionCommand::DeleteDocument { id, reply })
            .await
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentMetadata>> {
        self.request(|reply| SessionCommand::ListDocuments { reply })
            .await
    }

    pub async fn resolve(&self, resolution: Resolution) -> Result<()> {
        self.request(|reply| SessionCommand::Resolve { resolution, reply })
            .await
    }

    /// Copy of the live editor state.
    pub async fn editor(&self) -> Result<EditorState> {
        self.request(|reply| SessionCommand::Editor { reply }).await
    }

    /// Metadata of the active document.
    pub async fn metadata(&self) -> Result<DocumentMetadata> {
        self.request(|reply| SessionCommand::Metadata { reply }).await
    }

    pub async fn pending_conflict(&self) -> Result<Option<WindowId>> {
        self.request(|reply| SessionCommand::PendingConflict { reply })
            .await
    }

    pub async fn export_text(&self) -> Result<String> {
        self.request(|reply| SessionCommand::ExportText { reply })
            .await
    }
}

fn stopped() -> GhostError {
    GhostError::internal("session stopped")
}
