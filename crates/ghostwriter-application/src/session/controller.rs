use super::event::SessionEvent;
use super::handle::{COMMAND_BUFFER, SessionCommand, SessionHandle};
use crate::debounce::Debouncer;
use crate::export;
use crate::sync::{CrossWindowSync, Resolution, SyncNotice};
use ghostwriter_core::completion::{CompletionError, CompletionService};
use ghostwriter_core::config::GhostwriterConfig;
use ghostwriter_core::document::{
    Document, DocumentMetadata, DocumentRepository, Snapshot, UNTITLED_DOCUMENT_NAME,
};
use ghostwriter_core::editor::{EditorState, capture};
use ghostwriter_core::{GhostError, Result, WindowId};
use ghostwriter_infrastructure::{StorageEvent, StorageSubscription};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Timer and retention settings of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Idle time after the last keystroke in a paragraph before it is sent for completion
    pub completion_debounce: Duration,
    /// Idle time after the last change before an automatic snapshot
    pub autosave_idle: Duration,
    /// Automatic snapshots retained per document
    pub keep_auto_saves: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&GhostwriterConfig::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &GhostwriterConfig) -> Self {
        Self {
            completion_debounce: config.completion.debounce(),
            autosave_idle: config.autosave.idle(),
            keep_auto_saves: config.autosave.keep_auto_saves,
        }
    }
}

/// Editing session of one window.
///
/// Owns the active document, the live editor state and the timers driving
/// completions and auto-saves. Every operation that changes the document
/// persists it through the repository before returning.
///
/// Timer firings and completion results are queued on an internal channel;
/// [`run`](Self::run) or [`process_next_event`](Self::process_next_event)
/// drain it. While [`run`](Self::run) drives the session, front ends talk
/// to it through a [`SessionHandle`].
pub struct SessionController {
    window: WindowId,
    store: Arc<dyn DocumentRepository>,
    completion: Arc<dyn CompletionService>,
    settings: SessionSettings,
    document: Document,
    editor: EditorState,
    sync: CrossWindowSync,
    /// Window whose write is waiting for a [`Resolution`]
    pending_conflict: Option<WindowId>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    commands_tx: mpsc::Sender<SessionCommand>,
    commands_rx: mpsc::Receiver<SessionCommand>,
    completion_timers: HashMap<String, Debouncer<SessionEvent>>,
    autosave_timer: Debouncer<SessionEvent>,
    /// Newest request token per paragraph
    request_tokens: HashMap<String, u64>,
    next_token: u64,
}

enum Next {
    Session(SessionEvent),
    Command(SessionCommand),
    Storage(StorageEvent),
    StorageClosed,
    Shutdown,
}

impl SessionController {
    /// Starts a session for `window`.
    ///
    /// # Arguments
    ///
    /// * `document_id` - Document to open. When it is unknown or its payload
    ///   is unreadable, or when no id is given, a new untitled document is
    ///   created instead.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage itself fails.
    pub async fn start(
        store: Arc<dyn DocumentRepository>,
        completion: Arc<dyn CompletionService>,
        settings: SessionSettings,
        window: WindowId,
        document_id: Option<&str>,
    ) -> Result<Self> {
        let document = load_or_create(store.as_ref(), document_id, &window).await?;
        let editor = editor_for(&document);
        let sync = CrossWindowSync::new(window.clone(), document.id(), document.name());

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let autosave_timer = Debouncer::new(settings.autosave_idle, events_tx.clone());

        tracing::info!(
            window = %window,
            id = %document.id(),
            name = %document.name(),
            versions = document.history.len(),
            "Session started"
        );

        Ok(Self {
            window,
            store,
            completion,
            settings,
            document,
            editor,
            sync,
            pending_conflict: None,
            events_tx,
            events_rx,
            commands_tx,
            commands_rx,
            completion_timers: HashMap::new(),
            autosave_timer,
            request_tokens: HashMap::new(),
            next_token: 0,
        })
    }

    pub fn window(&self) -> &WindowId {
        &self.window
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn editor(&self) -> &EditorState {
        &self.editor
    }

    /// The window whose change is awaiting a [`resolve`](Self::resolve) call.
    pub fn pending_conflict(&self) -> Option<&WindowId> {
        self.pending_conflict.as_ref()
    }

    pub fn is_autosave_pending(&self) -> bool {
        self.autosave_timer.is_pending()
    }

    /// Handle for driving this session while [`run`](Self::run) owns it.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(self.commands_tx.clone())
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Replaces a paragraph's input and re-arms its completion timer.
    ///
    /// Returns false if the paragraph does not exist.
    pub fn edit_input(&mut self, paragraph_id: &str, input: impl Into<String>) -> bool {
        let input = input.into();
        let blank = input.trim().is_empty();
        if !self.editor.set_input(paragraph_id, input) {
            return false;
        }

        if blank {
            if let Some(timer) = self.completion_timers.get_mut(paragraph_id) {
                timer.cancel();
            }
        } else {
            let delay = self.settings.completion_debounce;
            let events = self.events_tx.clone();
            self.completion_timers
                .entry(paragraph_id.to_string())
                .or_insert_with(|| Debouncer::new(delay, events))
                .schedule(SessionEvent::CompletionDue {
                    paragraph_id: paragraph_id.to_string(),
                });
        }
        self.schedule_autosave();
        true
    }

    /// Replaces a paragraph's output by hand.
    pub fn edit_output(&mut self, paragraph_id: &str, output: impl Into<String>) -> bool {
        let changed = self.editor.set_output(paragraph_id, output);
        if changed {
            self.schedule_autosave();
        }
        changed
    }

    /// Inserts an empty paragraph after `after` (or at the end) and returns its id.
    pub fn add_paragraph(&mut self, after: Option<&str>) -> String {
        let id = self.editor.insert_paragraph_after(after);
        self.schedule_autosave();
        id
    }

    pub fn set_system_prompt(&mut self, system_prompt: impl Into<String>) {
        self.editor.set_system_prompt(system_prompt);
        self.schedule_autosave();
    }

    pub fn set_instructions(&mut self, instructions: impl Into<String>) {
        self.editor.set_instructions(instructions);
        self.schedule_autosave();
    }

    fn schedule_autosave(&mut self) {
        self.autosave_timer.schedule(SessionEvent::AutoSaveDue);
    }

    // ------------------------------------------------------------------
    // Versions
    // ------------------------------------------------------------------

    /// Saves the live editor state as a manual version.
    ///
    /// Any versions after the cursor are discarded. Saving while a conflict
    /// is pending keeps this window's content (same as [`Resolution::KeepMine`]).
    pub async fn save(&mut self) -> Result<()> {
        self.autosave_timer.cancel();
        let snapshot = capture(&self.editor).authored_by(&self.window);
        self.document.history.append(snapshot);
        self.document
            .history
            .trim_auto_saves(self.settings.keep_auto_saves);
        self.store.save(&mut self.document).await?;

        if let Some(remote) = self.pending_conflict.take() {
            tracing::info!(remote = %remote, "Conflict resolved by keeping local content");
        }
        tracing::info!(
            id = %self.document.id(),
            versions = self.document.history.len(),
            "Saved version"
        );
        Ok(())
    }

    /// Appends an automatic snapshot of the live state.
    ///
    /// Skipped while browsing an older version and while a conflict awaits
    /// resolution. Returns whether a snapshot was written.
    pub async fn auto_save(&mut self) -> Result<bool> {
        if self.pending_conflict.is_some() {
            tracing::debug!("Auto-save suspended until the conflict is resolved");
            return Ok(false);
        }
        if !self.document.history.is_at_latest() {
            tracing::debug!(
                cursor = self.document.history.current_index_raw(),
                "Auto-save skipped while viewing an older version"
            );
            return Ok(false);
        }

        let snapshot = capture(&self.editor)
            .as_auto_save()
            .authored_by(&self.window);
        self.document.history.append(snapshot);
        self.document
            .history
            .trim_auto_saves(self.settings.keep_auto_saves);
        self.store.save(&mut self.document).await?;

        tracing::debug!(id = %self.document.id(), "Auto-saved");
        Ok(true)
    }

    /// Moves to version `index` and loads it into the editor.
    ///
    /// Leaving the latest version first checkpoints the live state.
    ///
    /// # Errors
    ///
    /// * `ConflictPending` while another window's change awaits a
    ///   [`resolve`](Self::resolve) call
    /// * `InvalidVersion` if `index` is out of range
    ///
    /// Nothing changes in either case.
    pub async fn navigate(&mut self, index: usize) -> Result<()> {
        if let Some(remote) = &self.pending_conflict {
            return Err(GhostError::ConflictPending {
                window: remote.to_string(),
            });
        }

        let snapshot = self
            .document
            .history
            .navigate(index, &self.editor, &self.window)?
            .clone();
        self.editor = EditorState::rehydrate(&snapshot);
        self.autosave_timer.cancel();
        self.cancel_completions();

        self.document
            .history
            .trim_auto_saves(self.settings.keep_auto_saves);
        self.store.save(&mut self.document).await?;

        tracing::debug!(
            index,
            versions = self.document.history.len(),
            "Navigated version history"
        );
        Ok(())
    }

    /// Steps one version back. Returns false when already at the oldest.
    pub async fn go_back(&mut self) -> Result<bool> {
        match self.document.history.previous_index() {
            Some(index) => self.navigate(index).await.map(|_| true),
            None => Ok(false),
        }
    }

    /// Steps one version forward. Returns false when already at the newest.
    pub async fn go_forward(&mut self) -> Result<bool> {
        match self.document.history.next_index() {
            Some(index) => self.navigate(index).await.map(|_| true),
            None => Ok(false),
        }
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    pub async fn list_documents(&self) -> Result<Vec<DocumentMetadata>> {
        self.store.list().await
    }

    /// Renames the active document in memory and in the registry.
    pub async fn rename(&mut self, name: &str) -> Result<()> {
        let metadata = self.store.rename(self.document.id(), name).await?;
        self.document.metadata.name = metadata.name;
        self.document.metadata.updated = metadata.updated;
        self.sync.track(self.document.id(), self.document.name());
        Ok(())
    }

    /// Creates a document and makes it active.
    pub async fn new_document(&mut self, name: &str) -> Result<()> {
        self.flush_autosave().await?;
        let document = create_document(self.store.as_ref(), name, &self.window).await?;
        self.replace_document(document);
        Ok(())
    }

    /// Makes `id` the active document, falling back to a new one when it
    /// cannot be opened.
    pub async fn open_document(&mut self, id: &str) -> Result<()> {
        self.flush_autosave().await?;
        let document = load_or_create(self.store.as_ref(), Some(id), &self.window).await?;
        self.replace_document(document);
        Ok(())
    }

    /// Deletes a document. Deleting the active one activates a fresh document.
    pub async fn delete_document(&mut self, id: &str) -> Result<()> {
        let active = id == self.document.id();
        if active {
            self.autosave_timer.cancel();
        }
        self.store.delete(id).await?;

        if active {
            let document =
                create_document(self.store.as_ref(), UNTITLED_DOCUMENT_NAME, &self.window).await?;
            self.replace_document(document);
        }
        Ok(())
    }

    /// Writes the auto-save owed to the active document before it is
    /// replaced, including one whose timer already fired but is still queued.
    async fn flush_autosave(&mut self) -> Result<()> {
        let mut due = self.autosave_timer.cancel();
        due |= self.apply_queued_events();
        due |= self.autosave_timer.cancel();
        if due {
            self.auto_save().await?;
        }
        Ok(())
    }

    /// Applies finished completions already queued and drops pending timer
    /// firings. Returns whether an auto-save was due.
    fn apply_queued_events(&mut self) -> bool {
        let mut autosave_due = false;
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                SessionEvent::AutoSaveDue => autosave_due = true,
                SessionEvent::CompletionFinished {
                    paragraph_id,
                    token,
                    result,
                } => {
                    autosave_due |= self.apply_completion(&paragraph_id, token, result);
                }
                SessionEvent::CompletionDue { .. } => {}
            }
        }
        autosave_due
    }

    fn replace_document(&mut self, document: Document) {
        self.autosave_timer.cancel();
        self.cancel_completions();
        while self.events_rx.try_recv().is_ok() {}
        self.pending_conflict = None;
        self.editor = editor_for(&document);
        self.sync.track(document.id(), document.name());

        tracing::info!(id = %document.id(), name = %document.name(), "Active document changed");
        self.document = document;
    }

    fn cancel_completions(&mut self) {
        self.completion_timers.clear();
        self.request_tokens.clear();
    }

    // ------------------------------------------------------------------
    // Cross-window sync
    // ------------------------------------------------------------------

    /// Applies a storage change made by another window.
    ///
    /// Returns the notice a front end should show, if any.
    pub async fn handle_storage_event(
        &mut self,
        event: &StorageEvent,
    ) -> Result<Option<SyncNotice>> {
        let Some(notice) = self.sync.handle_event(event) else {
            return Ok(None);
        };

        match &notice {
            SyncNotice::ConflictDetected { remote_window } => {
                self.pending_conflict = Some(remote_window.clone());
            }
            SyncNotice::Renamed { name } => {
                tracing::info!(
                    id = %self.document.id(),
                    name = %name,
                    "Document renamed in another window"
                );
                self.document.metadata.name = name.clone();
            }
            SyncNotice::DeletedElsewhere => self.recover_deleted_document().await?,
        }
        Ok(Some(notice))
    }

    /// Moves the live editor content into a new untitled document after
    /// another window deleted the active one.
    async fn recover_deleted_document(&mut self) -> Result<()> {
        self.autosave_timer.cancel();
        self.apply_queued_events();
        let carried = capture(&self.editor).authored_by(&self.window);
        let unsaved = carried.paragraphs().iter().any(|p| !p.is_blank());

        let document = if unsaved {
            tracing::warn!(
                id = %self.document.id(),
                paragraphs = carried.paragraphs().len(),
                "Active document deleted in another window, keeping its content in a new document"
            );
            create_with(self.store.as_ref(), UNTITLED_DOCUMENT_NAME, carried).await?
        } else {
            tracing::warn!(id = %self.document.id(), "Active document deleted in another window");
            create_document(self.store.as_ref(), UNTITLED_DOCUMENT_NAME, &self.window).await?
        };
        self.replace_document(document);
        Ok(())
    }

    /// Settles a pending conflict. Without one this is a no-op.
    pub async fn resolve(&mut self, resolution: Resolution) -> Result<()> {
        if self.pending_conflict.is_none() {
            return Ok(());
        }

        match resolution {
            Resolution::LoadChanges => {
                let id = self.document.id().to_string();
                let document = load_or_create(self.store.as_ref(), Some(&id), &self.window).await?;
                self.replace_document(document);
                tracing::info!(id = %id, "Loaded changes from another window");
            }
            Resolution::KeepMine => self.save().await?,
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Completions
    // ------------------------------------------------------------------

    fn request_completion(&mut self, paragraph_id: &str) {
        let Some(paragraph) = self.editor.paragraph(paragraph_id) else {
            return;
        };
        if paragraph.input.trim().is_empty() {
            return;
        }

        let settings = self.editor.prompt_settings();
        let system_prompt = settings.system_prompt.clone();
        let user_text = settings.user_text(&paragraph.input);

        self.next_token += 1;
        let token = self.next_token;
        self.request_tokens.insert(paragraph_id.to_string(), token);

        let service = Arc::clone(&self.completion);
        let events = self.events_tx.clone();
        let paragraph_id = paragraph_id.to_string();
        tracing::debug!(paragraph = %paragraph_id, token, "Requesting completion");

        tokio::spawn(async move {
            let result = service.complete(&system_prompt, &user_text).await;
            let _ = events.send(SessionEvent::CompletionFinished {
                paragraph_id,
                token,
                result,
            });
        });
    }

    /// Writes a completion result into the paragraph's output.
    ///
    /// Errors are written as their display text. Results superseded by a
    /// newer request for the same paragraph are dropped.
    fn apply_completion(
        &mut self,
        paragraph_id: &str,
        token: u64,
        result: std::result::Result<String, CompletionError>,
    ) -> bool {
        if self.request_tokens.get(paragraph_id) != Some(&token) {
            tracing::debug!(paragraph = %paragraph_id, token, "Dropping stale completion");
            return false;
        }
        self.request_tokens.remove(paragraph_id);

        let output = match result {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(paragraph = %paragraph_id, error = %e, "Completion failed");
                e.to_string()
            }
        };
        self.edit_output(paragraph_id, output)
    }

    // ------------------------------------------------------------------
    // Event loop
    // ------------------------------------------------------------------

    pub async fn handle_event(&mut self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::CompletionDue { paragraph_id } => {
                self.request_completion(&paragraph_id);
            }
            SessionEvent::AutoSaveDue => {
                self.auto_save().await?;
            }
            SessionEvent::CompletionFinished {
                paragraph_id,
                token,
                result,
            } => {
                self.apply_completion(&paragraph_id, token, result);
            }
        }
        Ok(())
    }

    /// Waits for the next timer firing or completion result and handles it.
    pub async fn process_next_event(&mut self) -> Result<()> {
        match self.events_rx.recv().await {
            Some(event) => self.handle_event(event).await,
            None => Ok(()),
        }
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        // A dropped reply means the caller stopped waiting
        match command {
            SessionCommand::EditInput {
                paragraph_id,
                input,
                reply,
            } => {
                let _ = reply.send(Ok(self.edit_input(&paragraph_id, input)));
            }
            SessionCommand::EditOutput {
                paragraph_id,
                output,
                reply,
            } => {
                let _ = reply.send(Ok(self.edit_output(&paragraph_id, output)));
            }
            SessionCommand::AddParagraph { after, reply } => {
                let _ = reply.send(Ok(self.add_paragraph(after.as_deref())));
            }
            SessionCommand::SetSystemPrompt { text, reply } => {
                self.set_system_prompt(text);
                let _ = reply.send(Ok(()));
            }
            SessionCommand::SetInstructions { text, reply } => {
                self.set_instructions(text);
                let _ = reply.send(Ok(()));
            }
            SessionCommand::Save { reply } => {
                let _ = reply.send(self.save().await);
            }
            SessionCommand::Navigate { index, reply } => {
                let _ = reply.send(self.navigate(index).await);
            }
            SessionCommand::GoBack { reply } => {
                let _ = reply.send(self.go_back().await);
            }
            SessionCommand::GoForward { reply } => {
                let _ = reply.send(self.go_forward().await);
            }
            SessionCommand::Rename { name, reply } => {
                let _ = reply.send(self.rename(&name).await);
            }
            SessionCommand::NewDocument { name, reply } => {
                let _ = reply.send(self.new_document(&name).await);
            }
            SessionCommand::OpenDocument { id, reply } => {
                let _ = reply.send(self.open_document(&id).await);
            }
            SessionCommand::DeleteDocument { id, reply } => {
                let _ = reply.send(self.delete_document(&id).await);
            }
            SessionCommand::ListDocuments { reply } => {
                let _ = reply.send(self.list_documents().await);
            }
            SessionCommand::Resolve { resolution, reply } => {
                let _ = reply.send(self.resolve(resolution).await);
            }
            SessionCommand::Editor { reply } => {
                let _ = reply.send(Ok(self.editor.clone()));
            }
            SessionCommand::Metadata { reply } => {
                let _ = reply.send(Ok(self.document.metadata.clone()));
            }
            SessionCommand::PendingConflict { reply } => {
                let _ = reply.send(Ok(self.pending_conflict.clone()));
            }
            SessionCommand::ExportText { reply } => {
                let _ = reply.send(Ok(self.export_text()));
            }
        }
    }

    /// Drives the session until `shutdown` is cancelled, then returns it.
    ///
    /// Serves timer firings, completion results, storage changes from other
    /// windows and commands from [`SessionHandle`]s. Failures are logged and
    /// the loop keeps going. Handles taken before shutdown stop working once
    /// it returns.
    pub async fn run(
        mut self,
        mut storage: StorageSubscription,
        shutdown: CancellationToken,
    ) -> Self {
        let mut storage_open = true;
        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => Next::Shutdown,
                event = self.events_rx.recv() => match event {
                    Some(event) => Next::Session(event),
                    None => Next::Shutdown,
                },
                Some(command) = self.commands_rx.recv() => Next::Command(command),
                change = storage.recv(), if storage_open => match change {
                    Some(change) => Next::Storage(change),
                    None => Next::StorageClosed,
                },
            };

            match next {
                Next::Session(event) => {
                    if let Err(e) = self.handle_event(event).await {
                        tracing::error!(error = %e, "Session event failed");
                    }
                }
                Next::Command(command) => self.handle_command(command).await,
                Next::Storage(change) => {
                    if let Err(e) = self.handle_storage_event(&change).await {
                        tracing::error!(
                            error = %e,
                            key = %change.key,
                            "Storage change handling failed"
                        );
                    }
                }
                Next::StorageClosed => {
                    tracing::warn!("Storage subscription closed");
                    storage_open = false;
                }
                Next::Shutdown => break,
            }
        }

        self.detach_handles();
        tracing::info!(window = %self.window, "Session stopped");
        self
    }

    /// Closes the command channel so outstanding handles fail instead of
    /// waiting, then opens a fresh one for later handles.
    fn detach_handles(&mut self) {
        self.commands_rx.close();
        while self.commands_rx.try_recv().is_ok() {}
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        self.commands_tx = commands_tx;
        self.commands_rx = commands_rx;
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Plain-text rendition of the live editor content.
    pub fn export_text(&self) -> String {
        export::render(self.editor.paragraphs())
    }

    pub fn export_file_name(&self) -> String {
        export::file_name(self.document.name())
    }
}

/// Creates a document whose first version is an empty editor.
///
/// A document always has a current version to open into and to compare
/// against in other windows.
pub async fn create_document(
    store: &dyn DocumentRepository,
    name: &str,
    window: &WindowId,
) -> Result<Document> {
    let initial = capture(&EditorState::new()).authored_by(window);
    create_with(store, name, initial).await
}

async fn create_with(
    store: &dyn DocumentRepository,
    name: &str,
    initial: Snapshot,
) -> Result<Document> {
    let mut document = store.create(name).await?;
    document.history.append(initial);
    store.save(&mut document).await?;
    Ok(document)
}

async fn load_or_create(
    store: &dyn DocumentRepository,
    id: Option<&str>,
    window: &WindowId,
) -> Result<Document> {
    if let Some(id) = id {
        match store.open(id).await {
            Ok(document) => return Ok(document),
            Err(e) if e.is_recoverable_open_failure() => {
                tracing::warn!(id, error = %e, "Could not open document, creating a new one");
            }
            Err(e) => return Err(e),
        }
    }
    create_document(store, UNTITLED_DOCUMENT_NAME, window).await
}

fn editor_for(document: &Document) -> EditorState {
    document
        .history
        .current()
        .map(EditorState::rehydrate)
        .unwrap_or_default()
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("window", &self.window)
            .field("document", &self.document.metadata)
            .field("pending_conflict", &self.pending_conflict)
            .finish_non_exhaustive()
    }
}
