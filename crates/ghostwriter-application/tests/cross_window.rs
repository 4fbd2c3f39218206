//! Two windows editing through the same storage.

use async_trait::async_trait;
use ghostwriter_application::{Resolution, SessionController, SessionSettings, SyncNotice};
use ghostwriter_core::WindowId;
use ghostwriter_core::completion::{CompletionError, CompletionService};
use ghostwriter_core::document::DocumentRepository;
use ghostwriter_infrastructure::{
    LocalDocumentStore, LocalStorage, MemoryStorage, StorageSubscription,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct Offline;

#[async_trait]
impl CompletionService for Offline {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, CompletionError> {
        Err(CompletionError::MissingCredential)
    }
}

struct Window {
    session: SessionController,
    changes: StorageSubscription,
}

impl Window {
    async fn open(storage: MemoryStorage, name: &str, id: Option<&str>) -> Self {
        let changes = storage.subscribe();
        let store = Arc::new(LocalDocumentStore::new(Arc::new(storage)));
        let session = SessionController::start(
            store,
            Arc::new(Offline),
            SessionSettings::default(),
            WindowId::from(name),
            id,
        )
        .await
        .unwrap();
        Self { session, changes }
    }

    /// Feeds every pending storage change to the session.
    async fn sync(&mut self) -> Vec<SyncNotice> {
        let mut notices = Vec::new();
        while let Some(change) = self.changes.try_recv() {
            if let Some(notice) = self.session.handle_storage_event(&change).await.unwrap() {
                notices.push(notice);
            }
        }
        notices
    }

    fn first_paragraph(&self) -> String {
        self.session.editor().paragraphs().next().unwrap().id.clone()
    }

    fn inputs(&self) -> Vec<String> {
        self.session
            .editor()
            .paragraphs()
            .map(|p| p.input.clone())
            .collect()
    }
}

async fn two_windows() -> (Window, Window) {
    two_windows_on(&MemoryStorage::new()).await
}

async fn two_windows_on(storage: &MemoryStorage) -> (Window, Window) {
    let mut a = Window::open(storage.handle(), "window-a", None).await;
    let id = a.session.document().id().to_string();
    let mut b = Window::open(storage.handle(), "window-b", Some(&id)).await;
    a.sync().await;
    b.sync().await;
    (a, b)
}

#[tokio::test]
async fn test_remote_save_raises_conflict() {
    let (mut a, mut b) = two_windows().await;
    assert_eq!(a.session.document().id(), b.session.document().id());
    assert_eq!(b.session.document().history.len(), 1);
    assert!(b.session.pending_conflict().is_none());

    let paragraph = a.first_paragraph();
    a.session.edit_input(&paragraph, "written in A");
    a.session.save().await.unwrap();

    let notices = b.sync().await;
    assert_eq!(
        notices,
        vec![SyncNotice::ConflictDetected {
            remote_window: WindowId::from("window-a")
        }]
    );
    assert_eq!(b.session.pending_conflict(), Some(&WindowId::from("window-a")));
    // the writer is not notified of its own change
    assert!(a.sync().await.is_empty());
}

#[tokio::test]
async fn test_load_changes_adopts_remote_content() {
    let (mut a, mut b) = two_windows().await;
    let paragraph = a.first_paragraph();
    a.session.edit_input(&paragraph, "written in A");
    a.session.save().await.unwrap();
    b.sync().await;

    b.session.resolve(Resolution::LoadChanges).await.unwrap();

    assert!(b.session.pending_conflict().is_none());
    assert_eq!(b.inputs(), vec!["written in A".to_string()]);
    assert_eq!(b.session.document().history, a.session.document().history);
}

#[tokio::test]
async fn test_keep_mine_overwrites_and_notifies_other_window() {
    let (mut a, mut b) = two_windows().await;
    let paragraph = a.first_paragraph();
    a.session.edit_input(&paragraph, "written in A");
    a.session.save().await.unwrap();
    b.sync().await;

    let mine = b.session.add_paragraph(None);
    b.session.edit_input(&mine, "written in B");
    b.session.resolve(Resolution::KeepMine).await.unwrap();

    assert!(b.session.pending_conflict().is_none());
    let latest = b.session.document().history.latest().unwrap();
    assert_eq!(latest.editor_window(), &WindowId::from("window-b"));

    let notices = a.sync().await;
    assert_eq!(
        notices,
        vec![SyncNotice::ConflictDetected {
            remote_window: WindowId::from("window-b")
        }]
    );
}

#[tokio::test]
async fn test_autosave_waits_for_resolution() {
    let (mut a, mut b) = two_windows().await;
    a.session.save().await.unwrap();
    b.sync().await;
    let before = b.session.document().history.len();

    assert!(!b.session.auto_save().await.unwrap());
    assert_eq!(b.session.document().history.len(), before);

    b.session.resolve(Resolution::LoadChanges).await.unwrap();
    assert!(b.session.auto_save().await.unwrap());
}

#[tokio::test]
async fn test_navigate_refused_while_conflict_pending() {
    let storage = MemoryStorage::new();
    let (mut a, mut b) = two_windows_on(&storage).await;
    let paragraph = a.first_paragraph();
    a.session.edit_input(&paragraph, "written in A");
    a.session.save().await.unwrap();
    b.sync().await;
    let id = a.session.document().id().to_string();

    let err = b.session.navigate(0).await.unwrap_err();
    assert!(err.is_conflict_pending());
    assert!(b.session.go_back().await.unwrap_err().is_conflict_pending());
    assert_eq!(b.session.pending_conflict(), Some(&WindowId::from("window-a")));

    // A's version is still the latest on disk
    let store = LocalDocumentStore::new(Arc::new(storage.handle()));
    let stored = store.open(&id).await.unwrap();
    assert_eq!(stored.history.len(), 2);
    let latest = stored.history.latest().unwrap();
    assert_eq!(latest.editor_window(), &WindowId::from("window-a"));
    assert_eq!(latest.paragraphs()[0].input, "written in A");
    assert!(a.sync().await.is_empty());

    b.session.resolve(Resolution::LoadChanges).await.unwrap();
    b.session.navigate(0).await.unwrap();
    assert_eq!(b.session.document().history.current_index(), Some(0));
}

#[tokio::test]
async fn test_rename_propagates_to_other_window() {
    let (mut a, mut b) = two_windows().await;

    a.session.rename("Chapter 1").await.unwrap();

    assert_eq!(
        b.sync().await,
        vec![SyncNotice::Renamed {
            name: "Chapter 1".to_string()
        }]
    );
    assert_eq!(b.session.document().name(), "Chapter 1");
    assert!(b.session.pending_conflict().is_none());
}

#[tokio::test]
async fn test_delete_elsewhere_replaces_active_document() {
    let (mut a, mut b) = two_windows().await;
    let id = a.session.document().id().to_string();

    a.session.delete_document(&id).await.unwrap();

    let notices = b.sync().await;
    assert!(notices.contains(&SyncNotice::DeletedElsewhere));
    assert_ne!(b.session.document().id(), id);
    assert_eq!(b.session.document().history.len(), 1);
    assert!(
        b.session
            .list_documents()
            .await
            .unwrap()
            .iter()
            .all(|m| m.id != id)
    );
}

#[tokio::test]
async fn test_delete_elsewhere_keeps_unsaved_edits() {
    let storage = MemoryStorage::new();
    let (mut a, mut b) = two_windows_on(&storage).await;
    let id = a.session.document().id().to_string();
    let paragraph = b.first_paragraph();
    b.session.edit_input(&paragraph, "not saved yet");
    b.session.set_instructions("KEEP IT SHORT");

    a.session.delete_document(&id).await.unwrap();
    b.sync().await;

    let replacement = b.session.document().id().to_string();
    assert_ne!(replacement, id);
    assert_eq!(b.inputs(), vec!["not saved yet".to_string()]);
    assert_eq!(b.session.editor().prompt_settings().instructions, "KEEP IT SHORT");

    let store = LocalDocumentStore::new(Arc::new(storage.handle()));
    let stored = store.open(&replacement).await.unwrap();
    assert_eq!(stored.history.len(), 1);
    let version = stored.history.latest().unwrap();
    assert_eq!(version.paragraphs()[0].input, "not saved yet");
    assert_eq!(version.editor_window(), &WindowId::from("window-b"));
}

#[tokio::test]
async fn test_quota_exceeded_surfaces_as_error() {
    let storage = MemoryStorage::with_quota(4 * 1024);
    let mut window = Window::open(storage, "window-a", None).await;
    let paragraph = window.first_paragraph();
    window.session.edit_input(&paragraph, "x".repeat(8 * 1024));

    let err = window.session.save().await.unwrap_err();

    assert!(err.is_quota_exceeded());
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_reacts_until_cancelled() {
    let storage = MemoryStorage::new();
    let writer_store = LocalDocumentStore::new(Arc::new(storage.handle()));
    let Window { session, changes } = Window::open(storage.handle(), "window-b", None).await;
    let id = session.document().id().to_string();

    let shutdown = CancellationToken::new();
    let running = tokio::spawn(session.run(changes, shutdown.clone()));

    let mut document = writer_store.open(&id).await.unwrap();
    document.history.append(
        ghostwriter_core::document::Snapshot::new(Vec::new(), Default::default())
            .authored_by(&WindowId::from("window-a")),
    );
    writer_store.save(&mut document).await.unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    shutdown.cancel();
    let session = running.await.unwrap();

    assert_eq!(session.pending_conflict(), Some(&WindowId::from("window-a")));
}
