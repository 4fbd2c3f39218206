//! Key/value "local storage" abstraction with change notifications.

use ghostwriter_core::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// One write in an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Set { key: String, value: String },
    Remove { key: String },
}

impl StorageOp {
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self::Remove { key: key.into() }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. } | Self::Remove { key } => key,
        }
    }
}

/// Notification that a key changed, delivered to every other storage handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub old_value: Option<String>,
    /// `None` when the key was removed
    pub new_value: Option<String>,
}

/// Synchronous key/value store shared by every window of one origin.
///
/// Each handle stands for one window. Writes made through a handle are
/// announced to the subscriptions of all *other* handles, mirroring browser
/// storage events.
pub trait LocalStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn keys(&self) -> Result<Vec<String>>;

    /// Applies every operation or none of them; readers never observe a
    /// partially applied batch.
    fn apply(&self, ops: Vec<StorageOp>) -> Result<()>;

    /// Subscribes to changes made through other handles.
    fn subscribe(&self) -> StorageSubscription;

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.apply(vec![StorageOp::set(key, value)])
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.apply(vec![StorageOp::remove(key)])
    }
}

#[derive(Debug, Clone)]
struct Notification {
    origin: u64,
    event: StorageEvent,
}

/// Fan-out of storage events shared by all handles of one backend.
#[derive(Clone)]
pub(crate) struct StorageHub {
    sender: broadcast::Sender<Notification>,
    next_origin: Arc<AtomicU64>,
}

impl StorageHub {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            sender,
            next_origin: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocates the origin id of a new handle.
    pub(crate) fn register(&self) -> u64 {
        self.next_origin.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn publish(&self, origin: u64, events: Vec<StorageEvent>) {
        for event in events {
            // No receivers is fine; nobody is listening yet.
            let _ = self.sender.send(Notification { origin, event });
        }
    }

    pub(crate) fn subscribe(&self, origin: u64) -> StorageSubscription {
        StorageSubscription {
            origin,
            receiver: self.sender.subscribe(),
        }
    }
}

/// Receiving end of storage events for one handle.
pub struct StorageSubscription {
    origin: u64,
    receiver: broadcast::Receiver<Notification>,
}

impl StorageSubscription {
    /// Waits for the next change made by another handle.
    ///
    /// Returns `None` once the backend is gone.
    pub async fn recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(notification) if notification.origin == self.origin => continue,
                Ok(notification) => return Some(notification.event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Storage subscription lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next pending change without waiting.
    pub fn try_recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(notification) if notification.origin == self.origin => continue,
                Ok(notification) => return Some(notification.event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Storage subscription lagged, events dropped");
                }
                Err(_) => return None,
            }
        }
    }
}
