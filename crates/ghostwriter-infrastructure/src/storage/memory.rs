//! In-memory local storage shared by several window handles.

use super::local_storage::{LocalStorage, StorageEvent, StorageHub, StorageOp, StorageSubscription};
use ghostwriter_core::{GhostError, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

struct Shared {
    entries: Mutex<BTreeMap<String, String>>,
    quota: Option<usize>,
    hub: StorageHub,
}

/// Browser-like local storage kept in memory.
///
/// `MemoryStorage::new()` is the first window; [`MemoryStorage::handle`]
/// opens further windows onto the same entries. An optional byte quota
/// (keys plus values) makes oversized writes fail with
/// `GhostError::StorageQuotaExceeded`.
pub struct MemoryStorage {
    shared: Arc<Shared>,
    origin: u64,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_quota(bytes: usize) -> Self {
        Self::build(Some(bytes))
    }

    fn build(quota: Option<usize>) -> Self {
        let hub = StorageHub::new();
        let origin = hub.register();
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(BTreeMap::new()),
                quota,
                hub,
            }),
            origin,
        }
    }

    /// Opens another window onto the same storage.
    pub fn handle(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            origin: self.shared.hub.register(),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.shared
            .entries
            .lock()
            .map_err(|e| GhostError::internal(format!("Memory storage lock poisoned: {e}")))
    }
}

fn used_bytes(entries: &BTreeMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn apply(&self, ops: Vec<StorageOp>) -> Result<()> {
        let events = {
            let mut entries = self.lock()?;
            let mut staged = entries.clone();
            let mut events = Vec::with_capacity(ops.len());

            for op in ops {
                let event = match op {
                    StorageOp::Set { key, value } => StorageEvent {
                        old_value: staged.insert(key.clone(), value.clone()),
                        new_value: Some(value),
                        key,
                    },
                    StorageOp::Remove { key } => StorageEvent {
                        old_value: staged.remove(&key),
                        new_value: None,
                        key,
                    },
                };
                events.push(event);
            }

            if let Some(quota) = self.shared.quota {
                let needed = used_bytes(&staged);
                if needed > quota {
                    return Err(GhostError::StorageQuotaExceeded { needed, quota });
                }
            }

            *entries = staged;
            events
        };

        self.shared.hub.publish(self.origin, events);
        Ok(())
    }

    fn subscribe(&self) -> StorageSubscription {
        self.shared.hub.subscribe(self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let storage = MemoryStorage::new();
        storage.set("a", "1").unwrap();
        assert_eq!(storage.get("a").unwrap(), Some("1".to_string()));

        storage.remove("a").unwrap();
        assert_eq!(storage.get("a").unwrap(), None);
    }

    #[test]
    fn test_events_reach_other_handles_only() {
        let window1 = MemoryStorage::new();
        let window2 = window1.handle();
        let mut own = window1.subscribe();
        let mut other = window2.subscribe();

        window1.set("k", "v").unwrap();

        assert_eq!(own.try_recv(), None);
        let event = other.try_recv().unwrap();
        assert_eq!(event.key, "k");
        assert_eq!(event.old_value, None);
        assert_eq!(event.new_value, Some("v".to_string()));
        assert_eq!(window2.get("k").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn test_quota_rejects_whole_batch() {
        let storage = MemoryStorage::with_quota(10);
        storage.set("a", "1234").unwrap();

        let err = storage
            .apply(vec![StorageOp::set("b", "1"), StorageOp::set("c", "123456789")])
            .unwrap_err();

        assert!(err.is_quota_exceeded());
        assert_eq!(storage.get("b").unwrap(), None);
        assert_eq!(storage.keys().unwrap(), vec!["a".to_string()]);
    }
}
