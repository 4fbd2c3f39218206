//! Directory-backed local storage with atomic file writes.
//!
//! Each key is one JSON text file. A batch first stages every new value in
//! a synced temp file, then renames them into place; if a rename fails the
//! keys already committed are restored. The whole batch runs under an
//! exclusive lock on the directory so readers (which take a shared lock)
//! never see half a batch.

use super::local_storage::{
    LocalStorage, StorageEvent, StorageHub, StorageOp, StorageSubscription,
};
use ghostwriter_core::{GhostError, Result};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write as IoWrite};
use std::path::{Path, PathBuf};

const FILE_EXTENSION: &str = "json";
const LOCK_FILE_NAME: &str = ".storage.lock";

/// Local storage persisted as one file per key inside a directory.
///
/// Handles created with [`DirStorage::handle`] share change notifications;
/// other processes see the data but are not notified.
pub struct DirStorage {
    dir: PathBuf,
    hub: StorageHub,
    origin: u64,
}

impl DirStorage {
    /// Opens (creating if needed) a storage directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let hub = StorageHub::new();
        let origin = hub.register();
        Ok(Self { dir, hub, origin })
    }

    /// Opens another window onto the same directory.
    pub fn handle(&self) -> Self {
        Self {
            dir: self.dir.clone(),
            hub: self.hub.clone(),
            origin: self.hub.register(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", encode_key(key), FILE_EXTENSION))
    }

    fn read_key(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_key(&self, key: &str, value: &str) -> Result<()> {
        let tmp_path = self
            .dir
            .join(format!(".{}.{}.tmp", encode_key(key), FILE_EXTENSION));
        write_synced(&tmp_path, value)?;
        fs::rename(&tmp_path, self.path_for(key))?;
        Ok(())
    }

    fn remove_key(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// One operation of a batch whose new value is already on disk.
struct StagedOp {
    key: String,
    old_value: Option<String>,
    new_value: Option<String>,
    /// Synced temp file holding `new_value`; `None` for removals
    tmp_path: Option<PathBuf>,
}

impl StagedOp {
    fn discard(&self) {
        if let Some(tmp_path) = &self.tmp_path {
            let _ = fs::remove_file(tmp_path);
        }
    }

    fn into_event(self) -> StorageEvent {
        StorageEvent {
            key: self.key,
            old_value: self.old_value,
            new_value: self.new_value,
        }
    }
}

impl DirStorage {
    /// Writes every new value to its own temp file without touching any key.
    fn stage(&self, ops: Vec<StorageOp>) -> Result<Vec<StagedOp>> {
        let mut staged: Vec<StagedOp> = Vec::with_capacity(ops.len());
        // values earlier operations of this batch will have written
        let mut pending: HashMap<String, Option<String>> = HashMap::new();

        for (index, op) in ops.into_iter().enumerate() {
            match self.stage_op(index, op, &pending) {
                Ok(op) => {
                    pending.insert(op.key.clone(), op.new_value.clone());
                    staged.push(op);
                }
                Err(e) => {
                    staged.iter().for_each(StagedOp::discard);
                    return Err(e);
                }
            }
        }
        Ok(staged)
    }

    fn stage_op(
        &self,
        index: usize,
        op: StorageOp,
        pending: &HashMap<String, Option<String>>,
    ) -> Result<StagedOp> {
        let old_value = match pending.get(op.key()) {
            Some(value) => value.clone(),
            None => self.read_key(op.key())?,
        };

        match op {
            StorageOp::Set { key, value } => {
                let tmp_path = self.dir.join(format!(
                    ".{}~{index}.{}.tmp",
                    encode_key(&key),
                    FILE_EXTENSION
                ));
                if let Err(e) = write_synced(&tmp_path, &value) {
                    let _ = fs::remove_file(&tmp_path);
                    return Err(e);
                }
                Ok(StagedOp {
                    key,
                    old_value,
                    new_value: Some(value),
                    tmp_path: Some(tmp_path),
                })
            }
            StorageOp::Remove { key } => Ok(StagedOp {
                key,
                old_value,
                new_value: None,
                tmp_path: None,
            }),
        }
    }

    /// Moves staged values into place, restoring committed keys on failure.
    fn commit(&self, staged: &[StagedOp]) -> Result<()> {
        for (done, op) in staged.iter().enumerate() {
            let committed = match &op.tmp_path {
                Some(tmp_path) => {
                    fs::rename(tmp_path, self.path_for(&op.key)).map_err(GhostError::from)
                }
                None => self.remove_key(&op.key),
            };

            if let Err(e) = committed {
                tracing::warn!(
                    key = %op.key,
                    error = %e,
                    restored = done,
                    "Storage batch failed, rolling back"
                );
                staged[done..].iter().for_each(StagedOp::discard);
                self.roll_back(&staged[..done]);
                return Err(e);
            }
        }
        Ok(())
    }

    fn roll_back(&self, committed: &[StagedOp]) {
        for op in committed.iter().rev() {
            let restored = match &op.old_value {
                Some(value) => self.write_key(&op.key, value),
                None => self.remove_key(&op.key),
            };
            if let Err(e) = restored {
                tracing::error!(
                    key = %op.key,
                    error = %e,
                    "Failed to restore key after failed batch"
                );
            }
        }
    }
}

fn write_synced(path: &Path, value: &str) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(value.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

impl LocalStorage for DirStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _lock = DirLock::shared(&self.dir)?;
        self.read_key(key)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let _lock = DirLock::shared(&self.dir)?;
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            if let Some(stem) = name.strip_suffix(&format!(".{FILE_EXTENSION}")) {
                if let Some(key) = decode_key(stem) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn apply(&self, ops: Vec<StorageOp>) -> Result<()> {
        let staged = {
            let _lock = DirLock::exclusive(&self.dir)?;
            let staged = self.stage(ops)?;
            self.commit(&staged)?;
            staged
        };

        let events: Vec<StorageEvent> = staged.into_iter().map(StagedOp::into_event).collect();
        tracing::debug!(
            dir = %self.dir.display(),
            changes = events.len(),
            "Applied storage batch"
        );
        self.hub.publish(self.origin, events);
        Ok(())
    }

    fn subscribe(&self) -> StorageSubscription {
        self.hub.subscribe(self.origin)
    }
}

/// Keeps `[A-Za-z0-9._-]` and percent-encodes every other byte.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

/// Directory lock guard, released when dropped.
struct DirLock {
    #[allow(dead_code)]
    file: File,
}

impl DirLock {
    fn shared(dir: &Path) -> Result<Self> {
        Self::acquire(dir, false)
    }

    fn exclusive(dir: &Path) -> Result<Self> {
        Self::acquire(dir, true)
    }

    fn acquire(dir: &Path, exclusive: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE_NAME))?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            let locked = if exclusive {
                file.lock_exclusive()
            } else {
                file.lock_shared()
            };
            locked.map_err(|e| GhostError::io(format!("Failed to acquire storage lock: {e}")))?;
        }

        #[cfg(not(unix))]
        {
            // Advisory locking is only wired up on Unix.
            let _ = exclusive;
        }

        Ok(Self { file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_key_encoding() {
        assert_eq!(encode_key("ghostwriter.documents"), "ghostwriter.documents");
        assert_eq!(encode_key("a/b c"), "a%2Fb%20c");
        assert_eq!(decode_key("a%2Fb%20c").as_deref(), Some("a/b c"));
        assert_eq!(decode_key("bad%2"), None);
    }

    #[test]
    fn test_batch_write_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DirStorage::open(temp_dir.path()).unwrap();

        storage
            .apply(vec![StorageOp::set("one", "1"), StorageOp::set("two/2", "2")])
            .unwrap();

        let reopened = DirStorage::open(temp_dir.path()).unwrap();
        assert_eq!(reopened.get("one").unwrap(), Some("1".to_string()));
        assert_eq!(reopened.get("two/2").unwrap(), Some("2".to_string()));
        assert_eq!(reopened.keys().unwrap(), vec!["one".to_string(), "two/2".to_string()]);
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DirStorage::open(temp_dir.path()).unwrap();
        storage.set("k", "v").unwrap();

        assert!(!temp_dir.path().join(".k.json.tmp").exists());
        assert!(temp_dir.path().join("k.json").exists());
    }

    #[test]
    fn test_failed_batch_leaves_storage_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DirStorage::open(temp_dir.path()).unwrap();
        let mut subscription = storage.handle().subscribe();
        storage.set("one", "old").unwrap();
        subscription.try_recv().unwrap();

        // a directory where "two" should live cannot be read or replaced
        fs::create_dir_all(temp_dir.path().join("two.json").join("blocker")).unwrap();

        let result = storage.apply(vec![
            StorageOp::set("one", "new"),
            StorageOp::set("two", "2"),
        ]);

        assert!(result.is_err());
        assert_eq!(storage.get("one").unwrap(), Some("old".to_string()));
        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left: {leftovers:?}");
        assert!(subscription.try_recv().is_none());
    }

    #[test]
    fn test_same_key_twice_in_one_batch() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DirStorage::open(temp_dir.path()).unwrap();
        let mut subscription = storage.handle().subscribe();

        storage
            .apply(vec![StorageOp::set("k", "first"), StorageOp::set("k", "second")])
            .unwrap();

        assert_eq!(storage.get("k").unwrap(), Some("second".to_string()));
        let first = subscription.try_recv().unwrap();
        let second = subscription.try_recv().unwrap();
        assert_eq!(first.old_value, None);
        assert_eq!(second.old_value.as_deref(), Some("first"));
    }

    #[test]
    fn test_remove_missing_key_is_ok() {
        let temp_dir = TempDir::new().unwrap();
        let storage = DirStorage::open(temp_dir.path()).unwrap();
        storage.remove("never-written").unwrap();
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_handles_receive_each_others_events() {
        let temp_dir = TempDir::new().unwrap();
        let window1 = DirStorage::open(temp_dir.path()).unwrap();
        let window2 = window1.handle();
        let mut subscription = window2.subscribe();

        window1.set("k", "v1").unwrap();
        window1.set("k", "v2").unwrap();

        let first = subscription.try_recv().unwrap();
        let second = subscription.try_recv().unwrap();
        assert_eq!(first.new_value.as_deref(), Some("v1"));
        assert_eq!(second.old_value.as_deref(), Some("v1"));
        assert_eq!(second.new_value.as_deref(), Some("v2"));
    }
}
