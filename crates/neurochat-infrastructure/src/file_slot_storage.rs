//! File-backed slot storage.
//!
//! One file per slot under a root directory. Writes are atomic (tmp file
//! + fsync + rename) and serialized against other processes with an
//! exclusive lock file, so a reader never observes a half-written slot.

use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use neurochat_core::error::{ChatError, Result};
use neurochat_core::storage::{SlotChange, SlotStorage};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::change_bus::ChangeBus;
use crate::paths::NeurochatPaths;

/// Encodes a slot key into a filesystem-safe file name.
///
/// Every byte outside `[A-Za-z0-9._-]` is percent-escaped, so arbitrary
/// user identifiers (emails and the like) map to distinct file names
/// without collisions.
pub fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// A slot store over a directory of files.
///
/// Handles over the same root that share a [`ChangeBus`] observe each
/// other's writes, which is how two "tabs" of the same origin are
/// modeled. Every handle stamps its changes with its own origin id so
/// consumers can skip self-notifications.
pub struct FileSlotStorage {
    root: PathBuf,
    bus: ChangeBus,
    origin: Uuid,
}

impl FileSlotStorage {
    /// Opens (and creates if missing) a slot store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>, bus: ChangeBus) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            bus,
            origin: Uuid::new_v4(),
        })
    }

    /// Opens the store at the default location (`~/.config/neurochat/slots`).
    pub async fn default_location(bus: ChangeBus) -> Result<Self> {
        let root = NeurochatPaths::slots_dir()
            .map_err(|e| ChatError::io(format!("Failed to resolve slots directory: {}", e)))?;
        Self::open(root, bus).await
    }

    /// Returns the root directory slot files live under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.root.join(encode_key(key))
    }
}

#[async_trait]
impl SlotStorage for FileSlotStorage {
    fn origin(&self) -> Uuid {
        self.origin
    }

    async fn read(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.slot_path(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        let path = self.slot_path(key);
        let content = value.to_string();
        tokio::task::spawn_blocking(move || atomic_write(&path, &content))
            .await
            .map_err(|e| ChatError::io(format!("Failed to join write task: {}", e)))??;
        debug!("Wrote slot '{}'", key);

        self.bus.publish(SlotChange {
            key: key.to_string(),
            new_value: Some(value.to_string()),
            origin: self.origin,
        });
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.slot_path(key)).await {
            Ok(()) => debug!("Removed slot '{}'", key),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.bus.publish(SlotChange {
            key: key.to_string(),
            new_value: None,
            origin: self.origin,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SlotChange> {
        self.bus.subscribe()
    }
}

/// Writes a slot file atomically: exclusive lock, tmp file, fsync, rename.
fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let _lock = SlotLock::acquire(path)?;

    let tmp_path = sibling_path(path, "tmp")?;
    let mut tmp_file = File::create(&tmp_path)?;
    tmp_file.write_all(content.as_bytes())?;
    tmp_file.sync_all()?;
    drop(tmp_file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Builds a hidden sibling path (`.{name}.{suffix}`) next to a slot file.
fn sibling_path(path: &Path, suffix: &str) -> Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| ChatError::io("Slot path has no parent directory"))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| ChatError::io("Slot path has no file name"))?;
    Ok(parent.join(format!(".{}.{}", file_name.to_string_lossy(), suffix)))
}

/// An exclusive lock guard for one slot file, released on drop.
struct SlotLock {
    #[allow(dead_code)]
    file: File,
    lock_path: PathBuf,
}

impl SlotLock {
    fn acquire(path: &Path) -> Result<Self> {
        let lock_path = sibling_path(path, "lock")?;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()
                .map_err(|e| ChatError::io(format!("Failed to acquire slot lock: {}", e)))?;
        }

        Ok(SlotLock { file, lock_path })
    }
}

impl Drop for SlotLock {
    fn drop(&mut self) {
        // Unlock is automatic when the file handle is dropped.
        let _ = fs::remove_file(&self.lock_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_storage(dir: &TempDir) -> FileSlotStorage {
        FileSlotStorage::open(dir.path(), ChangeBus::new())
            .await
            .unwrap()
    }

    #[test]
    fn test_encode_key_passes_safe_chars() {
        assert_eq!(encode_key("sessions_user-1.v2"), "sessions_user-1.v2");
    }

    #[test]
    fn test_encode_key_escapes_unsafe_chars() {
        assert_eq!(encode_key("sessions_a@x.com"), "sessions_a%40x.com");
        assert_eq!(encode_key("a/b c"), "a%2Fb%20c");
    }

    #[test]
    fn test_encode_key_is_injective_for_percent() {
        assert_ne!(encode_key("a%40"), encode_key("a@"));
    }

    #[tokio::test]
    async fn test_read_missing_slot_returns_none() {
        let dir = TempDir::new().unwrap();
        let storage = open_storage(&dir).await;
        assert_eq!(storage.read("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let storage = open_storage(&dir).await;
        storage.write("currentUser", "{\"email\":\"a@x.com\"}").await.unwrap();
        assert_eq!(
            storage.read("currentUser").await.unwrap(),
            Some("{\"email\":\"a@x.com\"}".to_string())
        );
    }

    #[tokio::test]
    async fn test_write_replaces_previous_value() {
        let dir = TempDir::new().unwrap();
        let storage = open_storage(&dir).await;
        storage.write("k", "one").await.unwrap();
        storage.write("k", "two").await.unwrap();
        assert_eq!(storage.read("k").await.unwrap(), Some("two".to_string()));
    }

    #[tokio::test]
    async fn test_remove_deletes_slot_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let storage = open_storage(&dir).await;
        storage.write("k", "v").await.unwrap();
        storage.remove("k").await.unwrap();
        assert_eq!(storage.read("k").await.unwrap(), None);
        storage.remove("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_write_leaves_no_tmp_or_lock_files() {
        let dir = TempDir::new().unwrap();
        let storage = open_storage(&dir).await;
        storage.write("k", "v").await.unwrap();
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["k".to_string()]);
    }

    #[tokio::test]
    async fn test_changes_are_published_with_origin() {
        let dir = TempDir::new().unwrap();
        let storage = open_storage(&dir).await;
        let mut rx = storage.subscribe();

        storage.write("k", "v").await.unwrap();
        let change = rx.recv().await.unwrap();
        assert_eq!(change.key, "k");
        assert_eq!(change.new_value, Some("v".to_string()));
        assert_eq!(change.origin, storage.origin());

        storage.remove("k").await.unwrap();
        let change = rx.recv().await.unwrap();
        assert_eq!(change.new_value, None);
    }

    #[tokio::test]
    async fn test_two_handles_share_slots_and_bus() {
        let dir = TempDir::new().unwrap();
        let bus = ChangeBus::new();
        let tab_a = FileSlotStorage::open(dir.path(), bus.clone()).await.unwrap();
        let tab_b = FileSlotStorage::open(dir.path(), bus).await.unwrap();

        let mut rx_b = tab_b.subscribe();
        tab_a.write("k", "from-a").await.unwrap();

        assert_eq!(tab_b.read("k").await.unwrap(), Some("from-a".to_string()));
        let change = rx_b.recv().await.unwrap();
        assert_eq!(change.origin, tab_a.origin());
        assert_ne!(change.origin, tab_b.origin());
    }
}
