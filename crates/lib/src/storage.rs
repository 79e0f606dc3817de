//! Durable key-value storage for client state (the session identifier).
//!
//! `FileStore` keeps a flat JSON object on disk, e.g. `~/.docent/storage.json`.
//! `MemoryStore` is the in-process variant used for ephemeral profiles and tests.

use fs2::FileExt;
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is not a JSON object of strings: {0}")]
    Json(#[from] serde_json::Error),
}

/// String key-value store. Implementations must be safe to share across threads.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-memory store; contents are lost when dropped.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(g.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        g.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON-file store. Every `set` rewrites the whole file under an exclusive lock,
/// so two processes sharing a profile do not interleave writes.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(file: &mut std::fs::File) -> Result<BTreeMap<String, String>, StorageError> {
        let mut s = String::new();
        file.read_to_string(&mut s)?;
        if s.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&s)?)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        file.lock_shared()?;
        let map = Self::read_map(&mut file);
        let _ = file.unlock();
        Ok(map?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        file.lock_exclusive()?;
        let result = (|| -> Result<(), StorageError> {
            let mut map = Self::read_map(&mut file)?;
            map.insert(key.to_string(), value.to_string());
            let s = serde_json::to_string_pretty(&map)?;
            file.seek(SeekFrom::Start(0))?;
            file.set_len(0)?;
            file.write_all(s.as_bytes())?;
            file.sync_all()?;
            Ok(())
        })();
        let _ = file.unlock();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("docent-storage-test-{}", uuid::Uuid::new_v4()))
            .join("storage.json")
    }

    #[test]
    fn memory_store_get_set() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn file_store_missing_file_reads_none() {
        let store = FileStore::new(temp_store_path());
        assert_eq!(store.get("session_id").unwrap(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn file_store_persists_across_instances() {
        let path = temp_store_path();
        FileStore::new(&path).set("session_id", "abc").unwrap();
        FileStore::new(&path).set("other", "x").unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("session_id").unwrap().as_deref(), Some("abc"));
        assert_eq!(reopened.get("other").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn file_store_overwrite_shrinks_file() {
        let path = temp_store_path();
        let store = FileStore::new(&path);
        store.set("k", "a-rather-long-value").unwrap();
        store.set("k", "b").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("b"));
        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: BTreeMap<String, String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn file_store_rejects_garbage() {
        let path = temp_store_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            FileStore::new(&path).get("k"),
            Err(StorageError::Json(_))
        ));
    }
}
