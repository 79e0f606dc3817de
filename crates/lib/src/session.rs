//! Durable per-profile session identifier.
//!
//! The identifier is read from a [`KeyValueStore`] under [`SESSION_KEY`] and created
//! (UUID v4) on first use. It is sent with every question so the backend can keep
//! per-user conversation state.

use crate::storage::KeyValueStore;

/// Storage key holding the session identifier.
pub const SESSION_KEY: &str = "session_id";

/// Unique session identifier (opaque string).
pub type SessionId = String;

/// The resolved identifier and whether it is backed by storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    id: SessionId,
    persisted: bool,
}

impl SessionIdentity {
    /// Read the identifier from `store`, creating and persisting a new one if absent.
    /// Never writes when a value already exists. On storage failure, logs a warning and
    /// returns an ephemeral identifier that lives only as long as this value.
    pub fn resolve(store: &dyn KeyValueStore) -> Self {
        match store.get(SESSION_KEY) {
            Ok(Some(id)) if !id.trim().is_empty() => {
                return Self {
                    id,
                    persisted: true,
                }
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("session store unreadable, using ephemeral session id: {}", e);
                return Self::ephemeral();
            }
        }
        let id = new_session_id();
        match store.set(SESSION_KEY, &id) {
            Ok(()) => {
                log::info!("created session {}", id);
                Self {
                    id,
                    persisted: true,
                }
            }
            Err(e) => {
                log::warn!("could not persist session id, using it ephemerally: {}", e);
                Self {
                    id,
                    persisted: false,
                }
            }
        }
    }

    /// An identifier that is never written anywhere.
    pub fn ephemeral() -> Self {
        Self {
            id: new_session_id(),
            persisted: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }
}

fn new_session_id() -> SessionId {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StorageError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Memory store that counts writes.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        sets: AtomicUsize,
    }

    impl KeyValueStore for CountingStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.sets.fetch_add(1, Ordering::SeqCst);
            self.inner.set(key, value)
        }
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into())
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into())
        }
    }

    #[test]
    fn creates_and_persists_on_first_use() {
        let store = CountingStore::default();
        let identity = SessionIdentity::resolve(&store);
        assert!(identity.is_persisted());
        assert!(uuid::Uuid::parse_str(identity.id()).is_ok());
        assert_eq!(store.get(SESSION_KEY).unwrap().as_deref(), Some(identity.id()));
        assert_eq!(store.sets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn resolving_twice_returns_same_id_without_writing() {
        let store = CountingStore::default();
        let first = SessionIdentity::resolve(&store);
        let second = SessionIdentity::resolve(&store);
        assert_eq!(first.id(), second.id());
        assert_eq!(store.sets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn existing_value_is_reused_untouched() {
        let store = CountingStore::default();
        store.inner.set(SESSION_KEY, "kept-id").unwrap();
        let identity = SessionIdentity::resolve(&store);
        assert_eq!(identity.id(), "kept-id");
        assert_eq!(store.sets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn broken_storage_falls_back_to_ephemeral() {
        let identity = SessionIdentity::resolve(&BrokenStore);
        assert!(!identity.is_persisted());
        assert!(!identity.id().is_empty());
    }
}
