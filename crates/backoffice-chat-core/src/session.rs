//! Client-side session correlator
//!
//! The correlator groups a user's exchanges on the backend. It is generated
//! once, written to durable key-value storage, and reused across restarts
//! until [`SessionStore::reset`] replaces it.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ChatResult;
use crate::state::{random_base36, to_base36};

/// Storage key under which the correlator is kept
pub const SESSION_KEY: &str = "sessionId";

/// Durable string key-value storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> ChatResult<()>;
    fn remove(&self, key: &str) -> ChatResult<()>;
}

/// Key-value pairs kept as one JSON object on disk
pub struct FileKeyValueStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileKeyValueStore {
    pub fn open(path: &Path) -> ChatResult<Self> {
        let entries = if path.exists() {
            let content = fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    /// `{data_dir}/backoffice-chat/session.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("backoffice-chat").join("session.json"))
    }

    fn flush(&self, entries: &HashMap<String, String>) -> ChatResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> ChatResult<()> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> ChatResult<()> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// Non-durable storage for tests and hosts without a writable disk
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> ChatResult<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> ChatResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    current: Mutex<String>,
}

impl SessionStore {
    /// Reuse the stored correlator, or generate and persist a new one
    pub fn load_or_create(storage: Arc<dyn KeyValueStore>) -> Self {
        let current = match storage.get(SESSION_KEY).filter(|id| !id.is_empty()) {
            Some(id) => {
                debug!(session_id = %id, "reusing stored session");
                id
            }
            None => {
                let id = generate_session_id();
                persist(storage.as_ref(), &id);
                id
            }
        };

        Self {
            storage,
            current: Mutex::new(current),
        }
    }

    pub fn in_memory() -> Self {
        Self::load_or_create(Arc::new(MemoryKeyValueStore::default()))
    }

    pub fn current_id(&self) -> String {
        self.current.lock().clone()
    }

    /// Replace the correlator with a fresh one and persist it
    pub fn reset(&self) -> String {
        let id = generate_session_id();
        persist(self.storage.as_ref(), &id);
        *self.current.lock() = id.clone();
        id
    }
}

fn persist(storage: &dyn KeyValueStore, id: &str) {
    // A session that cannot be stored still works for this run
    if let Err(e) = storage.set(SESSION_KEY, id) {
        warn!(error = %e, "failed to persist session id");
    }
}

/// `session_{millis base36}_{8 random base36 chars}`
pub fn generate_session_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    format!("session_{}_{}", to_base36(millis), random_base36(8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_session_id_format() {
        let id = generate_session_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert_eq!(parts[2].len(), 8);
        assert!(parts[1]
            .chars()
            .chain(parts[2].chars())
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_session_reused_from_storage() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::default());
        storage.set(SESSION_KEY, "session_abc_12345678").unwrap();

        let store = SessionStore::load_or_create(storage);
        assert_eq!(store.current_id(), "session_abc_12345678");
    }

    #[test]
    fn test_session_survives_restart_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");

        let first = SessionStore::load_or_create(Arc::new(FileKeyValueStore::open(&path).unwrap()));
        let id = first.current_id();
        drop(first);

        let second =
            SessionStore::load_or_create(Arc::new(FileKeyValueStore::open(&path).unwrap()));
        assert_eq!(second.current_id(), id);
    }

    #[test]
    fn test_reset_generates_and_persists_new_id() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::default());
        let store = SessionStore::load_or_create(storage.clone());
        let old = store.current_id();

        let new = store.reset();
        assert_ne!(old, new);
        assert_eq!(storage.get(SESSION_KEY), Some(new));
    }

    #[test]
    fn test_file_store_remove() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kv.json");
        let store = FileKeyValueStore::open(&path).unwrap();
        store.set("a", "1").unwrap();
        store.remove("a").unwrap();

        let reopened = FileKeyValueStore::open(&path).unwrap();
        assert_eq!(reopened.get("a"), None);
    }
}
