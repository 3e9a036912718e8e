//! Visitor-scoped key/value persistence for small JSON blobs.
//!
//! Every operation is best effort: a missing or failing backend is logged and
//! otherwise ignored, and an unreadable value is reported as absent. The store
//! never expires entries itself; the session timer decides when selections go
//! stale. The in-memory backend is bounded and drops idle or surplus entries.

use cached::{Cached, TimedSizedCache};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs, io,
    path::PathBuf,
    sync::{Arc, Mutex},
};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage backend is unavailable")]
    Unavailable,

    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// Raw string storage. Keys arrive already scoped to a visitor.
pub trait StorageBackend: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

pub const DEFAULT_MEMORY_CAPACITY: usize = 50_000;
pub const DEFAULT_MEMORY_TTL_SECS: u64 = 7200;

/// Process-wide storage for every visitor. Holds at most `capacity` entries,
/// evicting the least recently used first, and forgets an entry `ttl_secs`
/// after it was last written.
pub struct MemoryStorage {
    items: Mutex<TimedSizedCache<String, String>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::with_limits(DEFAULT_MEMORY_CAPACITY, DEFAULT_MEMORY_TTL_SECS)
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(capacity: usize, ttl_secs: u64) -> Self {
        Self {
            items: Mutex::new(TimedSizedCache::with_size_and_lifespan(capacity.max(1), ttl_secs)),
        }
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(items.cache_get(&key.to_string()).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.cache_set(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.cache_remove(&key.to_string());
        Ok(())
    }
}

/// One file per key under `root`. Key characters outside `[A-Za-z0-9_-]` are
/// replaced so a scoped key always maps to a single file name.
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{file_name}.json"))
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Stands in for an execution context without any storage at all.
pub struct UnavailableStorage;

impl StorageBackend for UnavailableStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable)
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }

    fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }
}

/// A visitor's view of the shared storage backend.
#[derive(Clone)]
pub struct PersistenceStore {
    backend: Arc<dyn StorageBackend>,
    scope: String,
}

impl PersistenceStore {
    pub fn new(backend: Arc<dyn StorageBackend>, scope: impl Into<String>) -> Self {
        Self { backend, scope: scope.into() }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}:{}", self.scope, key)
    }

    /// Serializes `value` and stores it. Returns whether the write happened;
    /// callers must not depend on it.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(scope = %self.scope, key, error = %e, "Failed to serialize value for storage");
                return false;
            }
        };
        match self.backend.set_item(&self.scoped(key), &json) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(scope = %self.scope, key, error = %e, "Error saving to storage");
                false
            }
        }
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get_item(&self.scoped(key)) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(scope = %self.scope, key, error = %e, "Error reading from storage");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(scope = %self.scope, key, error = %e, "Stored value is corrupt, treating as absent");
                None
            }
        }
    }

    pub fn clear<S: AsRef<str>>(&self, keys: &[S]) {
        for key in keys {
            let key = key.as_ref();
            if let Err(e) = self.backend.remove_item(&self.scoped(key)) {
                tracing::warn!(scope = %self.scope, key, error = %e, "Error clearing storage");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Pick {
        hotel_code: String,
        rooms: u32,
    }

    fn memory_store(scope: &str) -> PersistenceStore {
        PersistenceStore::new(Arc::new(MemoryStorage::new()), scope)
    }

    #[test]
    fn load_after_clear_is_absent() {
        let store = memory_store("visitor-1");
        let pick = Pick { hotel_code: "H1".into(), rooms: 2 };
        assert!(store.save("pick", &pick));
        assert!(store.save("start", &1_700_000_000_i64));
        assert_eq!(store.load::<Pick>("pick"), Some(pick));

        store.clear(&["pick", "start"]);
        assert_eq!(store.load::<Pick>("pick"), None);
        assert_eq!(store.load::<i64>("start"), None);
    }

    #[test]
    fn never_saved_key_is_absent() {
        let store = memory_store("visitor-1");
        assert_eq!(store.load::<Pick>("missing"), None);
        // clearing something that was never there is fine too
        store.clear(&["missing"]);
    }

    #[test]
    fn corrupt_value_reads_as_absent() {
        let backend = Arc::new(MemoryStorage::new());
        backend.set_item("v:pick", "{not json").unwrap();
        let store = PersistenceStore::new(backend, "v");
        assert_eq!(store.load::<Pick>("pick"), None);
    }

    #[test]
    fn scopes_do_not_leak_between_visitors() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
        let alice = PersistenceStore::new(backend.clone(), "alice");
        let bob = PersistenceStore::new(backend, "bob");
        alice.save("start", &10_i64);
        assert_eq!(bob.load::<i64>("start"), None);
        assert_eq!(alice.load::<i64>("start"), Some(10));
    }

    #[test]
    fn unavailable_backend_is_silent() {
        let store = PersistenceStore::new(Arc::new(UnavailableStorage), "v");
        assert!(!store.save("start", &10_i64));
        assert_eq!(store.load::<i64>("start"), None);
        store.clear(&["start"]);
    }

    #[test]
    fn file_backend_round_trips_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistenceStore::new(Arc::new(FileStorage::new(dir.path()).unwrap()), "visitor/../x");
        let pick = Pick { hotel_code: "H9".into(), rooms: 1 };
        assert!(store.save("pick", &pick));
        assert_eq!(store.load::<Pick>("pick"), Some(pick));
        store.clear(&["pick"]);
        assert_eq!(store.load::<Pick>("pick"), None);
        // the odd scope must not escape the storage directory
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn memory_backend_drops_the_least_recent_visitor_when_full() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::with_limits(2, 3600));
        let first = PersistenceStore::new(backend.clone(), "first");
        let second = PersistenceStore::new(backend.clone(), "second");
        let third = PersistenceStore::new(backend, "third");
        first.save("start", &1_i64);
        second.save("start", &2_i64);
        third.save("start", &3_i64);

        assert_eq!(first.load::<i64>("start"), None);
        assert_eq!(second.load::<i64>("start"), Some(2));
        assert_eq!(third.load::<i64>("start"), Some(3));
    }

    #[test]
    fn memory_backend_forgets_idle_entries() {
        let store = PersistenceStore::new(Arc::new(MemoryStorage::with_limits(16, 1)), "abandoned");
        assert!(store.save("start", &10_i64));
        assert_eq!(store.load::<i64>("start"), Some(10));

        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert_eq!(store.load::<i64>("start"), None);
    }
}
