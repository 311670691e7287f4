//! Key/value persistence for the stores.
//!
//! Mirrors the browser's `localStorage`: string keys, string values,
//! synchronous access. [`MemoryStorage`] lives for the process;
//! [`FileStorage`] keeps the map in a JSON file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::{PartyClientError, Result};

/// Key of the persisted session record.
pub const USER_KEY: &str = "user";

/// Key of the persisted "player is in a game" flag (`"1"` / `"0"`).
pub const IN_GAME_KEY: &str = "isPlayerInGame";

/// String key/value store shared by the session and game stores.
pub trait Storage: Send + Sync {
    /// Value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Storage handle shared between stores.
pub type SharedStorage = Arc<dyn Storage>;

type Entries = BTreeMap<String, String>;

fn lock(entries: &Mutex<Entries>) -> MutexGuard<'_, Entries> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── MemoryStorage ───────────────────────────────────────────────────

/// In-process storage. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<Entries>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new empty storage behind a [`SharedStorage`] handle.
    pub fn shared() -> SharedStorage {
        Arc::new(Self::new())
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

// ── FileStorage ─────────────────────────────────────────────────────

/// Storage persisted as a flat JSON object in a single file.
///
/// The whole map is rewritten on every change, through a temporary file
/// that is renamed over the original.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl FileStorage {
    /// Open the storage file at `path`.
    ///
    /// A missing file starts empty. A file that is not a JSON object of
    /// strings is ignored (and overwritten on the next change).
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str::<Entries>(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), "discarding unreadable storage file: {e}");
                Entries::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Entries::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), keys = entries.len(), "storage opened");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &Entries) -> Result<()> {
        let text = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, text)
            .and_then(|()| std::fs::rename(&tmp, &self.path))
            .map_err(|e| {
                PartyClientError::Storage(format!("writing {}: {e}", self.path.display()))
            })
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.flush(&entries)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("party-game-client-{}-{name}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn memory_storage_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get(USER_KEY), None);
        storage.set(USER_KEY, "{}").unwrap();
        assert_eq!(storage.get(USER_KEY).as_deref(), Some("{}"));
        storage.remove(USER_KEY).unwrap();
        storage.remove(USER_KEY).unwrap();
        assert_eq!(storage.get(USER_KEY), None);
    }

    #[test]
    fn file_storage_survives_reopen() {
        let path = temp_path("reopen");
        {
            let storage = FileStorage::open(&path).unwrap();
            storage.set(IN_GAME_KEY, "1").unwrap();
            storage.set(USER_KEY, r#"{"user_id":"u1"}"#).unwrap();
            storage.remove(USER_KEY).unwrap();
        }
        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get(IN_GAME_KEY).as_deref(), Some("1"));
        assert_eq!(reopened.get(USER_KEY), None);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn file_storage_ignores_corrupt_file() {
        let path = temp_path("corrupt");
        std::fs::write(&path, "not json").unwrap();
        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.get(USER_KEY), None);
        storage.set(USER_KEY, "x").unwrap();
        assert_eq!(FileStorage::open(&path).unwrap().get(USER_KEY).as_deref(), Some("x"));
        let _ = std::fs::remove_file(&path);
    }
}
