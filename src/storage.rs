//! Client storage port.
//!
//! Every screen reads and writes transient client state through [`StoragePort`]
//! instead of touching a global store. [`MemoryStorage`] backs tests; [`FileStorage`]
//! backs the CLI so state survives between subcommands.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

/// Well-known storage keys shared by the session store and the screens.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "spotify_token";
    pub const EXPIRES_AT: &str = "spotify_token_expires_at";
    pub const REFRESH_TOKEN: &str = "spotify_refresh_token";
    pub const OAUTH_STATE: &str = "oauth_state";

    pub const PLAYLIST_URL: &str = "playlist_url";
    pub const EMOTIONS: &str = "emotions";
    pub const TOTAL_SONGS: &str = "total_songs";
    pub const EXAMPLE_BATCH: &str = "example_batch";
    pub const CLASSIFICATION_RESULTS: &str = "classification_results";
    pub const SAVED_PLAYLISTS: &str = "saved_playlists";
    pub const SAVE_SKIPPED: &str = "save_skipped";

    /// Keys removed when the user starts over from the success screen.
    pub const RUN_KEYS: [&str; 7] = [
        PLAYLIST_URL,
        EMOTIONS,
        CLASSIFICATION_RESULTS,
        SAVED_PLAYLISTS,
        SAVE_SKIPPED,
        EXAMPLE_BATCH,
        TOTAL_SONGS,
    ];
}

/// Errors raised while opening a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to read storage file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("storage file {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Key/value storage with `get/set/remove` semantics.
///
/// Writes are infallible from the caller's point of view: like browser storage,
/// the in-process view is always updated and persistence is best effort.
pub trait StoragePort: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

impl<T: StoragePort + ?Sized> StoragePort for Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) {
        (**self).remove(key)
    }
}

/// In-memory storage, used by tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StoragePort for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }
}

/// JSON-file backed storage. The whole map is rewritten on every mutation.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or lazily create) the storage file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(StorageError::Read {
                    path: path.clone(),
                    source,
                })
            }
        };
        debug!(path = %path.display(), keys = entries.len(), "opened client storage");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Default location: `<data_local_dir>/moodlist/storage.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|d| d.join("moodlist").join("storage.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let body = serde_json::to_string_pretty(entries)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            write_private(&self.path, body.as_bytes())
        };
        if let Err(e) = write() {
            warn!(path = %self.path.display(), error = %e, "failed to persist client storage");
        }
    }
}

/// The file holds access and refresh tokens, so it stays owner-only.
#[cfg(unix)]
fn write_private(path: &Path, body: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(body)
}

#[cfg(not(unix))]
fn write_private(path: &Path, body: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, body)
}

impl StoragePort for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.remove(key).is_some() {
            self.persist(&entries);
        }
    }
}
