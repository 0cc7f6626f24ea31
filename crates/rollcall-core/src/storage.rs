//! Durable key-value persistence for attendance data.
//!
//! The attendance log and the user profile are persisted as whole
//! serialized values under well-known string keys. The [`KeyValueStore`]
//! trait is the collaborator contract; [`FileStore`] is the on-disk
//! implementation and [`MemoryStore`] backs embeddings that need no
//! durability (and tests).

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Store key holding the serialized attendance log.
pub const EVENT_LOG_KEY: &str = "attendance_log";

/// Store key holding the serialized user profile.
pub const USER_PROFILE_KEY: &str = "user_profile";

/// Failure modes of a [`KeyValueStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A stored value could not be read.
    #[error("could not read key '{key}': {source}")]
    Read {
        /// The key being read.
        key: String,
        /// The underlying I/O failure.
        source: io::Error,
    },

    /// A value could not be written or removed.
    #[error("could not write key '{key}': {source}")]
    Write {
        /// The key being written.
        key: String,
        /// The underlying I/O failure.
        source: io::Error,
    },
}

/// Durable string-keyed storage.
///
/// Operations are suspension points; callers must not assume they
/// complete synchronously. A missing key reads as `Ok(None)` and
/// removing a missing key succeeds.
pub trait KeyValueStore {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove the value stored under `key`.
    async fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// File-backed store keeping one file per key under a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `data_dir`.
    #[must_use]
    pub const fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// The store at the platform's default data location, or `None` when
    /// no home directory can be determined.
    #[must_use]
    pub fn default_location() -> Option<Self> {
        let dirs = directories::ProjectDirs::from("", "", "rollcall")?;
        Some(Self::new(dirs.data_dir().to_path_buf()))
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|source| StoreError::Read {
                key: key.to_string(),
                source,
            })
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.key_path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                key: key.to_string(),
                source,
            })?;
        }
        std::fs::write(&path, value).map_err(|source| StoreError::Write {
            key: key.to_string(),
            source,
        })
    }

    async fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let path = self.key_path(key);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|source| StoreError::Write {
                key: key.to_string(),
                source,
            })?;
        }
        Ok(())
    }
}

/// In-memory store for embeddings without durable storage and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}
