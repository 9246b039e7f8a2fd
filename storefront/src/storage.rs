//! Durable client storage.
//!
//! A string blob per fixed key, nothing more. No schema versioning: readers
//! must treat a malformed blob as absent.

use crate::error::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Get/set/remove of serialized blobs by key
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Read the blob stored under `key`
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backing store cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous blob
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backing store cannot be written.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete the blob under `key`; absent keys are not an error
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backing store cannot be written.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// One JSON file per key under a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `dir` (created on first write)
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the blobs
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

fn io_error(key: &str, source: std::io::Error) -> StorageError {
    StorageError::Io {
        key: key.to_string(),
        source,
    }
}

#[async_trait]
impl ClientStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.path(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(io_error(key, error)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(key, e))?;

        // Write-then-rename so a crash never leaves a truncated blob.
        let staging = self.dir.join(format!("{key}.json.tmp"));
        tokio::fs::write(&staging, value)
            .await
            .map_err(|e| io_error(key, e))?;
        tokio::fs::rename(&staging, self.path(key))
            .await
            .map_err(|e| io_error(key, e))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(io_error(key, error)),
        }
    }
}

/// Process-local storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Empty storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with one blob
    #[must_use]
    pub fn with_blob(key: &str, value: impl Into<String>) -> Self {
        let storage = Self::new();
        storage.blobs().insert(key.to_string(), value.into());
        storage
    }

    /// Current blob under `key`, read synchronously
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.blobs().get(key).cloned()
    }

    fn blobs(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ClientStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.blobs().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.blobs().remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));

        assert_eq!(storage.get("cart").await.unwrap(), None);

        storage.set("cart", "[1,2]").await.unwrap();
        assert_eq!(storage.get("cart").await.unwrap().as_deref(), Some("[1,2]"));

        storage.set("cart", "[]").await.unwrap();
        assert_eq!(storage.get("cart").await.unwrap().as_deref(), Some("[]"));

        storage.remove("cart").await.unwrap();
        assert_eq!(storage.get("cart").await.unwrap(), None);

        // Removing twice is fine
        storage.remove("cart").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryStorage::with_blob("cart", "x");
        assert_eq!(storage.get("cart").await.unwrap().as_deref(), Some("x"));

        storage.remove("cart").await.unwrap();
        assert_eq!(storage.peek("cart"), None);
    }
}
