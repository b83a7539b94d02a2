//! File-backed blob storage: one file per namespace/key.
//!
//! Layout under the configured root directory:
//!
//! ```text
//! <root>/<namespace>/<key>.bin
//! ```
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! write that dies half-way leaves the previous committed file readable on
//! the next load – the property the credential store's all-or-nothing
//! contract depends on.  The rename is this backend's commit point;
//! `commit()` itself has nothing left to do.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::application::credential_store::{KvStore, StorageError};

/// Blob store over a directory of files.
pub struct FileKvStore {
    root: PathBuf,
}

impl FileKvStore {
    /// Creates a store rooted at `root`.  The directory is created lazily on
    /// the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Convenience constructor returning an `Arc` ready for sharing.
    pub fn shared(root: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self::new(root))
    }

    fn blob_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.root.join(namespace).join(format!("{key}.bin"))
    }

    fn io_error(namespace: &str, key: &str, source: std::io::Error) -> StorageError {
        StorageError::Io {
            namespace: namespace.to_string(),
            key: key.to_string(),
            source,
        }
    }
}

impl KvStore for FileKvStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.blob_path(namespace, key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                namespace: namespace.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(Self::io_error(namespace, key, e)),
        }
    }

    fn set(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.blob_path(namespace, key);
        let dir = path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| Self::io_error(namespace, key, e))?;

        let tmp = dir.join(format!(".{key}.tmp"));
        std::fs::write(&tmp, value).map_err(|e| Self::io_error(namespace, key, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| Self::io_error(namespace, key, e))?;

        debug!(namespace, key, bytes = value.len(), "blob written");
        Ok(())
    }

    fn commit(&self) -> Result<(), StorageError> {
        // The atomic rename in `set` already made the write durable.
        Ok(())
    }

    fn erase_key(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let path = self.blob_path(namespace, key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            // Erasing an absent key is not an error.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(namespace, key, e)),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
