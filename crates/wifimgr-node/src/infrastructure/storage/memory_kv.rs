//! In-memory blob storage for tests and the headless demo run.
//!
//! Besides the [`KvStore`] operations it exposes `raw`/`insert_raw`, which
//! tests use to inspect exactly what would land on flash and to plant
//! corrupted records without going through the encoder.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::application::credential_store::{KvStore, StorageError};

/// Blob store over a mutex-guarded map, keyed by (namespace, key).
#[derive(Default)]
pub struct MemoryKvStore {
    map: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the stored bytes, if any.
    pub fn raw(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        self.map
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
    }

    /// Plants bytes directly, bypassing any encoding.
    pub fn insert_raw(&self, namespace: &str, key: &str, value: Vec<u8>) {
        self.map
            .lock()
            .unwrap()
            .insert((namespace.to_string(), key.to_string()), value);
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.raw(namespace, key).ok_or_else(|| StorageError::NotFound {
            namespace: namespace.to_string(),
            key: key.to_string(),
        })
    }

    fn set(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.insert_raw(namespace, key, value.to_vec());
        Ok(())
    }

    fn commit(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn erase_key(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.map
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }
}
