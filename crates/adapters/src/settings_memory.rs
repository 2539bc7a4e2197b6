//! In-memory settings store for testing and ephemeral runs

use std::collections::HashMap;
use std::sync::RwLock;
use whiff_domain::{SettingsStore, StorageError};

/// In-memory settings store implementation
pub struct InMemorySettingsStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Store seeded with `bytes` under `key`
    pub fn with_blob(key: &str, bytes: impl Into<Vec<u8>>) -> Self {
        let store = Self::new();
        if let Ok(mut blobs) = store.blobs.write() {
            blobs.insert(key.to_string(), bytes.into());
        }
        store
    }
}

impl Default for InMemorySettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn read_blob(&self, key: &str) -> Option<Vec<u8>> {
        let blobs = self.blobs.read().ok()?;
        blobs.get(key).cloned()
    }

    fn write_blob(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        blobs.insert(key.to_string(), bytes);
        Ok(())
    }
}
