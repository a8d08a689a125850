//! In-memory secret store

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::SecretStore;
use crate::error::{Result, StorageError};

/// Mutex-guarded map. Nothing survives the process.
#[derive(Default)]
pub struct MemorySecretStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SecretStore for MemorySecretStore {
    fn save(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_vec());
        debug!(key, "saved secret");
        Ok(())
    }

    fn load(&self, key: &str) -> Option<Vec<u8>> {
        let entries = self.entries.lock().ok()?;
        entries.get(key).cloned()
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".into()))?;
        if entries.remove(key).is_some() {
            debug!(key, "deleted secret");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_replaces_existing_value() {
        let store = MemorySecretStore::new();
        store.save("provider.access_token", b"at_1").unwrap();
        store.save("provider.access_token", b"at_2").unwrap();
        assert_eq!(store.load("provider.access_token").unwrap(), b"at_2");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_missing_key_is_ok() {
        let store = MemorySecretStore::new();
        store.delete("never-written").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn load_string_rejects_invalid_utf8() {
        let store = MemorySecretStore::new();
        store.save("blob", &[0xff, 0xfe]).unwrap();
        assert!(store.load("blob").is_some());
        assert!(store.load_string("blob").is_none());
    }

    #[test]
    fn contains_tracks_presence() {
        let store = MemorySecretStore::new();
        assert!(!store.contains("k"));
        store.save("k", b"v").unwrap();
        assert!(store.contains("k"));
        store.delete("k").unwrap();
        assert!(!store.contains("k"));
    }
}
