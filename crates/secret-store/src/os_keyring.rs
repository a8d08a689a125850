//! OS keychain secret store
//!
//! Uses the platform credential store via `keyring`:
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service
//!
//! Each key becomes one keyring entry under the configured service name.

use ::keyring::Entry;
use tracing::{debug, warn};

use crate::SecretStore;
use crate::error::{Result, StorageError};

/// Keyring-backed secret store.
pub struct KeyringSecretStore {
    service_name: String,
}

impl KeyringSecretStore {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service_name, key).map_err(map_keyring_error)
    }
}

fn map_keyring_error(e: ::keyring::Error) -> StorageError {
    StorageError::Backend(format!("keyring error: {e}"))
}

impl SecretStore for KeyringSecretStore {
    fn save(&self, key: &str, value: &[u8]) -> Result<()> {
        // set_secret overwrites an existing entry, which gives upsert semantics
        self.entry(key)?
            .set_secret(value)
            .map_err(map_keyring_error)?;
        debug!(key, "saved secret in keyring");
        Ok(())
    }

    fn load(&self, key: &str) -> Option<Vec<u8>> {
        let entry = match self.entry(key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "keyring entry unavailable");
                return None;
            }
        };
        match entry.get_secret() {
            Ok(bytes) => Some(bytes),
            Err(::keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(key, error = %e, "keyring read failed");
                None
            }
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => {
                debug!(key, "deleted secret from keyring");
                Ok(())
            }
            Err(::keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(map_keyring_error(e)),
        }
    }
}
