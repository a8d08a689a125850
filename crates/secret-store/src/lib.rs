//! Key-addressed secret persistence
//!
//! The login coordinator keeps provider tokens, the token expiry record, the
//! in-flight PKCE verifier and the federated session behind the `SecretStore`
//! trait. Operations are synchronous: they never suspend, and every backend
//! serializes access internally so concurrent writers cannot corrupt state.
//!
//! Backends:
//! - [`MemorySecretStore`] for tests and ephemeral sessions
//! - [`FileSecretStore`] for a 0600 JSON document written atomically
//! - `KeyringSecretStore` (feature `keyring`) for the OS keychain

pub mod error;
pub mod file;
#[cfg(feature = "keyring")]
pub mod os_keyring;
pub mod memory;
pub mod persisted;

pub use error::{Result, StorageError};
pub use file::FileSecretStore;
#[cfg(feature = "keyring")]
pub use os_keyring::KeyringSecretStore;
pub use memory::MemorySecretStore;
pub use persisted::Persisted;

/// Secure, key-addressed storage for opaque secret blobs.
///
/// Contract:
/// - `save` is an atomic upsert: an existing value is replaced, never rejected.
/// - `load` returns `None` when the key is absent. Backend failures are logged
///   and also reported as absent; callers treat "unreadable" like "missing".
/// - `delete` of a missing key succeeds.
pub trait SecretStore: Send + Sync {
    /// Insert or replace the value stored under `key`.
    fn save(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Read the value stored under `key`, if any.
    fn load(&self, key: &str) -> Option<Vec<u8>>;

    /// Remove `key`. Missing keys are not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Read a UTF-8 value. Non-UTF-8 content is treated as absent.
    fn load_string(&self, key: &str) -> Option<String> {
        let bytes = self.load(key)?;
        match String::from_utf8(bytes) {
            Ok(s) => Some(s),
            Err(_) => {
                tracing::warn!(key, "stored secret is not valid UTF-8, ignoring");
                None
            }
        }
    }

    /// Whether a value is currently stored under `key`.
    fn contains(&self, key: &str) -> bool {
        self.load(key).is_some()
    }
}
