//! File-backed secret store
//!
//! Keeps every secret in one JSON document mapping key → base64 value. All
//! writes use atomic temp-file + rename to prevent corruption on crash, and a
//! Mutex serializes concurrent writers (request-time refresh racing the
//! background refresh task, for example).
//!
//! The in-memory map is the read path; the file is rewritten on every
//! mutation so a restart sees exactly what was last acknowledged.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info, warn};

use crate::SecretStore;
use crate::error::{Result, StorageError};

/// Thread-safe secret file manager.
pub struct FileSecretStore {
    path: PathBuf,
    state: Mutex<BTreeMap<String, String>>,
}

impl FileSecretStore {
    /// Open the secret file at `path`.
    ///
    /// If the file doesn't exist, creates it as `{}` (cold start, logged out).
    pub fn open(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| StorageError::Io(format!("reading secret file: {e}")))?;
            let entries: BTreeMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| StorageError::Serialization(format!("parsing secret file: {e}")))?;
            info!(path = %path.display(), entries = entries.len(), "loaded secret store");
            entries
        } else {
            info!(path = %path.display(), "secret file not found, starting with empty store");
            let entries = BTreeMap::new();
            write_atomic(&path, &entries)?;
            entries
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.state
            .lock()
            .map_err(|_| StorageError::Backend("secret file lock poisoned".into()))
    }
}

impl SecretStore for FileSecretStore {
    fn save(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut state = self.lock()?;
        let previous = state.insert(key.to_string(), STANDARD.encode(value));
        if let Err(e) = write_atomic(&self.path, &state) {
            // Keep memory consistent with what is on disk.
            match previous {
                Some(old) => state.insert(key.to_string(), old),
                None => state.remove(key),
            };
            return Err(e);
        }
        debug!(key, "saved secret");
        Ok(())
    }

    fn load(&self, key: &str) -> Option<Vec<u8>> {
        let state = match self.lock() {
            Ok(state) => state,
            Err(e) => {
                warn!(key, error = %e, "secret store unreadable");
                return None;
            }
        };
        let encoded = state.get(key)?;
        match STANDARD.decode(encoded) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(key, error = %e, "stored secret is not valid base64, ignoring");
                None
            }
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.lock()?;
        let Some(removed) = state.remove(key) else {
            return Ok(());
        };
        if let Err(e) = write_atomic(&self.path, &state) {
            state.insert(key.to_string(), removed);
            return Err(e);
        }
        debug!(key, "deleted secret");
        Ok(())
    }
}

/// Write the secret map to a file atomically.
///
/// Sibling of `path` used as the rename source. Named after the target so
/// stores sharing a directory never write the same temp file.
fn temp_path(path: &Path) -> Result<PathBuf> {
    let dir = path
        .parent()
        .ok_or_else(|| StorageError::Io("secret path has no parent directory".into()))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| StorageError::Io("secret path has no file name".into()))?
        .to_string_lossy();
    Ok(dir.join(format!(".{file_name}.tmp.{}", std::process::id())))
}

/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets file permissions to 0600 (owner read/write only) since
/// the file contains OAuth tokens.
fn write_atomic(path: &Path, data: &BTreeMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| StorageError::Serialization(format!("serializing secrets: {e}")))?;

    let tmp_path = temp_path(path)?;

    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| StorageError::Io(format!("writing temp secret file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&tmp_path, perms)
            .map_err(|e| StorageError::Io(format!("setting secret file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| StorageError::Io(format!("renaming temp secret file: {e}")))?;

    debug!(path = %path.display(), "persisted secrets");
    Ok(())
}
