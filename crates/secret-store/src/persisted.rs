//! Values carried alongside non-fatal storage failures

use crate::error::StorageError;

/// A value produced by a step that succeeded, plus the secret store writes
/// that did not make it to disk.
///
/// The in-memory value stays authoritative for the current session; the
/// warnings tell the caller what a restart would lose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persisted<T> {
    pub value: T,
    pub warnings: Vec<StorageError>,
}

impl<T> Persisted<T> {
    /// A value with nothing to warn about.
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(value: T, warnings: Vec<StorageError>) -> Self {
        Self { value, warnings }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Persisted<U> {
        Persisted {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}
