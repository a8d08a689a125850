//! Error types for provider OAuth operations

use secret_store::StorageError;

/// Errors from the PKCE flow, the token endpoint, and credential storage.
///
/// `Clone` so a single refresh outcome can be shared with every caller that
/// joined the same in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("no PKCE verifier for this authorization attempt")]
    PkceVerifierMissing,

    #[error("network failure: {0}")]
    Network(String),

    #[error("token endpoint returned HTTP {0}")]
    TokenExchangeFailed(u16),

    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    #[error("credential storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("authorization canceled by the user")]
    UserCanceled,

    #[error("invalid redirect callback: {0}")]
    InvalidCallback(String),
}

impl Error {
    /// Map a transport-level reqwest failure. Timeouts are network failures too.
    pub(crate) fn from_transport(context: &str, e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Network(format!("{context} timed out: {e}"))
        } else {
            Error::Network(format!("{context} failed: {e}"))
        }
    }
}

/// Result alias for provider auth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_exchange_failure_carries_status() {
        let err = Error::TokenExchangeFailed(400);
        assert_eq!(err.to_string(), "token endpoint returned HTTP 400");
    }

    #[test]
    fn storage_error_converts() {
        let err: Error = StorageError::Io("disk full".into()).into();
        assert!(matches!(err, Error::Storage(StorageError::Io(_))));
        assert!(err.to_string().contains("disk full"));
    }
}
