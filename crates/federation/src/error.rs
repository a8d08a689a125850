//! Error types for identity federation

use secret_store::StorageError;

/// Errors from the token-issuing function, the session sign-in call, and
/// session persistence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FederationError {
    /// The provider access token was rejected (expired, invalid, or absent).
    #[error("provider token rejected: {0}")]
    Unauthenticated(String),

    /// The provider accepted the token but the profile is unusable.
    #[error("federation precondition failed: {0}")]
    FailedPrecondition(String),

    #[error("malformed federation response: {0}")]
    MalformedResponse(String),

    #[error("federation network failure: {0}")]
    Network(String),

    #[error("federated session storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("federation failed: {0}")]
    Unknown(String),
}

impl FederationError {
    pub(crate) fn from_transport(context: &str, e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            FederationError::Network(format!("{context} timed out: {e}"))
        } else {
            FederationError::Network(format!("{context} failed: {e}"))
        }
    }
}

/// Result alias for federation operations.
pub type Result<T> = std::result::Result<T, FederationError>;
