//! Error taxonomy surfaced by the coordinator

use federation::FederationError;
use secret_store::StorageError;

/// Everything a login, refresh, logout or cancel attempt can report.
///
/// `Clone` because a single refresh outcome is handed to every caller that
/// joined it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("no PKCE verifier for this authorization attempt")]
    PkceVerifierMissing,

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("token endpoint returned HTTP {0}")]
    TokenExchangeFailed(u16),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("secure storage failure: {0}")]
    StorageFailure(String),

    #[error("federation rejected the provider token: {0}")]
    FederationUnauthenticated(String),

    #[error("federation precondition failed: {0}")]
    FederationFailedPrecondition(String),

    #[error("malformed federation response: {0}")]
    FederationMalformed(String),

    #[error("authorization canceled by the user")]
    UserCanceled,

    #[error("invalid redirect callback: {0}")]
    InvalidCallback(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl AuthError {
    /// Short label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::PkceVerifierMissing => "pkce_verifier_missing",
            AuthError::NetworkFailure(_) => "network_failure",
            AuthError::TokenExchangeFailed(_) => "token_exchange_failed",
            AuthError::MalformedResponse(_) => "malformed_response",
            AuthError::StorageFailure(_) => "storage_failure",
            AuthError::FederationUnauthenticated(_) => "federation_unauthenticated",
            AuthError::FederationFailedPrecondition(_) => "federation_failed_precondition",
            AuthError::FederationMalformed(_) => "federation_malformed",
            AuthError::UserCanceled => "user_canceled",
            AuthError::InvalidCallback(_) => "invalid_callback",
            AuthError::Unknown(_) => "unknown",
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(e: StorageError) -> Self {
        AuthError::StorageFailure(e.to_string())
    }
}

impl From<provider_auth::Error> for AuthError {
    fn from(e: provider_auth::Error) -> Self {
        use provider_auth::Error;
        match e {
            Error::PkceVerifierMissing => AuthError::PkceVerifierMissing,
            Error::Network(msg) => AuthError::NetworkFailure(msg),
            Error::TokenExchangeFailed(status) => AuthError::TokenExchangeFailed(status),
            Error::MalformedResponse(msg) => AuthError::MalformedResponse(msg),
            Error::Storage(e) => e.into(),
            Error::UserCanceled => AuthError::UserCanceled,
            Error::InvalidCallback(msg) => AuthError::InvalidCallback(msg),
        }
    }
}

impl From<FederationError> for AuthError {
    fn from(e: FederationError) -> Self {
        match e {
            FederationError::Unauthenticated(msg) => AuthError::FederationUnauthenticated(msg),
            FederationError::FailedPrecondition(msg) => {
                AuthError::FederationFailedPrecondition(msg)
            }
            FederationError::MalformedResponse(msg) => AuthError::FederationMalformed(msg),
            FederationError::Network(msg) => AuthError::NetworkFailure(msg),
            FederationError::Storage(e) => e.into(),
            FederationError::Unknown(msg) => AuthError::Unknown(msg),
        }
    }
}
