//! Provider credential and its persisted form
//!
//! A credential is spread over three independent secret store keys (access
//! token, refresh token, expiry) so each can be read, rotated, or deleted on
//! its own. The access token key is the presence marker: no access token
//! means no credential.

use common::Secret;
use secret_store::{SecretStore, StorageError};
use tracing::{debug, warn};

use std::time::Duration;

use crate::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TOKEN_EXPIRY_KEY};
use crate::expiry::ExpiryClock;
use crate::token::TokenResponse;

/// The provider's OAuth credentials.
///
/// `expires_at` is a unix timestamp in milliseconds (absolute, not a delta).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: Secret<String>,
    pub refresh_token: Option<Secret<String>>,
    pub expires_at: u64,
}

impl Credential {
    /// Build a credential from a token response issued now, per `expiry`.
    ///
    /// `previous_refresh` is kept when the response does not rotate the
    /// refresh token.
    pub fn from_response(
        response: TokenResponse,
        expiry: &ExpiryClock,
        previous_refresh: Option<Secret<String>>,
    ) -> Self {
        let expires_at = expiry.expires_at(Duration::from_secs(response.expires_in_secs()));
        Self {
            access_token: Secret::new(response.access_token),
            refresh_token: response.refresh_token.map(Secret::new).or(previous_refresh),
            expires_at,
        }
    }

    /// Read the stored credential, if an access token is present.
    pub fn load(store: &dyn SecretStore) -> Option<Self> {
        let access_token = store.load_string(ACCESS_TOKEN_KEY)?;
        Some(Self {
            access_token: Secret::new(access_token),
            refresh_token: load_refresh_token(store),
            expires_at: load_expiry(store).unwrap_or(0),
        })
    }

    /// Persist all three parts. Every write is attempted; failures are
    /// collected so the caller can surface them without losing the
    /// in-memory credential.
    pub fn persist(&self, store: &dyn SecretStore) -> Vec<StorageError> {
        let mut failures = Vec::new();

        if let Err(e) = store.save(ACCESS_TOKEN_KEY, self.access_token.as_bytes()) {
            warn!(key = ACCESS_TOKEN_KEY, error = %e, "failed to persist access token");
            failures.push(e);
        }
        if let Some(refresh) = &self.refresh_token {
            if let Err(e) = store.save(REFRESH_TOKEN_KEY, refresh.as_bytes()) {
                warn!(key = REFRESH_TOKEN_KEY, error = %e, "failed to persist refresh token");
                failures.push(e);
            }
        }
        if let Err(e) = store.save(TOKEN_EXPIRY_KEY, self.expires_at.to_string().as_bytes()) {
            warn!(key = TOKEN_EXPIRY_KEY, error = %e, "failed to persist token expiry");
            failures.push(e);
        }

        if failures.is_empty() {
            debug!(expires_at = self.expires_at, "persisted provider credential");
        }
        failures
    }
}

/// Stored refresh token, if any.
pub fn load_refresh_token(store: &dyn SecretStore) -> Option<Secret<String>> {
    store.load_string(REFRESH_TOKEN_KEY).map(Secret::new)
}

/// Stored expiry record. Unparseable values count as missing.
pub fn load_expiry(store: &dyn SecretStore) -> Option<u64> {
    let raw = store.load_string(TOKEN_EXPIRY_KEY)?;
    match raw.trim().parse() {
        Ok(expires_at) => Some(expires_at),
        Err(e) => {
            warn!(key = TOKEN_EXPIRY_KEY, error = %e, "ignoring unparseable token expiry");
            None
        }
    }
}
