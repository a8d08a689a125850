//! OAuth flow manager
//!
//! Owns the provider credential end to end: builds PKCE authorization
//! requests, exchanges the returned code, refreshes when the expiry clock
//! says so, and revokes everything on logout. Callers never see raw token
//! material beyond [`OAuthFlowManager::access_token`].

use std::sync::{Arc, Mutex, PoisonError};

use common::Secret;
use secret_store::{Persisted, SecretStore, StorageError};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{CodeChallengeMethod, ProviderConfig};
use crate::constants::{ACCESS_TOKEN_KEY, PKCE_VERIFIER_KEY, REFRESH_TOKEN_KEY, TOKEN_EXPIRY_KEY};
use crate::credentials::{self, Credential};
use crate::error::{Error, Result};
use crate::expiry::ExpiryClock;
use crate::pkce::{PkceSession, build_authorization_url};
use crate::token;

/// Everything the UI needs to send the user to the consent screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub code_challenge_method: CodeChallengeMethod,
    pub scopes: Vec<String>,
}

pub struct OAuthFlowManager {
    config: ProviderConfig,
    http: reqwest::Client,
    store: Arc<dyn SecretStore>,
    expiry: ExpiryClock,
    /// Copy of the outstanding verifier in case the store write failed.
    pending_verifier: Mutex<Option<Secret<String>>>,
    /// Latest credential whose persist did not fully succeed. Newer than
    /// whatever the store holds while set.
    unpersisted: Mutex<Option<Credential>>,
}

impl OAuthFlowManager {
    pub fn new(
        config: ProviderConfig,
        http: reqwest::Client,
        store: Arc<dyn SecretStore>,
        expiry: ExpiryClock,
    ) -> Self {
        Self {
            config,
            http,
            store,
            expiry,
            pending_verifier: Mutex::new(None),
            unpersisted: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn expiry(&self) -> &ExpiryClock {
        &self.expiry
    }

    /// Start a new authorization attempt, superseding any outstanding one.
    pub fn begin_authorization(&self) -> Persisted<AuthorizationRequest> {
        let session = PkceSession::generate();
        let mut warnings = Vec::new();

        if let Err(e) = self
            .store
            .save(PKCE_VERIFIER_KEY, session.verifier.as_bytes())
        {
            warn!(error = %e, "failed to persist PKCE verifier, keeping it in memory only");
            warnings.push(e);
        }

        let url = build_authorization_url(&self.config, &session.challenge);
        *self.verifier_slot() = Some(session.verifier);

        debug!(scopes = %self.config.scope_param(), "built authorization request");
        Persisted {
            value: AuthorizationRequest {
                url,
                code_challenge_method: CodeChallengeMethod::S256,
                scopes: self.config.scopes.clone(),
            },
            warnings,
        }
    }

    /// Exchange an authorization code for a credential and persist it.
    ///
    /// The verifier is consumed whether or not the exchange succeeds.
    pub async fn exchange_code(&self, code: &str) -> Result<Persisted<Credential>> {
        let verifier = self.pending_verifier();
        let outcome = match &verifier {
            Some(verifier) => {
                token::exchange_code(&self.http, &self.config, code, verifier.expose_str()).await
            }
            None => Err(Error::PkceVerifierMissing),
        };
        let mut warnings: Vec<StorageError> = self.discard_verifier().err().into_iter().collect();

        let response = outcome?;
        let credential = Credential::from_response(response, &self.expiry, None);
        warnings.extend(self.persist(&credential));

        info!(expires_at = credential.expires_at, "provider authorization code exchanged");
        Ok(Persisted { value: credential, warnings })
    }

    /// Refresh the stored credential if the expiry clock says it is due.
    ///
    /// `Ok(false)` means there is nothing to refresh with. `Ok(true)` means
    /// the credential is usable, either untouched or freshly rotated.
    pub async fn refresh_if_needed(&self) -> Result<Persisted<bool>> {
        let Some((refresh, expires_at)) = self.refresh_material() else {
            debug!("no refresh token stored");
            return Ok(Persisted::clean(false));
        };

        if !self.expiry.needs_refresh(expires_at) {
            debug!(?expires_at, "provider token still fresh");
            return Ok(Persisted::clean(true));
        }

        let response = token::refresh_token(&self.http, &self.config, refresh.expose_str()).await?;
        let credential = Credential::from_response(response, &self.expiry, Some(refresh));
        let warnings = self.persist(&credential);

        info!(expires_at = credential.expires_at, "provider token refreshed");
        Ok(Persisted {
            value: true,
            warnings,
        })
    }

    /// Delete every provider secret. All deletions are attempted; failures
    /// are folded into a single storage error.
    pub fn revoke(&self) -> Result<()> {
        *self.verifier_slot() = None;
        *self.unpersisted_slot() = None;

        let failures: Vec<String> = [
            ACCESS_TOKEN_KEY,
            REFRESH_TOKEN_KEY,
            PKCE_VERIFIER_KEY,
            TOKEN_EXPIRY_KEY,
        ]
        .into_iter()
        .filter_map(|key| match self.store.delete(key) {
            Ok(()) => None,
            Err(e) => {
                warn!(key, error = %e, "failed to delete provider secret");
                Some(format!("{key}: {e}"))
            }
        })
        .collect();

        if failures.is_empty() {
            info!("provider credential revoked");
            Ok(())
        } else {
            Err(Error::Storage(StorageError::Backend(format!(
                "failed to delete {} provider secret(s): {}",
                failures.len(),
                failures.join("; ")
            ))))
        }
    }

    /// Forget the outstanding verifier (store and memory).
    pub fn discard_verifier(&self) -> std::result::Result<(), StorageError> {
        *self.verifier_slot() = None;
        self.store.delete(PKCE_VERIFIER_KEY).inspect_err(|e| {
            warn!(error = %e, "failed to delete PKCE verifier");
        })
    }

    pub fn access_token(&self) -> Option<Secret<String>> {
        self.credential().map(|c| c.access_token)
    }

    pub fn has_credential(&self) -> bool {
        self.unpersisted_slot().is_some() || self.store.contains(ACCESS_TOKEN_KEY)
    }

    /// The current credential: an unpersisted in-memory copy wins over the
    /// store.
    pub fn credential(&self) -> Option<Credential> {
        self.unpersisted_slot()
            .clone()
            .or_else(|| Credential::load(self.store.as_ref()))
    }

    fn persist(&self, credential: &Credential) -> Vec<StorageError> {
        let failures = credential.persist(self.store.as_ref());
        *self.unpersisted_slot() = if failures.is_empty() {
            None
        } else {
            Some(credential.clone())
        };
        failures
    }

    /// Refresh token and expiry record, if there is anything to refresh with.
    fn refresh_material(&self) -> Option<(Secret<String>, Option<u64>)> {
        if let Some(held) = self.unpersisted_slot().clone() {
            return held.refresh_token.map(|refresh| (refresh, Some(held.expires_at)));
        }
        let refresh = credentials::load_refresh_token(self.store.as_ref())?;
        Some((refresh, credentials::load_expiry(self.store.as_ref())))
    }

    /// Persisted verifier first, in-memory copy as fallback.
    fn pending_verifier(&self) -> Option<Secret<String>> {
        self.store
            .load_string(PKCE_VERIFIER_KEY)
            .map(Secret::new)
            .or_else(|| self.verifier_slot().clone())
    }

    fn verifier_slot(&self) -> std::sync::MutexGuard<'_, Option<Secret<String>>> {
        self.pending_verifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn unpersisted_slot(&self) -> std::sync::MutexGuard<'_, Option<Credential>> {
        self.unpersisted.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for OAuthFlowManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthFlowManager")
            .field("client_id", &self.config.client_id)
            .field("token_endpoint", &self.config.token_endpoint.as_str())
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}
