//! HTTP federation client
//!
//! Two round trips per federation:
//! 1. POST the provider token to the callable token function
//! 2. POST the returned custom token to the session sign-in endpoint
//!
//! Either failing aborts the exchange; nothing is persisted until both
//! succeed.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use common::Secret;
use reqwest::StatusCode;
use secret_store::{Persisted, SecretStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::envelope::{
    CallableErrorResponse, CallableRequest, CallableResponse, SessionErrorResponse,
    SessionSignInRequest, SessionSignInResponse, TokenRequest,
};
use crate::error::{FederationError, Result};
use crate::{FederatedIdentity, IdentityFederation, SESSION_KEY};

/// Endpoints and credentials for the federation backend.
#[derive(Debug, Clone)]
pub struct FederationConfig {
    /// Callable token function
    pub function_url: Url,
    /// Custom-token session sign-in endpoint
    pub session_url: Url,
    /// Project API key, sent as the `key` query parameter on sign-in
    pub api_key: Option<Secret<String>>,
}

/// On-disk form of a federated session.
#[derive(Serialize, Deserialize)]
struct StoredSession {
    uid: String,
    session_token: String,
}

pub struct HttpFederationClient {
    config: FederationConfig,
    http: reqwest::Client,
    store: Arc<dyn SecretStore>,
    /// Session held for this process when the store write failed.
    unpersisted: Mutex<Option<FederatedIdentity>>,
}

impl HttpFederationClient {
    pub fn new(config: FederationConfig, http: reqwest::Client, store: Arc<dyn SecretStore>) -> Self {
        Self {
            config,
            http,
            store,
            unpersisted: Mutex::new(None),
        }
    }

    /// Step 1: provider access token → custom token.
    async fn request_custom_token(&self, provider_access_token: &str) -> Result<Secret<String>> {
        let response = self
            .http
            .post(self.config.function_url.clone())
            .json(&CallableRequest {
                data: TokenRequest {
                    provider_access_token,
                },
            })
            .send()
            .await
            .map_err(|e| FederationError::from_transport("token function request", &e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FederationError::from_transport("token function response", &e))?;

        if !status.is_success() {
            return Err(match serde_json::from_slice::<CallableErrorResponse>(&bytes) {
                Ok(body) => {
                    let err = body.error.into_federation_error();
                    warn!(%status, error = %err, "token function rejected provider token");
                    err
                }
                Err(_) => FederationError::Unknown(format!("token function returned HTTP {status}")),
            });
        }

        let body: CallableResponse = serde_json::from_slice(&bytes).map_err(|e| {
            FederationError::MalformedResponse(format!("token function response: {e}"))
        })?;
        if body.result.token.is_empty() {
            return Err(FederationError::MalformedResponse(
                "token function returned an empty token".into(),
            ));
        }
        debug!("received custom token");
        Ok(Secret::new(body.result.token))
    }

    /// Step 2: custom token → session.
    async fn sign_in(&self, custom_token: &Secret<String>) -> Result<FederatedIdentity> {
        let mut url = self.config.session_url.clone();
        if let Some(key) = &self.config.api_key {
            url.query_pairs_mut().append_pair("key", key.expose_str());
        }

        let response = self
            .http
            .post(url)
            .json(&SessionSignInRequest {
                token: custom_token.expose_str(),
                return_secure_token: true,
            })
            .send()
            .await
            .map_err(|e| FederationError::from_transport("session sign-in request", &e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FederationError::from_transport("session sign-in response", &e))?;

        if status != StatusCode::OK {
            let message = serde_json::from_slice::<SessionErrorResponse>(&bytes)
                .map(|body| body.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            warn!(%status, message = %message, "session sign-in rejected");
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    FederationError::Unauthenticated(message)
                }
                _ => FederationError::Unknown(message),
            });
        }

        let body: SessionSignInResponse = serde_json::from_slice(&bytes).map_err(|e| {
            FederationError::MalformedResponse(format!("session sign-in response: {e}"))
        })?;
        if body.local_id.is_empty() {
            return Err(FederationError::MalformedResponse(
                "federated user id missing after sign-in".into(),
            ));
        }
        if body.id_token.is_empty() {
            return Err(FederationError::MalformedResponse(
                "session sign-in returned an empty session token".into(),
            ));
        }

        Ok(FederatedIdentity {
            uid: body.local_id,
            session_token: Secret::new(body.id_token),
        })
    }

    fn persist(&self, identity: &FederatedIdentity) -> Persisted<()> {
        let stored = StoredSession {
            uid: identity.uid.clone(),
            session_token: identity.session_token.expose_str().to_owned(),
        };
        let saved = serde_json::to_vec(&stored)
            .map_err(|e| secret_store::StorageError::Serialization(e.to_string()))
            .and_then(|bytes| self.store.save(SESSION_KEY, &bytes));

        match saved {
            Ok(()) => {
                *self.unpersisted_slot() = None;
                Persisted::clean(())
            }
            Err(e) => {
                warn!(error = %e, "failed to persist federated session, keeping it in memory");
                *self.unpersisted_slot() = Some(identity.clone());
                Persisted::with_warnings((), vec![e])
            }
        }
    }

    fn load_stored(&self) -> Option<FederatedIdentity> {
        let bytes = self.store.load(SESSION_KEY)?;
        match serde_json::from_slice::<StoredSession>(&bytes) {
            Ok(stored) if !stored.uid.is_empty() => Some(FederatedIdentity {
                uid: stored.uid,
                session_token: Secret::new(stored.session_token),
            }),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable federated session");
                None
            }
        }
    }

    fn unpersisted_slot(&self) -> std::sync::MutexGuard<'_, Option<FederatedIdentity>> {
        self.unpersisted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl IdentityFederation for HttpFederationClient {
    fn federate<'a>(
        &'a self,
        provider_access_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Persisted<FederatedIdentity>>> + Send + 'a>> {
        Box::pin(async move {
            let custom_token = self.request_custom_token(provider_access_token).await?;
            let identity = self.sign_in(&custom_token).await?;
            let persisted = self.persist(&identity);

            info!(uid = %identity.uid, "federated session established");
            Ok(persisted.map(|()| identity))
        })
    }

    fn current_identity(&self) -> Option<FederatedIdentity> {
        self.load_stored()
            .or_else(|| self.unpersisted_slot().clone())
    }

    fn sign_out(&self) -> Result<()> {
        *self.unpersisted_slot() = None;
        self.store.delete(SESSION_KEY)?;
        info!("federated session ended");
        Ok(())
    }
}

impl std::fmt::Debug for HttpFederationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFederationClient")
            .field("function_url", &self.config.function_url.as_str())
            .field("session_url", &self.config.session_url.as_str())
            .finish_non_exhaustive()
    }
}
