//! Identity federation
//!
//! Exchanges the provider's access token for a session in a second,
//! independent identity system. The token-issuing function validates the
//! provider token and mints a custom token; a custom-token sign-in turns that
//! into a session (`uid` plus session token) that is persisted in the secret
//! store under [`SESSION_KEY`].
//!
//! The coordinator depends on [`IdentityFederation`], not on the HTTP client,
//! so tests and alternative backends can be injected as `Arc<dyn _>`.

pub mod envelope;
pub mod error;
pub mod http;

pub use error::{FederationError, Result};
pub use http::{FederationConfig, HttpFederationClient};

use common::Secret;
use secret_store::Persisted;
use std::future::Future;
use std::pin::Pin;

/// Secret store key for the persisted federated session
pub const SESSION_KEY: &str = "federation.session";

/// An active federated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub uid: String,
    pub session_token: Secret<String>,
}

/// Abstraction over the federation backend.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn IdentityFederation>`).
pub trait IdentityFederation: Send + Sync {
    /// Trade a provider access token for a federated session and persist it.
    ///
    /// A failed session save is a warning: the identity is still returned
    /// and stays live for this process.
    fn federate<'a>(
        &'a self,
        provider_access_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Persisted<FederatedIdentity>>> + Send + 'a>>;

    /// The currently active session, if any. Local and synchronous.
    fn current_identity(&self) -> Option<FederatedIdentity>;

    /// End the local session. Already signed out is success.
    fn sign_out(&self) -> Result<()>;
}
