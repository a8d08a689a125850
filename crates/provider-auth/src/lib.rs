//! Provider OAuth authentication library
//!
//! PKCE authorization, token exchange/refresh, expiry tracking, and
//! credential persistence for the music provider's public OAuth client. It
//! has no knowledge of identity federation; the coordinator composes the two.
//!
//! Credential flow:
//! 1. `OAuthFlowManager::begin_authorization()` persists a fresh verifier and
//!    returns the consent URL
//! 2. The redirect is parsed with `callback::parse_callback()`
//! 3. `OAuthFlowManager::exchange_code()` trades the code for a credential
//!    and consumes the verifier
//! 4. `OAuthFlowManager::refresh_if_needed()` rotates tokens once the
//!    `ExpiryClock` says they are due
//! 5. `OAuthFlowManager::revoke()` deletes everything on logout

pub mod callback;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod expiry;
pub mod flow;
pub mod pkce;
pub mod token;

pub use callback::{code_from_params, parse_callback};
pub use config::{CodeChallengeMethod, ProviderConfig};
pub use constants::*;
pub use credentials::Credential;
pub use error::{Error, Result};
pub use expiry::{Clock, ExpiryClock, ManualClock, SystemClock, is_expired};
pub use flow::{AuthorizationRequest, OAuthFlowManager};
pub use secret_store::Persisted;
pub use pkce::{PkceSession, build_authorization_url, compute_challenge, generate_verifier};
pub use token::{TokenResponse, exchange_code, refresh_token};
