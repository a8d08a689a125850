//! PKCE (Proof Key for Code Exchange) implementation per RFC 7636
//!
//! Generates the code verifier and S256 challenge used during the OAuth
//! authorization flow. The verifier stays on this device and is sent during
//! token exchange; the challenge goes into the authorization URL so the
//! provider can check that the exchange came from whoever started the flow.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::Secret;
use rand::RngExt;
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::{CodeChallengeMethod, ProviderConfig};
use crate::constants::VERIFIER_LEN;

/// RFC 7636 §4.1 unreserved characters: ALPHA / DIGIT / "-" / "." / "_" / "~"
const UNRESERVED: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// One authorization attempt's verifier/challenge pair.
#[derive(Debug, Clone)]
pub struct PkceSession {
    pub verifier: Secret<String>,
    pub challenge: String,
}

impl PkceSession {
    /// Fresh verifier from the thread-local CSPRNG plus its S256 challenge.
    pub fn generate() -> Self {
        let verifier = generate_verifier();
        let challenge = compute_challenge(&verifier);
        Self {
            verifier: Secret::new(verifier),
            challenge,
        }
    }
}

/// Generate a cryptographically random PKCE code verifier.
///
/// 128 characters drawn uniformly from the unreserved alphabet, the maximum
/// length RFC 7636 allows.
pub fn generate_verifier() -> String {
    let mut rng = rand::rng();
    (0..VERIFIER_LEN)
        .map(|_| UNRESERVED[rng.random_range(0..UNRESERVED.len())] as char)
        .collect()
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL-NOPAD(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Build the browser-facing authorization URL.
///
/// Parameter order follows the provider's documentation; values are
/// form-urlencoded by `url`.
pub fn build_authorization_url(config: &ProviderConfig, challenge: &str) -> Url {
    let mut url = config.authorize_endpoint.clone();
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("scope", &config.scope_param())
        .append_pair("code_challenge_method", CodeChallengeMethod::S256.as_str())
        .append_pair("code_challenge", challenge)
        .append_pair("show_dialog", if config.show_dialog { "true" } else { "false" });
    url
}
