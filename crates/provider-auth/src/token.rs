//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (PKCE flow completion)
//! 2. Token refresh
//!
//! Both operations POST `application/x-www-form-urlencoded` bodies to the
//! configured token endpoint with different grant types. Anything other than
//! a 200 is a failed exchange carrying the status code.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::constants::DEFAULT_EXPIRES_IN_SECS;
use crate::error::{Error, Result};

/// Response from the token endpoint for both exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time; the caller
/// converts it to an absolute timestamp when storing the credential.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Refresh responses may omit this; the previous refresh token stays valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    /// Token lifetime in seconds, defaulting to one hour.
    pub fn expires_in_secs(&self) -> u64 {
        self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS)
    }
}

/// Exchange an authorization code for tokens.
///
/// The user has authorized in their browser and we received the code on the
/// redirect. The verifier proves we are the party that built the challenge.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &ProviderConfig,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(config.token_endpoint.clone())
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("client_id", config.client_id.as_str()),
            ("code_verifier", verifier),
        ])
        .send()
        .await
        .map_err(|e| Error::from_transport("token exchange request", &e))?;

    read_token_response(response, "token exchange").await
}

/// Refresh an access token using a refresh token.
pub async fn refresh_token(
    client: &reqwest::Client,
    config: &ProviderConfig,
    refresh: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(config.token_endpoint.clone())
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh),
            ("client_id", config.client_id.as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::from_transport("token refresh request", &e))?;

    read_token_response(response, "token refresh").await
}

async fn read_token_response(response: reqwest::Response, operation: &str) -> Result<TokenResponse> {
    let status = response.status();
    if status != StatusCode::OK {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        warn!(%status, body = %body, "{operation} rejected by token endpoint");
        return Err(Error::TokenExchangeFailed(status.as_u16()));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::from_transport(operation, &e))?;
    let token: TokenResponse = serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedResponse(format!("invalid {operation} response: {e}")))?;

    if token.access_token.is_empty() {
        return Err(Error::MalformedResponse(format!(
            "{operation} response has an empty access_token"
        )));
    }

    debug!(
        expires_in = token.expires_in_secs(),
        rotated = token.refresh_token.is_some(),
        "{operation} succeeded"
    );
    Ok(token)
}
