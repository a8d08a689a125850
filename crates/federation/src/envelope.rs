//! Wire types for the callable token function and the session sign-in call
//!
//! The function speaks the callable-function protocol: arguments wrapped in
//! `{"data": ...}`, results in `{"result": ...}`, failures in
//! `{"error": {"status", "message", "details"}}`.

use serde::{Deserialize, Serialize};

use crate::error::FederationError;

/// Application-level error codes carried in `error.details.code`.
pub const MISSING_ACCESS_TOKEN: &str = "missing-access-token";
pub const PROVIDER_UNAUTHORIZED: &str = "provider-unauthorized";
pub const PROVIDER_GENERIC: &str = "provider-generic";
pub const UNKNOWN_ERROR: &str = "unknown-error";

#[derive(Debug, Serialize)]
pub struct CallableRequest<'a> {
    pub data: TokenRequest<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest<'a> {
    pub provider_access_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CallableResponse {
    pub result: TokenResult,
}

#[derive(Debug, Deserialize)]
pub struct TokenResult {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct CallableErrorResponse {
    pub error: CallableError,
}

#[derive(Debug, Deserialize)]
pub struct CallableError {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<ErrorDetails>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetails {
    #[serde(default)]
    pub code: Option<String>,
}

impl CallableError {
    /// Map to a [`FederationError`]. `details.code` takes precedence; the
    /// canonical status is the fallback when no code is present.
    pub fn into_federation_error(self) -> FederationError {
        let code = self.details.and_then(|d| d.code);
        let message = if self.message.is_empty() {
            code.clone()
                .or_else(|| self.status.clone())
                .unwrap_or_else(|| "no message".into())
        } else {
            self.message
        };

        match code.as_deref() {
            Some(PROVIDER_UNAUTHORIZED | MISSING_ACCESS_TOKEN) => {
                FederationError::Unauthenticated(message)
            }
            Some(PROVIDER_GENERIC) => FederationError::FailedPrecondition(message),
            Some(_) => FederationError::Unknown(message),
            None => match self.status.as_deref() {
                Some("UNAUTHENTICATED" | "INVALID_ARGUMENT") => {
                    FederationError::Unauthenticated(message)
                }
                Some("FAILED_PRECONDITION") => FederationError::FailedPrecondition(message),
                _ => FederationError::Unknown(message),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSignInRequest<'a> {
    pub token: &'a str,
    pub return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSignInResponse {
    pub local_id: String,
    pub id_token: String,
}

/// Session sign-in error body: `{"error": {"code": 400, "message": "INVALID_CUSTOM_TOKEN"}}`
#[derive(Debug, Deserialize)]
pub struct SessionErrorResponse {
    pub error: SessionError,
}

#[derive(Debug, Deserialize)]
pub struct SessionError {
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_error(json: &str) -> FederationError {
        serde_json::from_str::<CallableErrorResponse>(json)
            .unwrap()
            .error
            .into_federation_error()
    }

    #[test]
    fn request_uses_callable_envelope() {
        let body = serde_json::to_value(CallableRequest {
            data: TokenRequest {
                provider_access_token: "at",
            },
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"data": {"providerAccessToken": "at"}}));
    }

    #[test]
    fn provider_unauthorized_is_unauthenticated() {
        let err = parse_error(
            r#"{"error":{"status":"UNAUTHENTICATED","message":"token is invalid or expired","details":{"code":"provider-unauthorized"}}}"#,
        );
        assert_eq!(
            err,
            FederationError::Unauthenticated("token is invalid or expired".into())
        );
    }

    #[test]
    fn provider_generic_is_failed_precondition() {
        let err = parse_error(
            r#"{"error":{"status":"FAILED_PRECONDITION","message":"profile missing id","details":{"code":"provider-generic"}}}"#,
        );
        assert!(matches!(err, FederationError::FailedPrecondition(_)));
    }

    #[test]
    fn missing_access_token_is_unauthenticated() {
        let err = parse_error(
            r#"{"error":{"status":"INVALID_ARGUMENT","message":"missing field","details":{"code":"missing-access-token"}}}"#,
        );
        assert!(matches!(err, FederationError::Unauthenticated(_)));
    }

    #[test]
    fn unknown_code_is_unknown() {
        let err = parse_error(
            r#"{"error":{"status":"UNAUTHENTICATED","message":"boom","details":{"code":"unknown-error"}}}"#,
        );
        assert_eq!(err, FederationError::Unknown("boom".into()));
    }

    #[test]
    fn status_is_the_fallback_without_details() {
        let err = parse_error(r#"{"error":{"status":"UNAUTHENTICATED","message":"nope"}}"#);
        assert!(matches!(err, FederationError::Unauthenticated(_)));

        let err = parse_error(r#"{"error":{"status":"FAILED_PRECONDITION","message":"nope"}}"#);
        assert!(matches!(err, FederationError::FailedPrecondition(_)));

        let err = parse_error(r#"{"error":{"status":"INTERNAL","message":"nope"}}"#);
        assert!(matches!(err, FederationError::Unknown(_)));
    }

    #[test]
    fn empty_message_falls_back_to_code() {
        let err = parse_error(r#"{"error":{"details":{"code":"provider-unauthorized"}}}"#);
        assert_eq!(
            err,
            FederationError::Unauthenticated("provider-unauthorized".into())
        );
    }

    #[test]
    fn success_requires_token_field() {
        assert!(serde_json::from_str::<CallableResponse>(r#"{"result":{"token":"ct"}}"#).is_ok());
        assert!(serde_json::from_str::<CallableResponse>(r#"{"result":{}}"#).is_err());
        assert!(serde_json::from_str::<CallableResponse>(r#"{"token":"ct"}"#).is_err());
    }

    #[test]
    fn session_request_is_camel_case() {
        let body = serde_json::to_value(SessionSignInRequest {
            token: "ct",
            return_secure_token: true,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"token": "ct", "returnSecureToken": true})
        );
    }
}
