//! HTTP mapping for coordinator errors

use auth_coordinator::{AuthError, LoginState};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// A failed transition, rendered as a JSON error body.
///
/// Carries the state the coordinator settled in so clients do not need a
/// second `/auth/status` round trip after a rollback.
#[derive(Debug)]
pub struct ApiError {
    pub error: AuthError,
    pub state: LoginState,
}

impl ApiError {
    pub fn new(error: AuthError, state: LoginState) -> Self {
        Self { error, state }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.error {
            AuthError::InvalidCallback(_) | AuthError::PkceVerifierMissing => {
                StatusCode::BAD_REQUEST
            }
            AuthError::UserCanceled => StatusCode::CONFLICT,
            AuthError::TokenExchangeFailed(_) | AuthError::FederationUnauthenticated(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::FederationFailedPrecondition(_) => StatusCode::PRECONDITION_FAILED,
            AuthError::NetworkFailure(_)
            | AuthError::MalformedResponse(_)
            | AuthError::FederationMalformed(_) => StatusCode::BAD_GATEWAY,
            AuthError::StorageFailure(_) | AuthError::Unknown(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.error.kind(),
            "message": self.error.to_string(),
            "state": self.state.label(),
            "logged_in": self.state == LoginState::FullyAuthenticated,
        });
        (self.status_code(), axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_4xx() {
        for error in [
            AuthError::InvalidCallback("missing code".into()),
            AuthError::PkceVerifierMissing,
            AuthError::UserCanceled,
            AuthError::TokenExchangeFailed(400),
            AuthError::FederationUnauthenticated("provider-unauthorized".into()),
            AuthError::FederationFailedPrecondition("provider-generic".into()),
        ] {
            let status = ApiError::new(error.clone(), LoginState::LoggedOut).status_code();
            assert!(status.is_client_error(), "{error:?} mapped to {status}");
        }
    }

    #[test]
    fn upstream_and_local_failures_are_5xx() {
        let cases = [
            (AuthError::NetworkFailure("refused".into()), StatusCode::BAD_GATEWAY),
            (AuthError::FederationMalformed("empty uid".into()), StatusCode::BAD_GATEWAY),
            (
                AuthError::StorageFailure("disk full".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AuthError::Unknown("?".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::new(error, LoginState::LoggedOut).status_code(), expected);
        }
    }

    #[tokio::test]
    async fn body_names_error_kind_and_state() {
        let response = ApiError::new(
            AuthError::FederationUnauthenticated("token rejected".into()),
            LoginState::LoggedOut,
        )
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "federation_unauthenticated");
        assert_eq!(json["state"], LoginState::LoggedOut.label());
        assert_eq!(json["logged_in"], false);
        assert!(json["message"].as_str().unwrap().contains("token rejected"));
    }
}
