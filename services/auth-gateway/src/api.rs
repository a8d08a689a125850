//! Loopback HTTP API over the login coordinator
//!
//! Endpoints:
//! - GET  /health           liveness plus current login state
//! - GET  /metrics          Prometheus text exposition
//! - POST /auth/authorize   start PKCE authorization, return the consent URL
//! - GET  /callback         OAuth redirect target, completes login
//! - POST /auth/cancel      abandon the outstanding authorization attempt
//! - POST /auth/refresh     refresh now (joins an in-flight refresh)
//! - POST /auth/logout      end both sessions
//! - GET  /auth/status      published login status
//!
//! Tokens never appear in responses; only state and flags do.

use std::sync::Arc;
use std::time::Instant;

use auth_coordinator::{AuthCoordinator, AuthError, AuthStatus, Outcome, TransitionResult};
use axum::Router;
use axum::extract::{MatchedPath, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, middleware};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::error::ApiError;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<AuthCoordinator>,
    pub prometheus: PrometheusHandle,
    pub started_at: Instant,
}

/// Build the router. `max_connections` bounds concurrently served requests.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .route("/auth/authorize", post(authorize))
        .route("/callback", get(callback))
        .route("/auth/cancel", post(cancel))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/status", get(status))
        .layer(middleware::from_fn(track_requests))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let started = Instant::now();
    let response = next.run(request).await;
    crate::metrics::record_request(
        &route,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

fn status_json(status: AuthStatus) -> Value {
    json!({
        "state": status.state.label(),
        "logged_in": status.logged_in(),
        "provider_authenticated": status.provider_authenticated,
        "federated": status.federated,
    })
}

fn outcome_json(outcome: &Outcome, status: AuthStatus) -> Value {
    let mut body = status_json(status);
    body["state"] = json!(outcome.state.label());
    body["warnings"] = warnings_json(&outcome.warnings);
    body
}

fn warnings_json(warnings: &[AuthError]) -> Value {
    warnings.iter().map(|w| json!(w.to_string())).collect()
}

fn transition_response(
    coordinator: &AuthCoordinator,
    result: TransitionResult,
) -> Result<Json<Value>, ApiError> {
    match result {
        Ok(outcome) => Ok(Json(outcome_json(&outcome, coordinator.status()))),
        Err(e) => Err(ApiError::new(e, coordinator.state())),
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.coordinator.status();
    Json(json!({
        "status": "healthy",
        "state": status.state.label(),
        "logged_in": status.logged_in(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

async fn metrics_text(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

async fn authorize(State(state): State<AppState>) -> impl IntoResponse {
    let request = state.coordinator.begin_login();
    info!("authorization started");
    Json(json!({
        "authorization_url": request.value.url.as_str(),
        "code_challenge_method": request.value.code_challenge_method.as_str(),
        "scopes": request.value.scopes,
        "warnings": request
            .warnings
            .iter()
            .map(|w| w.to_string())
            .collect::<Vec<_>>(),
    }))
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .coordinator
        .complete_login(params.code.as_deref(), params.error.as_deref())
        .await;
    transition_response(&state.coordinator, result)
}

/// Cancel always reports `UserCanceled`; here that is the requested outcome.
async fn cancel(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    match state.coordinator.cancel_authorization().await {
        Err(AuthError::UserCanceled) => {
            let mut body = status_json(state.coordinator.status());
            body["canceled"] = json!(true);
            Ok(Json(body))
        }
        other => transition_response(&state.coordinator, other),
    }
}

async fn refresh(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let result = state.coordinator.refresh().await;
    transition_response(&state.coordinator, result)
}

async fn logout(State(state): State<AppState>) -> Json<Value> {
    let outcome = state.coordinator.logout().await;
    Json(outcome_json(&outcome, state.coordinator.status()))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(status_json(state.coordinator.status()))
}
