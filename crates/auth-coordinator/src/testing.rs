//! Mock provider and federation backends for coordinator tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::extract::Form;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use federation::{FederationConfig, HttpFederationClient, IdentityFederation};
use provider_auth::{ExpiryClock, ManualClock, OAuthFlowManager, ProviderConfig};
use secret_store::{MemorySecretStore, SecretStore, StorageError};
use tokio::net::TcpListener;
use url::Url;

use crate::coordinator::AuthCoordinator;
use crate::state::{Alert, AuthObserver, LoginState};

pub const NOW: u64 = 1_700_000_000_000;

/// Canned behavior for the mock token endpoint and federation backend.
#[derive(Clone)]
pub struct Backend {
    pub exchange_status: u16,
    pub refresh_status: u16,
    pub refresh_expires_in: u64,
    pub token_delay: Duration,
    /// `details.code` returned by the token function instead of a token
    pub federation_error: Option<&'static str>,
    /// Point the federation client at a port nobody listens on.
    pub federation_unreachable: bool,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            exchange_status: 200,
            refresh_status: 200,
            refresh_expires_in: 3600,
            token_delay: Duration::ZERO,
            federation_error: None,
            federation_unreachable: false,
        }
    }
}

/// Memory store with switchable failures.
#[derive(Default)]
pub struct TestStore {
    inner: MemorySecretStore,
    fail_deletes: AtomicBool,
    fail_saves_of: Mutex<Option<&'static str>>,
}

impl TestStore {
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_saves_of(&self, key: Option<&'static str>) {
        *self.fail_saves_of.lock().unwrap() = key;
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl SecretStore for TestStore {
    fn save(&self, key: &str, value: &[u8]) -> secret_store::Result<()> {
        if *self.fail_saves_of.lock().unwrap() == Some(key) {
            return Err(StorageError::Io(format!("refusing to write {key}")));
        }
        self.inner.save(key, value)
    }

    fn load(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.load(key)
    }

    fn delete(&self, key: &str) -> secret_store::Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("refusing to delete {key}")));
        }
        self.inner.delete(key)
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    states: Mutex<Vec<LoginState>>,
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<LoginState> {
        self.states.lock().unwrap().clone()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

impl AuthObserver for RecordingObserver {
    fn on_state_changed(&self, state: LoginState) {
        self.states.lock().unwrap().push(state);
    }

    fn on_alert(&self, alert: &Alert) {
        self.alerts.lock().unwrap().push(alert.clone());
    }
}

pub struct Harness {
    pub coordinator: Arc<AuthCoordinator>,
    pub store: Arc<TestStore>,
    pub clock: Arc<ManualClock>,
    pub token_hits: Arc<AtomicUsize>,
    pub federation_hits: Arc<AtomicUsize>,
    base: Url,
    federation_base: Url,
}

impl Harness {
    /// Start the mock backend and build a coordinator against it.
    pub async fn start(backend: Backend) -> Self {
        let token_hits = Arc::new(AtomicUsize::new(0));
        let federation_hits = Arc::new(AtomicUsize::new(0));
        let federation_unreachable = backend.federation_unreachable;
        let base = start_backend(backend, token_hits.clone(), federation_hits.clone()).await;
        let federation_base = if federation_unreachable {
            unreachable_base().await
        } else {
            base.clone()
        };
        let store = Arc::new(TestStore::default());
        let clock = Arc::new(ManualClock::new(NOW));

        let coordinator = Arc::new(build(&base, &federation_base, store.clone(), clock.clone()));
        Self {
            coordinator,
            store,
            clock,
            token_hits,
            federation_hits,
            base,
            federation_base,
        }
    }

    /// A fresh coordinator over the same store, as after a restart.
    pub fn rebuild(&self) -> AuthCoordinator {
        build(
            &self.base,
            &self.federation_base,
            self.store.clone(),
            self.clock.clone(),
        )
    }

    /// A fresh coordinator over the same store whose token endpoint and
    /// federation backend both refuse connections.
    pub async fn rebuild_offline(&self) -> AuthCoordinator {
        let offline = unreachable_base().await;
        build(&offline, &offline, self.store.clone(), self.clock.clone())
    }

    pub fn observe(&self) -> Arc<RecordingObserver> {
        let observer = Arc::new(RecordingObserver::default());
        self.coordinator.add_observer(observer.clone());
        observer
    }
}

/// Base URL of a port that was bound and released, so connects are refused.
async fn unreachable_base() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}/")).unwrap()
}

fn build(
    base: &Url,
    federation_base: &Url,
    store: Arc<TestStore>,
    clock: Arc<ManualClock>,
) -> AuthCoordinator {
    let http = reqwest::Client::new();
    let config = ProviderConfig::new(
        "client-1",
        "tempo://spotify-callback",
        base.join("authorize").unwrap(),
        base.join("api/token").unwrap(),
    );
    let flow = OAuthFlowManager::new(
        config,
        http.clone(),
        store.clone(),
        ExpiryClock::new(Duration::from_secs(30), clock),
    );
    let federation: Arc<dyn IdentityFederation> = Arc::new(HttpFederationClient::new(
        FederationConfig {
            function_url: federation_base.join("fn").unwrap(),
            session_url: federation_base.join("session").unwrap(),
            api_key: None,
        },
        http,
        store,
    ));
    AuthCoordinator::new(Arc::new(flow), federation)
}

async fn start_backend(
    backend: Backend,
    token_hits: Arc<AtomicUsize>,
    federation_hits: Arc<AtomicUsize>,
) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let federation_error = backend.federation_error;
    let token_backend = backend;
    let token = move |Form(form): Form<HashMap<String, String>>| {
        let backend = token_backend.clone();
        let hits = token_hits.clone();
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(backend.token_delay).await;
            let grant = form.get("grant_type").cloned().unwrap_or_default();
            let (status, body) = if grant == "authorization_code" {
                (
                    backend.exchange_status,
                    serde_json::json!({
                        "access_token": "at_authorization_code",
                        "token_type": "Bearer",
                        "expires_in": 3600,
                        "refresh_token": "rt_1",
                    }),
                )
            } else {
                (
                    backend.refresh_status,
                    serde_json::json!({
                        "access_token": "at_refresh_token",
                        "token_type": "Bearer",
                        "expires_in": backend.refresh_expires_in,
                    }),
                )
            };
            if status == 200 {
                Json(body).into_response()
            } else {
                (
                    StatusCode::from_u16(status).unwrap(),
                    Json(serde_json::json!({"error": "invalid_grant"})),
                )
                    .into_response()
            }
        }
    };

    let function = move |Json(body): Json<serde_json::Value>| {
        let hits = federation_hits.clone();
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            match federation_error {
                Some(code) => (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"error": {
                        "status": "UNAUTHENTICATED",
                        "message": format!("rejected: {code}"),
                        "details": {"code": code},
                    }})),
                )
                    .into_response(),
                None => {
                    let provider_token = body["data"]["providerAccessToken"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string();
                    Json(serde_json::json!({"result": {"token": format!("ct_{provider_token}")}}))
                        .into_response()
                }
            }
        }
    };

    let session = |Json(body): Json<serde_json::Value>| async move {
        Json(serde_json::json!({
            "localId": "user-1",
            "idToken": format!("session_{}", body["token"].as_str().unwrap_or_default()),
        }))
    };

    tokio::spawn(async move {
        let app = axum::Router::new()
            .route("/api/token", axum::routing::post(token))
            .route("/fn", axum::routing::post(function))
            .route("/session", axum::routing::post(session));
        axum::serve(listener, app).await.unwrap();
    });

    Url::parse(&format!("http://{addr}/")).unwrap()
}
