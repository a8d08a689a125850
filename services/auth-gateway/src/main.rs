//! Federated login gateway
//!
//! Single-binary Rust service that:
//! 1. Loads config and opens the secret store
//! 2. Builds the provider flow, federation client and login coordinator
//! 3. Keeps the session fresh with a background refresh task
//! 4. Serves a loopback API for login, logout and status

mod api;
mod config;
mod error;
mod metrics;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use auth_coordinator::{AuthCoordinator, spawn_refresh_task};
use federation::{HttpFederationClient, IdentityFederation};
use provider_auth::{ExpiryClock, OAuthFlowManager, SystemClock};
use secret_store::{FileSecretStore, MemorySecretStore, SecretStore};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::config::{Config, StoreBackend};

/// Time allowed for in-flight requests after a shutdown signal
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting auth-gateway");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        token_endpoint = %config.provider.token_endpoint,
        store = ?config.store.backend,
        api_key = config.federation.api_key.is_some(),
        "configuration loaded"
    );

    let store = open_store(&config)?;
    let http = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .context("failed to build HTTP client")?;

    let flow = OAuthFlowManager::new(
        config.provider_config()?,
        http.clone(),
        store.clone(),
        ExpiryClock::new(config.refresh_margin(), Arc::new(SystemClock)),
    );
    let federation: Arc<dyn IdentityFederation> = Arc::new(HttpFederationClient::new(
        config.federation_config()?,
        http,
        store,
    ));
    let coordinator = Arc::new(AuthCoordinator::new(Arc::new(flow), federation));
    info!(state = coordinator.state().label(), "session restored");

    let refresh_task = spawn_refresh_task(coordinator.clone(), config.refresh_interval());

    let app = api::build_router(
        AppState {
            coordinator,
            prometheus: prometheus_handle,
            started_at: Instant::now(),
        },
        config.server.max_connections,
    );

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts at signal receipt, not at server start.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    refresh_task.abort();
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Open the configured secret store backend.
fn open_store(config: &Config) -> Result<Arc<dyn SecretStore>> {
    let store: Arc<dyn SecretStore> = match config.store.backend {
        StoreBackend::File => Arc::new(
            FileSecretStore::open(config.store.path.clone()).with_context(|| {
                format!(
                    "failed to open secret store at {}",
                    config.store.path.display()
                )
            })?,
        ),
        StoreBackend::Memory => {
            warn!("memory secret store: sessions will not survive a restart");
            Arc::new(MemorySecretStore::new())
        }
        #[cfg(feature = "keyring")]
        StoreBackend::Keyring => Arc::new(secret_store::KeyringSecretStore::new(
            config.store.service_name.clone(),
        )),
        #[cfg(not(feature = "keyring"))]
        StoreBackend::Keyring => anyhow::bail!(
            "store backend \"keyring\" (service {}) requires building with --features keyring",
            config.store.service_name
        ),
    };
    Ok(store)
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parsed without `Config::load` so no environment variable is read.
    fn config_with_store(store: &str) -> Config {
        toml::from_str(&format!(
            r#"
[provider]
client_id = "client-123"
redirect_uri = "http://127.0.0.1:8080/callback"

[federation]
function_url = "http://127.0.0.1:9001/fn"
session_url = "http://127.0.0.1:9001/session"

[store]
{store}
"#
        ))
        .unwrap()
    }

    #[test]
    fn file_store_is_opened_at_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = dir.path().join("secrets.json");
        let config = config_with_store(&format!("backend = \"file\"\npath = \"{}\"", secrets.display()));
        let store = open_store(&config).unwrap();
        store.save("marker", b"value").unwrap();
        assert_eq!(store.load_string("marker").as_deref(), Some("value"));
        assert!(secrets.exists());
    }

    #[test]
    fn memory_store_starts_empty() {
        let config = config_with_store("backend = \"memory\"");
        let store = open_store(&config).unwrap();
        assert!(!store.contains(provider_auth::ACCESS_TOKEN_KEY));
    }

    #[cfg(not(feature = "keyring"))]
    #[test]
    fn keyring_without_feature_is_rejected() {
        let config = config_with_store("backend = \"keyring\"");
        let err = open_store(&config).err().unwrap().to_string();
        assert!(err.contains("--features keyring"), "got: {err}");
    }
}
