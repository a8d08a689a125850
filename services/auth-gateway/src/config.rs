//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The federation api_key is loaded from FEDERATION_API_KEY env var or
//! api_key_file, never stored in the TOML directly to avoid leaking secrets.

use common::Secret;
use federation::FederationConfig;
use provider_auth::{AUTHORIZE_ENDPOINT, DEFAULT_SCOPES, ProviderConfig, TOKEN_ENDPOINT};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Env var holding the federation API key
const API_KEY_ENV: &str = "FEDERATION_API_KEY";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub provider: ProviderSection,
    pub federation: FederationSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub server: ServerSection,
}

/// Public OAuth client settings
#[derive(Debug, Deserialize)]
pub struct ProviderSection {
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default = "default_authorize_endpoint")]
    pub authorize_endpoint: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub show_dialog: bool,
}

/// Token function and session sign-in endpoints
#[derive(Debug, Deserialize)]
pub struct FederationSection {
    pub function_url: String,
    pub session_url: String,
    #[serde(skip)]
    pub api_key: Option<Secret<String>>,
    /// Path to a file containing the API key (alternative to FEDERATION_API_KEY)
    #[serde(default)]
    pub api_key_file: Option<PathBuf>,
}

/// Where secrets live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    File,
    Memory,
    Keyring,
}

#[derive(Debug, Deserialize)]
pub struct StoreSection {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Secret file for the `file` backend
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Keychain service name for the `keyring` backend
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            service_name: default_service_name(),
        }
    }
}

/// Loopback API settings
#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Timeout for every outbound HTTP call (token endpoint, federation)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Refresh this long before the provider token expires
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            timeout_secs: default_timeout(),
            max_connections: default_max_connections(),
            refresh_interval_secs: default_refresh_interval(),
            refresh_margin_secs: default_refresh_margin(),
        }
    }
}

fn default_authorize_endpoint() -> String {
    AUTHORIZE_ENDPOINT.to_string()
}

fn default_token_endpoint() -> String {
    TOKEN_ENDPOINT.to_string()
}

fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("auth-gateway-secrets.json")
}

fn default_service_name() -> String {
    "auth-gateway".into()
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    64
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_refresh_margin() -> u64 {
    30
}

/// Parse an endpoint and require an http(s) scheme.
fn http_url(field: &str, value: &str) -> common::Result<Url> {
    let url = Url::parse(value)
        .map_err(|e| common::Error::Config(format!("{field} is not a valid URL ({e}): {value}")))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(common::Error::Config(format!(
            "{field} must start with http:// or https://, got: {value}"
        )));
    }
    Ok(url)
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// API key resolution order:
    /// 1. FEDERATION_API_KEY env var
    /// 2. api_key_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;

        // Resolve API key: env var takes precedence over file
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            config.federation.api_key = Some(Secret::new(key));
        } else if let Some(ref key_file) = config.federation.api_key_file {
            let key = std::fs::read_to_string(key_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read api_key_file {}: {e}",
                    key_file.display()
                ))
            })?;
            let key = key.trim().to_owned();
            if !key.is_empty() {
                config.federation.api_key = Some(Secret::new(key));
            }
        }

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.provider.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }
        if self.provider.redirect_uri.trim().is_empty() {
            return Err(common::Error::Config("redirect_uri must not be empty".into()));
        }
        if self.provider.scopes.is_empty() {
            return Err(common::Error::Config("scopes must not be empty".into()));
        }
        http_url("authorize_endpoint", &self.provider.authorize_endpoint)?;
        http_url("token_endpoint", &self.provider.token_endpoint)?;
        http_url("function_url", &self.federation.function_url)?;
        http_url("session_url", &self.federation.session_url)?;

        if self.server.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.server.refresh_interval_secs == 0 {
            return Err(common::Error::Config(
                "refresh_interval_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Provider client settings for the flow manager.
    pub fn provider_config(&self) -> common::Result<ProviderConfig> {
        let provider = &self.provider;
        let mut config = ProviderConfig::new(
            provider.client_id.clone(),
            provider.redirect_uri.clone(),
            http_url("authorize_endpoint", &provider.authorize_endpoint)?,
            http_url("token_endpoint", &provider.token_endpoint)?,
        )
        .with_scopes(provider.scopes.iter().cloned());
        config.show_dialog = provider.show_dialog;
        Ok(config)
    }

    /// Federation client settings.
    pub fn federation_config(&self) -> common::Result<FederationConfig> {
        Ok(FederationConfig {
            function_url: http_url("function_url", &self.federation.function_url)?,
            session_url: http_url("session_url", &self.federation.session_url)?,
            api_key: self.federation.api_key.clone(),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.server.refresh_interval_secs)
    }

    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.server.refresh_margin_secs)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("auth-gateway.toml")
    }
}
