//! Provider client configuration

use url::Url;

use crate::constants::DEFAULT_SCOPES;

/// PKCE code challenge method. Only S256 is ever sent; `plain` is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeChallengeMethod {
    S256,
}

impl CodeChallengeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeChallengeMethod::S256 => "S256",
        }
    }
}

/// Public OAuth client settings for the provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub authorize_endpoint: Url,
    pub token_endpoint: Url,
    pub redirect_uri: String,
    /// Requested scopes, joined with spaces in the authorization URL
    pub scopes: Vec<String>,
    /// Force the consent dialog even if the user already approved the app
    pub show_dialog: bool,
}

impl ProviderConfig {
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        authorize_endpoint: Url,
        token_endpoint: Url,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            authorize_endpoint,
            token_endpoint,
            redirect_uri: redirect_uri.into(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            show_dialog: false,
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Space-joined scope string as sent to the provider.
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}
