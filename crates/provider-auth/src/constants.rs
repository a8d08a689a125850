//! Provider OAuth constants
//!
//! Public client defaults for the music provider's accounts service. None of
//! these are secrets; the tokens they yield are kept in the secret store.

use std::time::Duration;

/// Authorization endpoint presented in the browser
pub const AUTHORIZE_ENDPOINT: &str = "https://accounts.spotify.com/authorize";

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://accounts.spotify.com/api/token";

/// Scopes requested by default. Playback control needs the `user-*-playback-*`
/// pair; `streaming` is required by the in-app player.
pub const DEFAULT_SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "playlist-read-private",
    "playlist-modify-private",
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
    "streaming",
];

/// Lifetime assumed when the token endpoint omits `expires_in`
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Refresh this long before the provider's own expiry boundary
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(30);

/// Generated PKCE verifier length (RFC 7636 allows 43..=128)
pub const VERIFIER_LEN: usize = 128;

/// Secret store key for the provider access token
pub const ACCESS_TOKEN_KEY: &str = "provider.access_token";

/// Secret store key for the provider refresh token
pub const REFRESH_TOKEN_KEY: &str = "provider.refresh_token";

/// Secret store key for the absolute expiry (unix millis, decimal string)
pub const TOKEN_EXPIRY_KEY: &str = "provider.token_expiry";

/// Secret store key for the in-flight PKCE verifier
pub const PKCE_VERIFIER_KEY: &str = "provider.pkce_verifier";
