//! Redirect callback parsing
//!
//! The provider sends the browser back to `<scheme>://<host>?code=...` on
//! consent, or `?error=...` when the user declined. Custom app schemes are
//! accepted as-is.

use url::Url;

use crate::error::{Error, Result};

/// Provider error code for a declined consent screen.
const ACCESS_DENIED: &str = "access_denied";

/// Extract the authorization code from a full redirect URL.
pub fn parse_callback(redirect: &str) -> Result<String> {
    let url = Url::parse(redirect)
        .map_err(|e| Error::InvalidCallback(format!("unparseable redirect URL: {e}")))?;

    let mut code = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    code_from_params(code.as_deref(), error.as_deref())
}

/// Interpret already-split callback query parameters.
///
/// An `error` wins over a `code` if the provider sent both.
pub fn code_from_params(code: Option<&str>, error: Option<&str>) -> Result<String> {
    match (error, code) {
        (Some(ACCESS_DENIED), _) => Err(Error::UserCanceled),
        (Some(other), _) => Err(Error::InvalidCallback(format!("provider returned error: {other}"))),
        (None, Some(code)) if !code.is_empty() => Ok(code.to_string()),
        (None, _) => Err(Error::InvalidCallback("redirect is missing the code parameter".into())),
    }
}
