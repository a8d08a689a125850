//! Configuration and file loading errors

use thiserror::Error;

/// Errors raised while loading gateway configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_the_offending_field() {
        let err = Error::Config("provider.client_id must not be empty".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: provider.client_id must not be empty"
        );
    }

    #[test]
    fn io_error_is_converted_with_prefix() {
        let err: Error =
            std::io::Error::new(std::io::ErrorKind::NotFound, "config missing").into();
        assert!(err.to_string().starts_with("I/O error:"), "got: {err}");
    }

    #[test]
    fn toml_error_is_converted() {
        let parse: std::result::Result<toml::Table, _> = toml::from_str("not = [valid");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Toml(_)));
    }
}
