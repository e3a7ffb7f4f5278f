//! Configuration error types shared by the relay crates

use thiserror::Error;

/// Error raised while assembling configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required setting is absent in production mode. Carries the
    /// environment variable name so operators know what to set.
    #[error("Missing required configuration: {0}")]
    ConfigMissing(&'static str),

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
    fn error_display_includes_context() {
        let config_err = Error::Config("listen_addr is invalid".into());
        assert_eq!(
            config_err.to_string(),
            "Configuration error: listen_addr is invalid"
        );

        let missing = Error::ConfigMissing("GOOGLE_CLIENT_ID");
        assert_eq!(
            missing.to_string(),
            "Missing required configuration: GOOGLE_CLIENT_ID"
        );

        let io_err = Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        assert!(
            io_err.to_string().starts_with("I/O error:"),
            "got: {}",
            io_err
        );
    }

    #[test]
    fn error_debug_includes_variant() {
        let err = Error::ConfigMissing("GOOGLE_REDIRECT_URI");
        let debug = format!("{:?}", err);
        assert!(
            debug.contains("ConfigMissing"),
            "Debug should include variant name, got: {debug}"
        );
    }
}
