//! Error types for identity-provider calls

/// Errors from the authorization-code exchange and userinfo lookup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("no access token in token response")]
    MissingAccessToken,

    #[error("userinfo request failed: {0}")]
    UserInfo(String),

    #[error("no email in userinfo response")]
    MissingEmail,

    #[error("invalid endpoint URL: {0}")]
    InvalidEndpoint(String),
}

/// Result alias for provider operations.
pub type Result<T> = std::result::Result<T, Error>;
