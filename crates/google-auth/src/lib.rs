//! Google OAuth authorization-code client
//!
//! Covers the three provider interactions the relay needs:
//! 1. Build the consent URL the browser is redirected to (`authorize`)
//! 2. Exchange the returned authorization code for an access token (`token`)
//! 3. Fetch the signed-in user's email, name and picture (`userinfo`)
//!
//! Endpoints are configurable so tests (and other OIDC-compatible providers)
//! can point the client elsewhere; defaults are Google's public endpoints.

pub mod authorize;
pub mod constants;
pub mod error;
pub mod token;
pub mod userinfo;

use std::time::Duration;

use common::Secret;

pub use authorize::build_authorization_url;
pub use constants::*;
pub use error::{Error, Result};
pub use token::{TokenResponse, exchange_code};
pub use userinfo::{UserInfo, fetch_userinfo};

/// Provider endpoint URLs.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub authorize: String,
    pub token: String,
    pub userinfo: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authorize: AUTHORIZE_ENDPOINT.to_string(),
            token: TOKEN_ENDPOINT.to_string(),
            userinfo: USERINFO_ENDPOINT.to_string(),
        }
    }
}

/// Registered OAuth client application plus the endpoints it talks to.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoints: Endpoints,
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// Must be byte-identical between the authorize redirect and the token exchange.
    pub redirect_uri: String,
    /// Per-request timeout for token and userinfo calls.
    pub timeout: Duration,
}
