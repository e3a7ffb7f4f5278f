//! Authorization code exchange
//!
//! Server-to-server POST to the token endpoint. The `redirect_uri` must be the
//! same one used on the authorize redirect or the provider rejects the grant.

use serde::Deserialize;
use tracing::debug;

use crate::ClientConfig;
use crate::error::{Error, Result};

/// Successful token endpoint response. Only `access_token` is needed by the
/// relay; the rest is kept for logging and future use.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Exchange an authorization code for tokens.
///
/// A non-2xx answer or a body without an access token is an error; the
/// provider's body text is carried in the error for the error page.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &ClientConfig,
    code: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(&config.endpoints.token)
        .timeout(config.timeout)
        .form(&[
            ("code", code),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.expose().as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let token = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))?;

    if token.access_token.is_empty() {
        return Err(Error::MissingAccessToken);
    }

    debug!(
        expires_in = ?token.expires_in,
        scope = ?token.scope,
        "authorization code exchanged"
    );
    Ok(token)
}
