//! Consent-screen URL construction
//!
//! The browser is sent here at the start of a login attempt. Offline access
//! with forced consent is requested so the provider always shows the account
//! chooser, even for users who approved the app before.

use reqwest::Url;

use crate::constants::SCOPES;
use crate::error::{Error, Result};
use crate::ClientConfig;

/// Build the authorization URL for a login attempt bound to `state`.
///
/// Query values are percent-encoded, so redirect URIs containing `:`/`/`/`?`
/// survive intact.
pub fn build_authorization_url(config: &ClientConfig, state: &str) -> Result<String> {
    let url = Url::parse_with_params(
        &config.endpoints.authorize,
        &[
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", SCOPES),
            ("state", state),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| Error::InvalidEndpoint(format!("{}: {e}", config.endpoints.authorize)))?;
    Ok(url.into())
}
