//! Signed-in user lookup via the userinfo endpoint

use serde::Deserialize;

use crate::ClientConfig;
use crate::error::{Error, Result};

/// Identity fields returned by the userinfo endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Fetch the user's identity with a bearer access token.
///
/// An identity without an email is useless to the relay (email is the
/// account key downstream), so it is reported as `MissingEmail`.
pub async fn fetch_userinfo(
    client: &reqwest::Client,
    config: &ClientConfig,
    access_token: &str,
) -> Result<UserInfo> {
    let response = client
        .get(&config.endpoints.userinfo)
        .timeout(config.timeout)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| Error::Http(format!("userinfo request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::UserInfo(format!(
            "userinfo endpoint returned {status}: {body}"
        )));
    }

    let info = response
        .json::<UserInfo>()
        .await
        .map_err(|e| Error::UserInfo(format!("invalid userinfo response: {e}")))?;

    if info.email.trim().is_empty() {
        return Err(Error::MissingEmail);
    }
    Ok(info)
}
