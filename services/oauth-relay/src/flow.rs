//! Browser-driven login: redirect to the identity provider and handle its callback
//!
//! `GET /api/google-auth` binds a fresh `state` to the browser through the
//! session cookie and redirects to the consent screen. `GET /api/google-callback`
//! checks that state, exchanges the code, looks up the user and parks the
//! identity under a 6-digit verification code shown on the success page.

use axum::extract::{Query, State};
use axum::http::header::{LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use tracing::{info, warn};

use common::Secret;
use google_auth::{ClientConfig, build_authorization_url, exchange_code, fetch_userinfo};
use verification_store::Identity;

use crate::AppState;
use crate::error::{Error, Result};
use crate::metrics::timed;
use crate::pages;
use crate::session::{clear_cookie, session_cookie, session_id_from_headers};

/// Query parameters the provider appends to the redirect URI.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

fn oauth_client(state: &AppState) -> Result<&ClientConfig> {
    state.oauth.as_deref().ok_or_else(|| {
        Error::ConfigMissing(state.report.first_missing().unwrap_or("GOOGLE_CLIENT_ID"))
    })
}

/// GET /api/google-auth
pub async fn google_auth(State(state): State<AppState>) -> Response {
    let production = state.production;
    let oauth = match oauth_client(&state) {
        Ok(oauth) => oauth,
        Err(e) => return e.into_html_response(production),
    };

    let (session_id, csrf_state) = state.sessions.begin().await;
    let url = match build_authorization_url(oauth, &csrf_state) {
        Ok(url) => url,
        Err(e) => return Error::from(e).into_html_response(production),
    };

    info!("redirecting browser to identity provider");
    (
        StatusCode::FOUND,
        [
            (LOCATION, url),
            (SET_COOKIE, session_cookie(&session_id, production)),
        ],
    )
        .into_response()
}

/// GET /api/google-callback
pub async fn google_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    let production = state.production;

    // The session is single-use whatever the outcome
    let expected_state = match session_id_from_headers(&headers) {
        Some(id) => state.sessions.finish(&id).await,
        None => None,
    };
    let clear = [(SET_COOKIE, clear_cookie(production))];

    match complete_login(&state, expected_state, params).await {
        Ok(page) => (clear, Html(page)).into_response(),
        Err(e) => (clear, e.into_html_response(production)).into_response(),
    }
}

async fn complete_login(
    state: &AppState,
    expected_state: Option<String>,
    params: CallbackParams,
) -> Result<String> {
    if let Some(error) = params.error {
        let reason = match params.error_description {
            Some(description) => format!("{error}: {description}"),
            None => error,
        };
        return Err(Error::ProviderDenied(reason));
    }

    match (expected_state.as_deref(), params.state.as_deref()) {
        (Some(expected), Some(received)) if expected == received => {}
        (None, _) => {
            warn!("callback without a live login session");
            return Err(Error::InvalidState);
        }
        _ => return Err(Error::InvalidState),
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or(Error::MissingCode)?;
    let oauth = oauth_client(state)?;

    let token = timed("token", exchange_code(&state.http, oauth, &code)).await?;
    let user = timed(
        "userinfo",
        fetch_userinfo(&state.http, oauth, &token.access_token),
    )
    .await?;

    let email = user.email.trim().to_string();
    let display_name = match user.name.trim() {
        "" => email.clone(),
        name => name.to_string(),
    };
    let identity = Identity {
        email: email.clone(),
        display_name: display_name.clone(),
        picture_url: user.picture,
        provider_access_token: Secret::new(token.access_token),
    };

    let code = state.store.put_fresh(identity, state.code_ttl).await?;
    if state.production {
        info!(email = %email, "verification code issued");
    } else {
        info!(email = %email, code = %code, "verification code issued");
    }

    Ok(pages::success_page(&email, &display_name, &code, state.code_ttl))
}
