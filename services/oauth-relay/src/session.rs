//! Per-browser OAuth state
//!
//! Initiate stores a random `state` under an opaque session id that the
//! browser carries back in a cookie; callback removes it and compares. Entries
//! are single-use and expire after `SESSION_TTL`; expired entries are dropped
//! lazily whenever a new flow starts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "relay_session";

/// How long a login attempt may take between initiate and callback.
pub const SESSION_TTL: Duration = Duration::from_secs(600);

const TOKEN_BYTES: usize = 32;

struct PendingState {
    state: String,
    created_at: Instant,
}

/// Server-side map from session id to the expected OAuth `state`.
#[derive(Clone, Default)]
pub struct SessionStore {
    states: Arc<Mutex<HashMap<String, PendingState>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a login attempt. Returns `(session_id, state)`.
    pub async fn begin(&self) -> (String, String) {
        let session_id = common::random_token(TOKEN_BYTES);
        let state = common::random_token(TOKEN_BYTES);

        let mut states = self.states.lock().await;
        // Lazy cleanup: remove expired entries while holding the lock
        let before = states.len();
        states.retain(|_, s| s.created_at.elapsed() < SESSION_TTL);
        if states.len() < before {
            debug!(removed = before - states.len(), "dropped stale OAuth sessions");
        }
        states.insert(
            session_id.clone(),
            PendingState {
                state: state.clone(),
                created_at: Instant::now(),
            },
        );

        (session_id, state)
    }

    /// Remove the session and return its expected state, if it is still live.
    pub async fn finish(&self, session_id: &str) -> Option<String> {
        let pending = self.states.lock().await.remove(session_id)?;
        (pending.created_at.elapsed() < SESSION_TTL).then_some(pending.state)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.states.lock().await.len()
    }
}

/// `Set-Cookie` value binding the browser to `session_id`.
pub fn session_cookie(session_id: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={session_id}; Path=/api; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_TTL.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_cookie(secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; Path=/api; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Extract the session id from the request's `Cookie` headers.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
