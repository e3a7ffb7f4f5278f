//! Service-specific error types
//!
//! Every failure a request can end in is one variant here. Handlers return
//! `Result<_, Error>` and the request boundary turns the error into a status
//! code plus a JSON body (verify endpoint) or an HTML page (browser flow).

use admin_api::ExistingUser;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::pages;

/// Relay request errors.
#[derive(Error, Debug)]
pub enum Error {
    /// OAuth client settings absent (development mode only; production
    /// refuses to start).
    #[error("OAuth client is not configured: {0} is missing")]
    ConfigMissing(&'static str),

    /// The identity provider returned an error or an unusable response.
    #[error("identity provider error: {0}")]
    Provider(String),

    /// The user declined consent or the provider redirected back with `error`.
    #[error("Google sign-in was not completed: {0}")]
    ProviderDenied(String),

    #[error("Invalid state token")]
    InvalidState,

    #[error("No authorization code received")]
    MissingCode,

    #[error("verification code rejected (expired: {expired})")]
    CodeNotFoundOrExpired { expired: bool },

    /// The admin service could not be reached or answered garbage.
    #[error("admin service unavailable: {0}")]
    DownstreamUnavailable(String),

    /// The admin service answered with a status the relay cannot act on.
    #[error("{0}")]
    DownstreamRejected(String),

    /// Device is not eligible for another account.
    #[error("{message}")]
    RegistrationDenied {
        message: String,
        existing_user: ExistingUser,
    },

    #[error("{0}")]
    LoginRejected(String),

    #[error("{0}")]
    RegistrationRejected(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::ProviderDenied(_)
            | Error::InvalidState
            | Error::MissingCode
            | Error::CodeNotFoundOrExpired { .. }
            | Error::RegistrationDenied { .. }
            | Error::LoginRejected(_)
            | Error::RegistrationRejected(_)
            | Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::ConfigMissing(_)
            | Error::Provider(_)
            | Error::DownstreamUnavailable(_)
            | Error::DownstreamRejected(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the end user.
    pub fn public_message(&self) -> String {
        match self {
            Error::ConfigMissing(_) => "Google sign-in is not configured on this server".into(),
            Error::Provider(_) => "Google sign-in failed. Please try again.".into(),
            Error::CodeNotFoundOrExpired { expired: false } => "Invalid verification code".into(),
            Error::CodeNotFoundOrExpired { expired: true } => {
                "Verification code has expired. Please sign in again.".into()
            }
            Error::DownstreamUnavailable(_) => {
                "Unable to reach the account server. Please try again later.".into()
            }
            Error::Internal(_) => "Internal server error".into(),
            other => other.to_string(),
        }
    }

    /// Internal detail that only development mode exposes to clients.
    fn detail(&self) -> Option<String> {
        match self {
            Error::ConfigMissing(name) => Some(format!("{name} is not set")),
            Error::Provider(detail)
            | Error::DownstreamUnavailable(detail)
            | Error::Internal(detail) => Some(detail.clone()),
            _ => None,
        }
    }

    /// Log at a level matching who is at fault.
    pub fn log(&self) {
        if self.status().is_server_error() {
            error!(error = %self, "request failed");
        } else {
            warn!(error = %self, "request rejected");
        }
    }

    /// `{success: false, message, existing_user?}` with the mapped status.
    /// Development mode adds `detail` for infrastructure errors.
    pub fn into_json_response(self, production: bool) -> Response {
        self.log();
        let mut body = json!({
            "success": false,
            "message": self.public_message(),
        });
        if let Error::RegistrationDenied { existing_user, .. } = &self {
            body["existing_user"] = json!({
                "name": existing_user.name,
                "email": existing_user.email,
            });
        }
        if !production && let Some(detail) = self.detail() {
            body["detail"] = json!(detail);
        }
        (self.status(), Json(body)).into_response()
    }

    /// Response for the browser-facing callback: protocol violations are
    /// plain text, everything else an HTML error page.
    pub fn into_html_response(self, production: bool) -> Response {
        self.log();
        let status = self.status();
        match self {
            Error::InvalidState | Error::MissingCode => (status, self.to_string()).into_response(),
            _ => {
                let mut message = self.public_message();
                if !production && let Some(detail) = self.detail() {
                    message = format!("{message} ({detail})");
                }
                (status, Html(pages::error_page("Sign-in failed", &message))).into_response()
            }
        }
    }
}

impl From<verification_store::StoreError> for Error {
    fn from(e: verification_store::StoreError) -> Self {
        use verification_store::StoreError;
        match e {
            StoreError::NotFound => Error::CodeNotFoundOrExpired { expired: false },
            StoreError::Expired => Error::CodeNotFoundOrExpired { expired: true },
            StoreError::DuplicateCode => {
                Error::Internal("could not allocate a unique verification code".into())
            }
        }
    }
}

impl From<google_auth::Error> for Error {
    fn from(e: google_auth::Error) -> Self {
        Error::Provider(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn protocol_and_business_errors_are_400() {
        for err in [
            Error::ProviderDenied("access_denied".into()),
            Error::InvalidState,
            Error::MissingCode,
            Error::CodeNotFoundOrExpired { expired: true },
            Error::LoginRejected("no".into()),
            Error::RegistrationRejected("no".into()),
            Error::BadRequest("no".into()),
        ] {
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "{err:?}");
        }
    }

    #[test]
    fn infrastructure_errors_are_500() {
        for err in [
            Error::ConfigMissing("GOOGLE_CLIENT_ID"),
            Error::Provider("bad".into()),
            Error::DownstreamUnavailable("refused".into()),
            Error::DownstreamRejected("Admin server error: 502".into()),
            Error::Internal("boom".into()),
        ] {
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR, "{err:?}");
        }
    }

    #[test]
    fn store_errors_map_to_user_messages() {
        let not_found: Error = verification_store::StoreError::NotFound.into();
        assert_eq!(not_found.public_message(), "Invalid verification code");

        let expired: Error = verification_store::StoreError::Expired.into();
        assert_eq!(
            expired.public_message(),
            "Verification code has expired. Please sign in again."
        );
    }

    #[tokio::test]
    async fn production_hides_internal_detail() {
        let err = Error::DownstreamUnavailable("connect error: 10.0.0.5:443".into());
        let response = err.into_json_response(true);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body.get("detail").is_none());
        assert!(!body.to_string().contains("10.0.0.5"));
    }

    #[tokio::test]
    async fn development_includes_detail() {
        let err = Error::Provider("token endpoint returned 400".into());
        let body = body_json(err.into_json_response(false)).await;
        assert_eq!(body["detail"], "token endpoint returned 400");
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn state_mismatch_is_plain_text() {
        let response = Error::InvalidState.into_html_response(true);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(
            response.headers()[axum::http::header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
        assert_eq!(body_text(response).await, "Invalid state token");
    }

    #[tokio::test]
    async fn provider_failure_is_escaped_html() {
        let response =
            Error::ProviderDenied("<script>x</script>".into()).into_html_response(true);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let page = body_text(response).await;
        assert!(page.contains("&lt;script&gt;x&lt;/script&gt;"));
        assert!(!page.contains("<script>"));
    }

    #[tokio::test]
    async fn html_detail_only_in_development() {
        let prod = Error::Provider("token endpoint returned 400".into()).into_html_response(true);
        assert_eq!(prod.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body_text(prod).await.contains("returned 400"));

        let dev = Error::Provider("token endpoint returned 400".into()).into_html_response(false);
        assert!(body_text(dev).await.contains("returned 400"));
    }

    #[tokio::test]
    async fn denial_carries_existing_user() {
        let err = Error::RegistrationDenied {
            message: "This device already has an account".into(),
            existing_user: ExistingUser {
                name: "Ana".into(),
                email: "ana@example.com".into(),
            },
        };
        let response = err.into_json_response(true);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["message"], "This device already has an account");
        assert_eq!(body["existing_user"]["email"], "ana@example.com");
        assert_eq!(body["existing_user"]["name"], "Ana");
    }
}
