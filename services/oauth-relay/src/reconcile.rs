//! Redeeming a verification code against the admin service
//!
//! The code is consumed before any downstream call, so a code is redeemable at
//! most once even when the admin service later fails. From there:
//!
//! 1. ping the admin service (wakes a sleeping host; failure ignored)
//! 2. check the device; an unreachable service or non-200 answer means
//!    "treat as unregistered", an unreadable answer aborts
//! 3. an account on the device with the same email logs in again
//! 4. otherwise a new account is allowed only 24h after the last
//!    registration, while the device holds fewer than 2 accounts, and when
//!    the admin service has not explicitly refused it
//! 5. register and mint a local auth token

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{Instrument, debug, info, info_span, warn};

use admin_api::{
    AdminApi, AdminError, DeviceCheck, ExistingUser, LOGIN_METHOD, LoginRequest, RegisterRequest,
    same_email,
};
use verification_store::{Identity, VerificationStore};

use crate::AppState;
use crate::error::{Error, Result};
use crate::metrics::{Outcome, record_verification, timed};

/// Hours that must pass after a registration before the device may add another account.
pub const REGISTRATION_COOLDOWN_HOURS: f64 = 24.0;

/// Accounts a single device may ever hold.
pub const MAX_ACCOUNTS_PER_DEVICE: usize = 2;

const AUTH_TOKEN_BYTES: usize = 32;

/// Body of `POST /api/verify-google-auth`.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub auth_code: String,
    #[serde(default)]
    pub machine_id: String,
}

/// What to do with an identity on a given device.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Relogin,
    Register,
    Deny {
        reason: DenyReason,
        existing_user: ExistingUser,
        last_registered: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DenyReason {
    Cooldown { remaining_hours: f64 },
    AccountLimit,
    /// The admin service answered `can_register_again: false`.
    Refused,
}

/// Successful verification.
#[derive(Debug)]
pub enum Verified {
    Relogin {
        email: String,
        name: String,
        auth_token: String,
    },
    Registered {
        email: String,
        name: String,
        auth_token: String,
    },
}

impl Verified {
    fn outcome(&self) -> Outcome {
        match self {
            Verified::Relogin { .. } => Outcome::Relogin,
            Verified::Registered { .. } => Outcome::Registered,
        }
    }

    fn into_body(self) -> serde_json::Value {
        match self {
            Verified::Relogin {
                email,
                name,
                auth_token,
            } => json!({
                "success": true,
                "user_data": {
                    "email": email,
                    "name": name,
                    "auth_token": auth_token,
                },
                "auth_token": auth_token,
                "message": "Signed in again successfully",
            }),
            Verified::Registered {
                email,
                name,
                auth_token,
            } => json!({
                "success": true,
                "user_data": {
                    "email": email,
                    "name": name,
                },
                "auth_token": auth_token,
            }),
        }
    }
}

fn outcome_for(error: &Error) -> Outcome {
    match error {
        Error::CodeNotFoundOrExpired { .. } => Outcome::InvalidCode,
        Error::RegistrationDenied { .. } => Outcome::Denied,
        Error::LoginRejected(_) => Outcome::LoginFailed,
        Error::RegistrationRejected(_) => Outcome::RegisterFailed,
        Error::BadRequest(_) => Outcome::BadRequest,
        _ => Outcome::DownstreamError,
    }
}

/// POST /api/verify-google-auth
pub async fn verify_google_auth(
    State(state): State<AppState>,
    body: std::result::Result<Json<VerifyRequest>, JsonRejection>,
) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().simple());
    let production = state.production;

    async move {
        let result = match body {
            Ok(Json(request)) => {
                verify(
                    &state.store,
                    state.admin.as_ref(),
                    &request,
                    &state.app_version,
                )
                .await
            }
            Err(rejection) => Err(Error::BadRequest(format!(
                "Invalid request body: {}",
                rejection.body_text()
            ))),
        };

        match result {
            Ok(verified) => {
                record_verification(verified.outcome());
                (StatusCode::OK, Json(verified.into_body())).into_response()
            }
            Err(e) => {
                record_verification(outcome_for(&e));
                e.into_json_response(production)
            }
        }
    }
    .instrument(info_span!("verify_google_auth", request_id = %request_id))
    .await
}

/// Redeem `request.auth_code` and reconcile the identity with the device.
pub async fn verify(
    store: &VerificationStore,
    admin: &dyn AdminApi,
    request: &VerifyRequest,
    app_version: &str,
) -> Result<Verified> {
    let code = request.auth_code.trim();
    if code.is_empty() {
        return Err(Error::BadRequest("Please enter the verification code".into()));
    }

    let pending = store.take(code).await?;
    reconcile(admin, pending.identity, &request.machine_id, app_version).await
}

async fn reconcile(
    admin: &dyn AdminApi,
    identity: Identity,
    machine_id: &str,
    app_version: &str,
) -> Result<Verified> {
    if let Err(e) = timed("ping", admin.ping()).await {
        debug!(error = %e, "admin service ping failed, continuing");
    }

    let check = match timed("check_device", admin.check_device(machine_id)).await {
        Ok(check) => Some(check),
        // An answer that cannot be read says nothing about the device
        Err(AdminError::Decode(e)) => {
            return Err(Error::Internal(format!("invalid device check response: {e}")));
        }
        Err(e) => {
            warn!(error = %e, "device check failed, treating device as unregistered");
            None
        }
    };

    match decide(check.as_ref(), &identity.email) {
        Decision::Relogin => relogin(admin, identity, machine_id).await,
        Decision::Register => register(admin, identity, machine_id, app_version).await,
        Decision::Deny {
            reason,
            existing_user,
            last_registered,
        } => {
            info!(email = %identity.email, ?reason, "registration denied for device");
            Err(Error::RegistrationDenied {
                message: denial_message(&reason, &existing_user, last_registered.as_deref()),
                existing_user,
            })
        }
    }
}

/// Apply the device rules to a device check result.
///
/// `None` (check failed) and `exists: false` both mean the device is
/// unregistered. Emails compare case-insensitively. When several limits apply
/// the cooldown is reported first.
pub fn decide(check: Option<&DeviceCheck>, email: &str) -> Decision {
    let Some(check) = check.filter(|c| c.exists) else {
        return Decision::Register;
    };

    let accounts = check.registered_accounts();
    if accounts.iter().any(|a| same_email(&a.email, email)) {
        return Decision::Relogin;
    }

    let hours = check.hours_since_last.unwrap_or(0.0);
    let count = accounts.len().max(check.user_count as usize);
    let reason = if hours < REGISTRATION_COOLDOWN_HOURS {
        DenyReason::Cooldown {
            remaining_hours: REGISTRATION_COOLDOWN_HOURS - hours,
        }
    } else if count >= MAX_ACCOUNTS_PER_DEVICE {
        DenyReason::AccountLimit
    } else if check.can_register_again == Some(false) {
        DenyReason::Refused
    } else {
        return Decision::Register;
    };
    let existing_user = accounts
        .first()
        .map(|u| (*u).clone())
        .unwrap_or_else(|| ExistingUser {
            name: "User".into(),
            email: String::new(),
        });

    Decision::Deny {
        reason,
        existing_user,
        last_registered: check.last_registered.clone(),
    }
}

fn denial_message(
    reason: &DenyReason,
    existing: &ExistingUser,
    last_registered: Option<&str>,
) -> String {
    let mut message = format!(
        "Account \"{}\" ({}) is already registered on this device.\n\n",
        existing.name, existing.email
    );
    match reason {
        DenyReason::Cooldown { remaining_hours } => {
            message.push_str("Another account can be added 24 hours after the last registration");
            if let Some(at) = last_registered {
                message.push_str(&format!(" ({at})"));
            }
            message.push_str(&format!(".\n\nTime remaining: {remaining_hours:.1} hours."));
        }
        DenyReason::AccountLimit => {
            message.push_str(&format!(
                "This device has reached its limit of {MAX_ACCOUNTS_PER_DEVICE} accounts."
            ));
        }
        DenyReason::Refused => {
            message.push_str("No more accounts can be registered on this device.");
        }
    }
    message
}

async fn relogin(admin: &dyn AdminApi, identity: Identity, machine_id: &str) -> Result<Verified> {
    let request = LoginRequest {
        email: identity.email.clone(),
        machine_id: machine_id.to_string(),
        login_method: LOGIN_METHOD.to_string(),
    };

    let response = match timed("login", admin.login(&request)).await {
        Ok(response) => response,
        Err(AdminError::Status(status)) => {
            return Err(Error::LoginRejected(format!("Login server error: {status}")));
        }
        Err(e) => return Err(Error::DownstreamUnavailable(format!("login: {e}"))),
    };

    if !response.success {
        let reason = response
            .message
            .unwrap_or_else(|| "login was refused".to_string());
        return Err(Error::LoginRejected(format!("Unable to log in: {reason}")));
    }

    let name = response
        .user_info
        .and_then(|u| u.name)
        .filter(|n| !n.is_empty())
        .unwrap_or(identity.display_name);

    info!(email = %identity.email, "existing account signed in again");
    Ok(Verified::Relogin {
        email: identity.email,
        name,
        auth_token: response.auth_token,
    })
}

async fn register(
    admin: &dyn AdminApi,
    identity: Identity,
    machine_id: &str,
    app_version: &str,
) -> Result<Verified> {
    let request = RegisterRequest {
        name: identity.display_name.clone(),
        email: identity.email.clone(),
        phone: String::new(),
        machine_id: machine_id.to_string(),
        app_version: app_version.to_string(),
        login_method: LOGIN_METHOD.to_string(),
    };

    let response = match timed("register", admin.register(&request)).await {
        Ok(response) => response,
        Err(AdminError::Status(status)) => {
            return Err(Error::DownstreamRejected(format!(
                "Admin server error: {status}"
            )));
        }
        Err(e) => return Err(Error::DownstreamUnavailable(format!("register: {e}"))),
    };

    if !response.success {
        let reason = response
            .message
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(Error::RegistrationRejected(format!(
            "Unable to register: {reason}"
        )));
    }

    info!(email = %identity.email, "account registered on device");
    Ok(Verified::Registered {
        email: identity.email,
        name: identity.display_name,
        auth_token: common::random_token(AUTH_TOKEN_BYTES),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_api::{LoginResponse, LoginUserInfo, RegisterResponse};
    use common::Secret;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted answer for one admin call.
    #[derive(Clone)]
    enum Canned<T> {
        Ok(T),
        Status(u16),
        Unreachable,
        Garbled,
    }

    impl<T: Clone> Canned<T> {
        fn answer(&self) -> admin_api::Result<T> {
            match self {
                Canned::Ok(v) => Ok(v.clone()),
                Canned::Status(s) => Err(AdminError::Status(*s)),
                Canned::Unreachable => Err(AdminError::Unavailable("connection refused".into())),
                Canned::Garbled => Err(AdminError::Decode("expected value at line 1".into())),
            }
        }
    }

    /// In-memory admin service recording which calls were made.
    struct FakeAdmin {
        ping: Canned<()>,
        check: Canned<DeviceCheck>,
        login: Canned<LoginResponse>,
        register: Canned<RegisterResponse>,
        calls: Mutex<Vec<&'static str>>,
        last_register: Mutex<Option<RegisterRequest>>,
    }

    impl FakeAdmin {
        fn new(check: Canned<DeviceCheck>) -> Self {
            Self {
                ping: Canned::Ok(()),
                check,
                login: Canned::Ok(LoginResponse {
                    success: true,
                    auth_token: "admin-token".into(),
                    user_info: Some(LoginUserInfo {
                        name: Some("Ana From Admin".into()),
                        email: None,
                    }),
                    message: None,
                }),
                register: Canned::Ok(RegisterResponse {
                    success: true,
                    message: None,
                }),
                calls: Mutex::new(Vec::new()),
                last_register: Mutex::new(None),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AdminApi for FakeAdmin {
        fn ping(&self) -> Pin<Box<dyn Future<Output = admin_api::Result<()>> + Send + '_>> {
            self.calls.lock().unwrap().push("ping");
            let answer = self.ping.answer();
            Box::pin(async move { answer })
        }

        fn check_device<'a>(
            &'a self,
            _machine_id: &'a str,
        ) -> Pin<Box<dyn Future<Output = admin_api::Result<DeviceCheck>> + Send + 'a>> {
            self.calls.lock().unwrap().push("check_device");
            let answer = self.check.answer();
            Box::pin(async move { answer })
        }

        fn login<'a>(
            &'a self,
            _request: &'a LoginRequest,
        ) -> Pin<Box<dyn Future<Output = admin_api::Result<LoginResponse>> + Send + 'a>> {
            self.calls.lock().unwrap().push("login");
            let answer = self.login.answer();
            Box::pin(async move { answer })
        }

        fn register<'a>(
            &'a self,
            request: &'a RegisterRequest,
        ) -> Pin<Box<dyn Future<Output = admin_api::Result<RegisterResponse>> + Send + 'a>>
        {
            self.calls.lock().unwrap().push("register");
            *self.last_register.lock().unwrap() = Some(request.clone());
            let answer = self.register.answer();
            Box::pin(async move { answer })
        }
    }

    fn identity(email: &str) -> Identity {
        Identity {
            email: email.into(),
            display_name: "Ana".into(),
            picture_url: None,
            provider_access_token: Secret::new("ya29.test".to_string()),
        }
    }

    fn device(existing_email: &str, hours: f64, user_count: u32) -> DeviceCheck {
        DeviceCheck {
            exists: true,
            user: Some(ExistingUser {
                name: "Existing".into(),
                email: existing_email.into(),
            }),
            last_registered: Some("2026-10-15 08:00:00".into()),
            hours_since_last: Some(hours),
            user_count,
            ..DeviceCheck::default()
        }
    }

    async fn store_with(code: &str, email: &str) -> VerificationStore {
        let store = VerificationStore::new();
        store
            .put(code.into(), identity(email), Duration::from_secs(300))
            .await
            .unwrap();
        store
    }

    fn request(code: &str) -> VerifyRequest {
        VerifyRequest {
            auth_code: code.into(),
            machine_id: "machine-1".into(),
        }
    }

    #[test]
    fn matching_email_always_relogs_regardless_of_limits() {
        // Two accounts and a fresh registration would deny a newcomer
        let check = device("Ana@Example.com", 1.0, 2);
        assert_eq!(decide(Some(&check), "ana@example.com"), Decision::Relogin);
    }

    #[test]
    fn relogin_matches_any_listed_account() {
        let mut check = device("first@example.com", 1.0, 2);
        check.users = vec![ExistingUser {
            name: "Second".into(),
            email: "second@example.com".into(),
        }];
        assert_eq!(decide(Some(&check), "SECOND@example.com"), Decision::Relogin);
    }

    #[test]
    fn cooldown_denies_before_24_hours() {
        let check = device("other@example.com", 23.0, 1);
        match decide(Some(&check), "ana@example.com") {
            Decision::Deny {
                reason: DenyReason::Cooldown { remaining_hours },
                existing_user,
                ..
            } => {
                assert!((remaining_hours - 1.0).abs() < f64::EPSILON);
                assert_eq!(existing_user.email, "other@example.com");
            }
            other => panic!("expected cooldown denial, got {other:?}"),
        }
    }

    #[test]
    fn second_account_allowed_after_24_hours() {
        let check = device("other@example.com", 25.0, 1);
        assert_eq!(decide(Some(&check), "ana@example.com"), Decision::Register);

        let exactly = device("other@example.com", 24.0, 1);
        assert_eq!(decide(Some(&exactly), "ana@example.com"), Decision::Register);
    }

    #[test]
    fn account_limit_denies_third_account() {
        let check = device("other@example.com", 100.0, 2);
        assert!(matches!(
            decide(Some(&check), "ana@example.com"),
            Decision::Deny {
                reason: DenyReason::AccountLimit,
                ..
            }
        ));
    }

    #[test]
    fn two_accounts_deny_even_within_cooldown() {
        let check = device("bo@example.com", 3.0, 2);
        let Decision::Deny {
            reason,
            existing_user,
            last_registered,
        } = decide(Some(&check), "ana@example.com")
        else {
            panic!("expected denial");
        };
        assert_eq!(
            reason,
            DenyReason::Cooldown {
                remaining_hours: 21.0
            }
        );
        let message = denial_message(&reason, &existing_user, last_registered.as_deref());
        assert!(message.contains("Time remaining: 21.0 hours."), "got: {message}");
    }

    #[test]
    fn admin_refusal_denies_otherwise_eligible_device() {
        let mut check = device("other@example.com", 30.0, 1);
        check.can_register_again = Some(false);
        let Decision::Deny {
            reason,
            existing_user,
            ..
        } = decide(Some(&check), "ana@example.com")
        else {
            panic!("expected denial");
        };
        assert_eq!(reason, DenyReason::Refused);
        let message = denial_message(&reason, &existing_user, None);
        assert!(message.ends_with("No more accounts can be registered on this device."));

        check.can_register_again = Some(true);
        assert_eq!(decide(Some(&check), "ana@example.com"), Decision::Register);
    }

    #[test]
    fn local_rule_wins_over_admin_approval() {
        let mut check = device("other@example.com", 2.0, 1);
        check.can_register_again = Some(true);
        assert!(matches!(
            decide(Some(&check), "ana@example.com"),
            Decision::Deny {
                reason: DenyReason::Cooldown { .. },
                ..
            }
        ));
    }

    #[test]
    fn listed_accounts_count_toward_limit() {
        let mut check = device("a@example.com", 48.0, 0);
        check.users = vec![ExistingUser {
            name: "B".into(),
            email: "b@example.com".into(),
        }];
        assert!(matches!(
            decide(Some(&check), "c@example.com"),
            Decision::Deny {
                reason: DenyReason::AccountLimit,
                ..
            }
        ));
    }

    #[test]
    fn missing_hours_is_treated_as_fresh_registration() {
        let mut check = device("other@example.com", 0.0, 1);
        check.hours_since_last = None;
        assert!(matches!(
            decide(Some(&check), "ana@example.com"),
            Decision::Deny {
                reason: DenyReason::Cooldown { .. },
                ..
            }
        ));
    }

    #[test]
    fn unregistered_or_unknown_device_registers() {
        assert_eq!(decide(None, "ana@example.com"), Decision::Register);
        let check = DeviceCheck::default();
        assert_eq!(decide(Some(&check), "ana@example.com"), Decision::Register);
    }

    #[test]
    fn cooldown_message_reports_remaining_hours() {
        let message = denial_message(
            &DenyReason::Cooldown {
                remaining_hours: 5.26,
            },
            &ExistingUser {
                name: "Bo".into(),
                email: "bo@example.com".into(),
            },
            Some("2026-10-15 08:00:00"),
        );
        assert!(message.contains("\"Bo\" (bo@example.com)"));
        assert!(message.contains("(2026-10-15 08:00:00)"));
        assert!(message.contains("Time remaining: 5.3 hours."), "got: {message}");
    }

    #[tokio::test]
    async fn relogin_flow_returns_admin_token() {
        let store = store_with("123456", "ANA@example.com").await;
        let admin = FakeAdmin::new(Canned::Ok(device("ana@example.com", 1.0, 1)));

        let verified = verify(&store, &admin, &request("123456"), "1.0.0")
            .await
            .unwrap();
        match verified {
            Verified::Relogin {
                name, auth_token, ..
            } => {
                assert_eq!(auth_token, "admin-token");
                assert_eq!(name, "Ana From Admin");
            }
            other => panic!("expected relogin, got {other:?}"),
        }
        assert_eq!(admin.calls(), vec!["ping", "check_device", "login"]);
    }

    #[tokio::test]
    async fn relogin_refused_surfaces_downstream_message() {
        let store = store_with("123456", "ana@example.com").await;
        let mut admin = FakeAdmin::new(Canned::Ok(device("ana@example.com", 1.0, 1)));
        admin.login = Canned::Ok(LoginResponse {
            success: false,
            message: Some("account disabled".into()),
            ..LoginResponse::default()
        });

        let err = verify(&store, &admin, &request("123456"), "1.0.0")
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Unable to log in: account disabled");
    }

    #[tokio::test]
    async fn login_status_and_transport_errors() {
        let store = store_with("111111", "ana@example.com").await;
        let mut admin = FakeAdmin::new(Canned::Ok(device("ana@example.com", 1.0, 1)));
        admin.login = Canned::Status(502);
        let err = verify(&store, &admin, &request("111111"), "1.0.0")
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Login server error: 502");

        let store = store_with("222222", "ana@example.com").await;
        admin.login = Canned::Unreachable;
        let err = verify(&store, &admin, &request("222222"), "1.0.0")
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn check_failure_falls_back_to_registration() {
        let store = store_with("123456", "ana@example.com").await;
        let admin = FakeAdmin::new(Canned::Unreachable);

        let verified = verify(&store, &admin, &request("123456"), "2.0.0")
            .await
            .unwrap();
        match verified {
            Verified::Registered { auth_token, .. } => assert_eq!(auth_token.len(), 43),
            other => panic!("expected registration, got {other:?}"),
        }
        assert_eq!(admin.calls(), vec!["ping", "check_device", "register"]);

        let sent = admin.last_register.lock().unwrap().clone().unwrap();
        assert_eq!(sent.phone, "");
        assert_eq!(sent.app_version, "2.0.0");
        assert_eq!(sent.machine_id, "machine-1");
        assert_eq!(sent.login_method, LOGIN_METHOD);
    }

    #[tokio::test]
    async fn undecodable_device_check_does_not_register() {
        let store = store_with("123456", "ana@example.com").await;
        let mut admin = FakeAdmin::new(Canned::Ok(DeviceCheck::default()));
        admin.check = Canned::Garbled;

        let err = verify(&store, &admin, &request("123456"), "1.0.0")
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(admin.calls(), vec!["ping", "check_device"]);
    }

    #[tokio::test]
    async fn non_200_device_check_falls_back_to_registration() {
        let store = store_with("123456", "ana@example.com").await;
        let admin = FakeAdmin::new(Canned::Status(502));

        assert!(matches!(
            verify(&store, &admin, &request("123456"), "1.0.0").await,
            Ok(Verified::Registered { .. })
        ));
    }

    #[tokio::test]
    async fn ping_failure_is_ignored() {
        let store = store_with("123456", "ana@example.com").await;
        let mut admin = FakeAdmin::new(Canned::Ok(DeviceCheck::default()));
        admin.ping = Canned::Unreachable;

        assert!(matches!(
            verify(&store, &admin, &request("123456"), "1.0.0").await,
            Ok(Verified::Registered { .. })
        ));
    }

    #[tokio::test]
    async fn denial_does_not_call_register() {
        let store = store_with("123456", "ana@example.com").await;
        let admin = FakeAdmin::new(Canned::Ok(device("other@example.com", 3.0, 1)));

        let err = verify(&store, &admin, &request("123456"), "1.0.0")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RegistrationDenied { .. }));
        assert_eq!(admin.calls(), vec!["ping", "check_device"]);
    }

    #[tokio::test]
    async fn register_rejections_map_to_statuses() {
        let store = store_with("111111", "ana@example.com").await;
        let mut admin = FakeAdmin::new(Canned::Ok(DeviceCheck::default()));
        admin.register = Canned::Ok(RegisterResponse {
            success: false,
            message: Some("email taken".into()),
        });
        let err = verify(&store, &admin, &request("111111"), "1.0.0")
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Unable to register: email taken");

        let store = store_with("222222", "ana@example.com").await;
        admin.register = Canned::Status(503);
        let err = verify(&store, &admin, &request("222222"), "1.0.0")
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Admin server error: 503");
    }

    #[tokio::test]
    async fn code_is_consumed_even_when_downstream_fails() {
        let store = store_with("123456", "ana@example.com").await;
        let mut admin = FakeAdmin::new(Canned::Ok(DeviceCheck::default()));
        admin.register = Canned::Unreachable;

        assert!(verify(&store, &admin, &request("123456"), "1.0.0").await.is_err());
        let err = verify(&store, &admin, &request("123456"), "1.0.0")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CodeNotFoundOrExpired { expired: false }));
    }

    #[tokio::test]
    async fn blank_code_is_rejected_before_the_store() {
        let store = store_with("123456", "ana@example.com").await;
        let admin = FakeAdmin::new(Canned::Ok(DeviceCheck::default()));

        let err = verify(&store, &admin, &request("   "), "1.0.0")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        assert!(admin.calls().is_empty());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn code_is_trimmed() {
        let store = store_with("654321", "ana@example.com").await;
        let admin = FakeAdmin::new(Canned::Ok(DeviceCheck::default()));
        assert!(verify(&store, &admin, &request(" 654321\n"), "1.0.0")
            .await
            .is_ok());
    }

    #[test]
    fn response_bodies_have_expected_shape() {
        let body = Verified::Relogin {
            email: "ana@example.com".into(),
            name: "Ana".into(),
            auth_token: "t".into(),
        }
        .into_body();
        assert_eq!(body["success"], true);
        assert_eq!(body["user_data"]["auth_token"], "t");
        assert_eq!(body["auth_token"], "t");
        assert!(body["message"].is_string());

        let body = Verified::Registered {
            email: "ana@example.com".into(),
            name: "Ana".into(),
            auth_token: "u".into(),
        }
        .into_body();
        assert_eq!(body["user_data"]["email"], "ana@example.com");
        assert!(body["user_data"].get("auth_token").is_none());
        assert!(body.get("message").is_none());
    }
}
