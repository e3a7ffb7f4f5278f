//! Client abstraction for the downstream account-admin service
//!
//! The admin service is the account of record: it knows which accounts were
//! registered on which device and decides whether a login succeeds. The relay
//! talks to it through the `AdminApi` trait so the reconciliation logic can be
//! exercised against an in-memory fake; `HttpAdminApi` is the real client.

pub mod http;

pub use http::HttpAdminApi;

use serde::{Deserialize, Deserializer, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Marker sent as `login_method` on login and register calls.
pub const LOGIN_METHOD: &str = "google_oauth";

/// An account registered on a device.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ExistingUser {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
}

/// Case-insensitive email equality used wherever accounts are matched.
pub fn same_email(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Decode an explicit `null` the same way as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Answer to "does this machine have registrations?".
///
/// Every field defaults so partial responses and `null` values still decode;
/// a device with `exists: false` is treated as unregistered regardless of the
/// rest.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeviceCheck {
    #[serde(default, deserialize_with = "null_as_default")]
    pub exists: bool,
    /// Most recently registered account.
    #[serde(default)]
    pub user: Option<ExistingUser>,
    /// All accounts on the device, when the service reports them.
    #[serde(default, deserialize_with = "null_as_default")]
    pub users: Vec<ExistingUser>,
    /// Human-readable timestamp of the last registration (display only).
    #[serde(default)]
    pub last_registered: Option<String>,
    /// The service's own eligibility verdict. An explicit `false` vetoes a
    /// registration the 24h / 2-account rule would otherwise allow.
    #[serde(default)]
    pub can_register_again: Option<bool>,
    #[serde(default)]
    pub hours_since_last: Option<f64>,
    /// Accounts ever registered on the device.
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_count: u32,
}

impl DeviceCheck {
    /// Every known account on the device, `user` first, without duplicates.
    pub fn registered_accounts(&self) -> Vec<&ExistingUser> {
        let mut accounts: Vec<&ExistingUser> = Vec::new();
        for user in self.user.iter().chain(self.users.iter()) {
            if !accounts.iter().any(|a| same_email(&a.email, &user.email)) {
                accounts.push(user);
            }
        }
        accounts
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub machine_id: String,
    pub login_method: String,
}

/// User fields echoed back on login.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginUserInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub user_info: Option<LoginUserInfo>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    /// Always empty: the identity provider does not supply a phone number.
    pub phone: String,
    pub machine_id: String,
    pub app_version: String,
    pub login_method: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Errors talking to the admin service.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// Connection failure or timeout; the service never answered.
    #[error("admin service unreachable: {0}")]
    Unavailable(String),

    /// The service answered with a non-200 status.
    #[error("admin service returned status {0}")]
    Status(u16),

    #[error("invalid admin service response: {0}")]
    Decode(String),
}

/// Result alias for admin service calls.
pub type Result<T> = std::result::Result<T, AdminError>;

/// Operations the relay needs from the admin service.
///
/// Uses `Pin<Box<dyn Future>>` return types so it can be held as
/// `Arc<dyn AdminApi>`.
pub trait AdminApi: Send + Sync {
    /// Liveness probe, also used to wake a sleeping host.
    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    fn check_device<'a>(
        &'a self,
        machine_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<DeviceCheck>> + Send + 'a>>;

    /// Log in an account already bound to the device. A 200 answer with
    /// `success: false` is returned as `Ok`.
    fn login<'a>(
        &'a self,
        request: &'a LoginRequest,
    ) -> Pin<Box<dyn Future<Output = Result<LoginResponse>> + Send + 'a>>;

    /// Register a new account on the device. A 200 answer with
    /// `success: false` is returned as `Ok`.
    fn register<'a>(
        &'a self,
        request: &'a RegisterRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RegisterResponse>> + Send + 'a>>;
}
