//! reqwest-backed admin service client
//!
//! Every call carries an explicit timeout so a slow admin host cannot pin a
//! request worker: the liveness ping uses a short one, the rest a longer one.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    AdminApi, AdminError, DeviceCheck, LoginRequest, LoginResponse, RegisterRequest,
    RegisterResponse, Result,
};

const PING_PATH: &str = "/ping";
const CHECK_DEVICE_PATH: &str = "/api/check-machine";
const LOGIN_PATH: &str = "/api/login";
const REGISTER_PATH: &str = "/api/register";

/// HTTP client for the admin service rooted at `base_url`.
#[derive(Debug, Clone)]
pub struct HttpAdminApi {
    client: reqwest::Client,
    base_url: String,
    ping_timeout: Duration,
    call_timeout: Duration,
}

#[derive(Serialize)]
struct CheckDeviceBody<'a> {
    machine_id: &'a str,
}

impl HttpAdminApi {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        ping_timeout: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ping_timeout,
            call_timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST a JSON body and decode a JSON answer. Only 200 counts as success,
    /// matching what the admin service actually returns.
    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .timeout(self.call_timeout)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .json(body)
            .send()
            .await
            .map_err(|e| AdminError::Unavailable(format!("POST {path}: {e}")))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            debug!(path, status = status.as_u16(), "admin service returned non-200");
            return Err(AdminError::Status(status.as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AdminError::Decode(format!("POST {path}: {e}")))
    }
}

impl AdminApi for HttpAdminApi {
    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.url(PING_PATH))
                .timeout(self.ping_timeout)
                .send()
                .await
                .map_err(|e| AdminError::Unavailable(format!("GET {PING_PATH}: {e}")))?;
            if !response.status().is_success() {
                return Err(AdminError::Status(response.status().as_u16()));
            }
            Ok(())
        })
    }

    fn check_device<'a>(
        &'a self,
        machine_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<DeviceCheck>> + Send + 'a>> {
        Box::pin(async move {
            self.post_json(CHECK_DEVICE_PATH, &CheckDeviceBody { machine_id })
                .await
        })
    }

    fn login<'a>(
        &'a self,
        request: &'a LoginRequest,
    ) -> Pin<Box<dyn Future<Output = Result<LoginResponse>> + Send + 'a>> {
        Box::pin(async move { self.post_json(LOGIN_PATH, request).await })
    }

    fn register<'a>(
        &'a self,
        request: &'a RegisterRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RegisterResponse>> + Send + 'a>> {
        Box::pin(async move { self.post_json(REGISTER_PATH, request).await })
    }
}
