//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. The file itself is
//! optional; when no path is given and `oauth-relay.toml` is absent, every
//! setting comes from defaults and the environment. The OAuth client secret is
//! read from GOOGLE_CLIENT_SECRET or `client_secret_file`, never from the TOML.

use common::{Error, Secret};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Redirect URI used in development when none is configured.
pub const DEV_REDIRECT_URI: &str = "http://localhost:3000/api/google-callback";

const DEFAULT_CONFIG_FILE: &str = "oauth-relay.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Identity provider client settings
#[derive(Debug, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file holding the client secret (alternative to GOOGLE_CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_userinfo_url")]
    pub userinfo_url: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

/// Downstream admin service settings
#[derive(Debug, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_base_url")]
    pub base_url: String,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_secs: u64,
    #[serde(default = "default_admin_timeout")]
    pub timeout_secs: u64,
    /// Reported to the admin service on registration.
    #[serde(default = "default_app_version")]
    pub app_version: String,
}

/// Verification code lifetime and sweep cadence
#[derive(Debug, Deserialize)]
pub struct VerificationConfig {
    #[serde(default = "default_code_ttl")]
    pub code_ttl_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_max_connections() -> usize {
    1000
}

fn default_authorize_url() -> String {
    google_auth::AUTHORIZE_ENDPOINT.to_string()
}

fn default_token_url() -> String {
    google_auth::TOKEN_ENDPOINT.to_string()
}

fn default_userinfo_url() -> String {
    google_auth::USERINFO_ENDPOINT.to_string()
}

fn default_provider_timeout() -> u64 {
    google_auth::DEFAULT_TIMEOUT_SECS
}

fn default_admin_base_url() -> String {
    "https://web-admin-srt212.onrender.com".to_string()
}

fn default_ping_timeout() -> u64 {
    10
}

fn default_admin_timeout() -> u64 {
    30
}

fn default_app_version() -> String {
    "1.0.0".to_string()
}

fn default_code_ttl() -> u64 {
    verification_store::CODE_TTL.as_secs()
}

fn default_sweep_interval() -> u64 {
    verification_store::SWEEP_INTERVAL.as_secs()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            environment: Environment::default(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            client_secret_file: None,
            redirect_uri: None,
            authorize_url: default_authorize_url(),
            token_url: default_token_url(),
            userinfo_url: default_userinfo_url(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            base_url: default_admin_base_url(),
            ping_timeout_secs: default_ping_timeout(),
            timeout_secs: default_admin_timeout(),
            app_version: default_app_version(),
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_ttl_secs: default_code_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Read an env var, treating empty and whitespace-only values as unset.
fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn require_http_url(field: &str, value: &str) -> common::Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{field} must start with http:// or https://, got: {value}"
        )))
    }
}

fn require_non_zero(field: &str, value: u64) -> common::Result<()> {
    if value == 0 {
        Err(Error::Config(format!("{field} must be greater than 0")))
    } else {
        Ok(())
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then overlay
    /// environment variables and validate.
    ///
    /// Production mode (`environment = "production"`, RELAY_ENV=production,
    /// or PORT set) refuses to start without client id, secret and redirect
    /// URI. Development mode only warns, and falls back to a localhost
    /// redirect URI.
    pub fn load(path: Option<&Path>) -> common::Result<Self> {
        let mut config: Config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                toml::from_str(&contents)?
            }
            None => Config::default(),
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config file path from the CLI arg or CONFIG_PATH env var,
    /// falling back to `oauth-relay.toml` only if it exists.
    pub fn resolve_path(cli_path: Option<&str>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(PathBuf::from(p));
        }
        if let Some(p) = env_value("CONFIG_PATH") {
            return Some(PathBuf::from(p));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    }

    fn apply_env(&mut self) -> common::Result<()> {
        if let Some(id) = env_value("GOOGLE_CLIENT_ID") {
            self.google.client_id = Some(id);
        }
        if let Some(uri) = env_value("GOOGLE_REDIRECT_URI") {
            self.google.redirect_uri = Some(uri);
        }
        if let Some(url) = env_value("ADMIN_BASE_URL") {
            self.admin.base_url = url;
        }

        // Secret: env var takes precedence over file
        if let Some(secret) = std::env::var("GOOGLE_CLIENT_SECRET")
            .ok()
            .and_then(Secret::<String>::non_blank)
        {
            self.google.client_secret = Some(secret);
        } else if let Some(ref secret_file) = self.google.client_secret_file {
            let contents = std::fs::read_to_string(secret_file).map_err(|e| {
                Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            self.google.client_secret = Secret::<String>::non_blank(contents);
        }

        if let Some(env) = env_value("RELAY_ENV") {
            self.server.environment = match env.to_ascii_lowercase().as_str() {
                "production" => Environment::Production,
                "development" => Environment::Development,
                other => {
                    return Err(Error::Config(format!(
                        "RELAY_ENV must be production or development, got: {other}"
                    )));
                }
            };
        }

        // Hosting platforms inject PORT; its presence marks a deployed instance
        if let Some(port) = env_value("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|_| Error::Config(format!("PORT must be a port number, got: {port}")))?;
            self.server.listen_addr.set_port(port);
            self.server.environment = Environment::Production;
        }

        Ok(())
    }

    fn validate(&mut self) -> common::Result<()> {
        require_http_url("google.authorize_url", &self.google.authorize_url)?;
        require_http_url("google.token_url", &self.google.token_url)?;
        require_http_url("google.userinfo_url", &self.google.userinfo_url)?;
        require_http_url("admin.base_url", &self.admin.base_url)?;
        require_non_zero("google.timeout_secs", self.google.timeout_secs)?;
        require_non_zero("admin.ping_timeout_secs", self.admin.ping_timeout_secs)?;
        require_non_zero("admin.timeout_secs", self.admin.timeout_secs)?;
        require_non_zero("verification.code_ttl_secs", self.verification.code_ttl_secs)?;
        require_non_zero(
            "verification.sweep_interval_secs",
            self.verification.sweep_interval_secs,
        )?;
        if self.server.max_connections == 0 {
            return Err(Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        let production = self.is_production();

        if self.google.client_id.is_none() {
            if production {
                return Err(Error::ConfigMissing("GOOGLE_CLIENT_ID"));
            }
            warn!("GOOGLE_CLIENT_ID is not set; the login flow is disabled until it is");
        }
        if self.google.client_secret.is_none() {
            if production {
                return Err(Error::ConfigMissing("GOOGLE_CLIENT_SECRET"));
            }
            warn!("GOOGLE_CLIENT_SECRET is not set; the login flow is disabled until it is");
        }
        match self.google.redirect_uri {
            Some(ref uri) => require_http_url("google.redirect_uri", uri)?,
            None if production => return Err(Error::ConfigMissing("GOOGLE_REDIRECT_URI")),
            None => {
                warn!(
                    redirect_uri = DEV_REDIRECT_URI,
                    "GOOGLE_REDIRECT_URI is not set, using the local development default"
                );
                self.google.redirect_uri = Some(DEV_REDIRECT_URI.to_string());
            }
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.environment == Environment::Production
    }

    /// OAuth client settings, present only when id, secret and redirect URI
    /// are all configured.
    pub fn oauth_client(&self) -> Option<google_auth::ClientConfig> {
        Some(google_auth::ClientConfig {
            endpoints: google_auth::Endpoints {
                authorize: self.google.authorize_url.clone(),
                token: self.google.token_url.clone(),
                userinfo: self.google.userinfo_url.clone(),
            },
            client_id: self.google.client_id.clone()?,
            client_secret: self.google.client_secret.clone()?,
            redirect_uri: self.google.redirect_uri.clone()?,
            timeout: Duration::from_secs(self.google.timeout_secs),
        })
    }

    /// What `/api/check-config` reports: presence of settings, never secrets.
    pub fn report(&self) -> ConfigReport {
        ConfigReport {
            has_client_id: self.google.client_id.is_some(),
            has_client_secret: self.google.client_secret.is_some(),
            has_redirect_uri: self.google.redirect_uri.is_some(),
            client_id_preview: self
                .google
                .client_id
                .as_deref()
                .map(|id| format!("{}...", id.chars().take(20).collect::<String>())),
            redirect_uri: self.google.redirect_uri.clone(),
            is_production: self.is_production(),
        }
    }
}

/// Configuration readiness snapshot taken at startup.
#[derive(Debug, Clone)]
pub struct ConfigReport {
    pub has_client_id: bool,
    pub has_client_secret: bool,
    pub has_redirect_uri: bool,
    pub client_id_preview: Option<String>,
    pub redirect_uri: Option<String>,
    pub is_production: bool,
}

impl ConfigReport {
    /// Environment variable of the first missing OAuth setting.
    pub fn first_missing(&self) -> Option<&'static str> {
        if !self.has_client_id {
            Some("GOOGLE_CLIENT_ID")
        } else if !self.has_client_secret {
            Some("GOOGLE_CLIENT_SECRET")
        } else if !self.has_redirect_uri {
            Some("GOOGLE_REDIRECT_URI")
        } else {
            None
        }
    }

    pub fn is_ready(&self) -> bool {
        self.first_missing().is_none()
    }
}
