//! Google OAuth endpoint defaults

pub const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

pub const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Space-separated scopes requested at consent time.
pub const SCOPES: &str = "openid email profile";

/// Timeout applied to token and userinfo calls unless configured otherwise.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
