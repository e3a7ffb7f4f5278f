//! HTML pages shown to the browser during the login flow
//!
//! Every interpolated value goes through `escape_html`; provider error
//! strings and display names are attacker-influenced.

use std::time::Duration;

const STYLE: &str = "body{font-family:Arial,sans-serif;text-align:center;padding:50px;\
background:#f4f5fb;color:#333;margin:0}\
.container{background:#fff;padding:40px;border-radius:10px;\
box-shadow:0 10px 30px rgba(0,0,0,.15);max-width:520px;margin:0 auto}\
.code{font-size:48px;font-weight:bold;color:#0066cc;letter-spacing:10px;\
padding:20px;background:#f0f0f0;border-radius:5px;margin:20px 0}\
.info{color:#666;margin:10px 0}.warning{color:#ff6600;font-weight:bold;margin-top:20px}\
.error{color:#c62828}code{background:#f0f0f0;padding:2px 6px;border-radius:3px}";

/// Escape text for inclusion in HTML element content or quoted attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n\
         <body>\n<div class=\"container\">\n{body}\n</div>\n</body>\n</html>\n",
        title = escape_html(title),
    )
}

/// Page showing the verification code to transcribe into the desktop app.
pub fn success_page(email: &str, name: &str, code: &str, ttl: Duration) -> String {
    let minutes = ttl.as_secs().div_ceil(60);
    let body = format!(
        "<h1>Sign-in successful</h1>\n\
         <p class=\"info\">Email: <strong>{email}</strong></p>\n\
         <p class=\"info\">Name: <strong>{name}</strong></p>\n\
         <hr>\n\
         <p>Enter this verification code in the application:</p>\n\
         <div class=\"code\">{code}</div>\n\
         <p class=\"warning\">The code is valid for {minutes} minutes.</p>\n\
         <p class=\"info\">You can close this window once the code is entered.</p>",
        email = escape_html(email),
        name = escape_html(name),
        code = escape_html(code),
    );
    layout("Sign-in successful", &body)
}

/// Terminal failure page for the browser flow.
pub fn error_page(title: &str, message: &str) -> String {
    let body = format!(
        "<h1 class=\"error\">{title}</h1>\n\
         <p>{message}</p>\n\
         <p class=\"info\">Close this window and start the sign-in again from the application.</p>",
        title = escape_html(title),
        message = escape_html(message),
    );
    layout(title, &body)
}

/// Development landing page listing the endpoints.
pub fn index_page(redirect_uri: Option<&str>, ready: bool) -> String {
    let status = if ready {
        "<p>OAuth client configured.</p>".to_string()
    } else {
        "<p class=\"warning\">OAuth client is not fully configured; \
         see <a href=\"/api/check-config\">/api/check-config</a>.</p>"
            .to_string()
    };
    let body = format!(
        "<h1>OAuth relay (development)</h1>\n\
         {status}\n\
         <p class=\"info\">Redirect URI: <code>{redirect}</code></p>\n\
         <ul style=\"text-align:left\">\n\
         <li><a href=\"/api/google-auth\">GET /api/google-auth</a> start sign-in</li>\n\
         <li>GET /api/google-callback provider redirect target</li>\n\
         <li>POST /api/verify-google-auth redeem a verification code</li>\n\
         <li><a href=\"/ping\">GET /ping</a> liveness</li>\n\
         <li><a href=\"/api/check-config\">GET /api/check-config</a> configuration status</li>\n\
         <li><a href=\"/metrics\">GET /metrics</a> Prometheus metrics</li>\n\
         </ul>",
        redirect = escape_html(redirect_uri.unwrap_or("(not set)")),
    );
    layout("OAuth relay", &body)
}
