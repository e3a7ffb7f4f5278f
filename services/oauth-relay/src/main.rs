//! OAuth relay
//!
//! Single-binary service that lets a desktop client sign in with Google
//! without embedding a browser:
//! 1. The client opens `/api/google-auth` in the user's browser
//! 2. After consent, the callback shows a 6-digit verification code
//! 3. The client posts that code to `/api/verify-google-auth`, which logs the
//!    account in or registers it on the device with the admin service

mod config;
mod error;
mod flow;
mod metrics;
mod pages;
mod reconcile;
mod session;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use admin_api::{AdminApi, HttpAdminApi};
use google_auth::ClientConfig;
use verification_store::{VerificationStore, spawn_reaper};

use crate::config::{Config, ConfigReport};
use crate::session::SessionStore;

/// How long in-flight requests may take to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    store: Arc<VerificationStore>,
    sessions: SessionStore,
    /// `None` until client id, secret and redirect URI are all configured.
    oauth: Option<Arc<ClientConfig>>,
    http: reqwest::Client,
    admin: Arc<dyn AdminApi>,
    code_ttl: Duration,
    app_version: Arc<str>,
    production: bool,
    report: Arc<ConfigReport>,
    prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// Applies a concurrency limit layer based on `max_connections`.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/ping", get(ping_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/google-auth", get(flow::google_auth))
        .route("/api/google-callback", get(flow::google_callback))
        .route("/api/verify-google-auth", post(reconcile::verify_google_auth))
        .route("/api/check-config", get(check_config_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting oauth-relay");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    match &config_path {
        Some(path) => info!(path = %path.display(), "loading configuration"),
        None => info!("no configuration file, using defaults and environment"),
    }

    let config = Config::load(config_path.as_deref()).with_context(|| match &config_path {
        Some(path) => format!("failed to load config from {}", path.display()),
        None => "failed to load config from environment".to_string(),
    })?;

    let report = config.report();
    info!(
        listen_addr = %config.server.listen_addr,
        production = config.is_production(),
        admin_base_url = %config.admin.base_url,
        oauth_ready = report.is_ready(),
        "configuration loaded"
    );

    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;

    let admin = HttpAdminApi::new(
        http.clone(),
        config.admin.base_url.clone(),
        Duration::from_secs(config.admin.ping_timeout_secs),
        Duration::from_secs(config.admin.timeout_secs),
    );

    let store = Arc::new(VerificationStore::new());
    let cancel = CancellationToken::new();
    let reaper = spawn_reaper(
        store.clone(),
        Duration::from_secs(config.verification.sweep_interval_secs),
        cancel.clone(),
    );

    let state = AppState {
        store,
        sessions: SessionStore::new(),
        oauth: config.oauth_client().map(Arc::new),
        http,
        admin: Arc::new(admin),
        code_ttl: Duration::from_secs(config.verification.code_ttl_secs),
        app_version: config.admin.app_version.as_str().into(),
        production: config.is_production(),
        report: Arc::new(report),
        prometheus: prometheus_handle,
    };

    let app = build_router(state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires, not when the
    // server starts
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    cancel.cancel();
    if let Err(e) = reaper.await {
        warn!(error = %e, "reaper task ended abnormally");
    }

    info!("shutdown complete");
    Ok(())
}

/// Production: a JSON descriptor. Development: an HTML page for manual testing.
async fn index_handler(State(state): State<AppState>) -> Response {
    if state.production {
        Json(json!({
            "service": "oauth-relay",
            "status": "running",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "auth": "/api/google-auth",
                "callback": "/api/google-callback",
                "verify": "/api/verify-google-auth",
                "ping": "/ping",
                "check_config": "/api/check-config",
            },
            "note": "This is an API server. Use the endpoints to interact with the service.",
        }))
        .into_response()
    } else {
        Html(pages::index_page(
            state.report.redirect_uri.as_deref(),
            state.report.is_ready(),
        ))
        .into_response()
    }
}

/// Liveness probe.
async fn ping_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Which OAuth settings are present. Never includes the secret.
async fn check_config_handler(State(state): State<AppState>) -> impl IntoResponse {
    let report = &state.report;
    Json(json!({
        "has_client_id": report.has_client_id,
        "has_client_secret": report.has_client_secret,
        "has_redirect_uri": report.has_redirect_uri,
        "client_id_preview": report.client_id_preview,
        "redirect_uri": report.redirect_uri,
        "is_production": report.is_production,
        "status": if report.is_ready() { "ok" } else { "missing_config" },
    }))
}

/// Prometheus metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
