//! Prometheus metrics exposition
//!
//! - `relay_codes_issued_total` (counter, recorded by the store)
//! - `relay_codes_expired_total` (counter, recorded by the store)
//! - `relay_verifications_total` (counter): label `outcome`
//! - `relay_downstream_duration_seconds` (histogram): label `call`

use std::future::Future;
use std::time::{Duration, Instant};

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const DOWNSTREAM_BUCKETS: &[f64] = &[
    0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("relay_downstream_duration_seconds".to_string()),
        DOWNSTREAM_BUCKETS,
    )
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Downstream latency renders as a histogram (`_bucket` lines) rather than a
/// summary. Buckets run from 10ms to the 30s call timeout.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// How a verification request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Relogin,
    Registered,
    InvalidCode,
    Denied,
    LoginFailed,
    RegisterFailed,
    DownstreamError,
    BadRequest,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Relogin => "relogin",
            Outcome::Registered => "registered",
            Outcome::InvalidCode => "invalid_code",
            Outcome::Denied => "denied",
            Outcome::LoginFailed => "login_failed",
            Outcome::RegisterFailed => "register_failed",
            Outcome::DownstreamError => "downstream_error",
            Outcome::BadRequest => "bad_request",
        }
    }
}

pub fn record_verification(outcome: Outcome) {
    metrics::counter!("relay_verifications_total", "outcome" => outcome.as_str()).increment(1);
}

/// Record the latency of one call to the identity provider or admin service.
pub fn record_downstream(call: &'static str, elapsed: Duration) {
    metrics::histogram!("relay_downstream_duration_seconds", "call" => call)
        .record(elapsed.as_secs_f64());
}

/// Await `call`, recording its latency under `name` whatever the outcome.
pub async fn timed<T>(name: &'static str, call: impl Future<Output = T>) -> T {
    let started = Instant::now();
    let output = call.await;
    record_downstream(name, started.elapsed());
    output
}
