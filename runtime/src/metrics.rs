//! Prometheus metrics for API calls.
//!
//! [`ApiCallMetrics`] records what the middleware does with each action:
//! - actions passed through untouched
//! - calls rejected by validation, abandoned by bailout or stopped by a
//!   failing dynamic field
//! - requests sent, transport failures and response outcomes
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed, for example by [`MetricsRecorder::install`].
//! Exposing the rendered text over HTTP is left to the host application.
//!
//! # Example
//!
//! ```rust,no_run
//! use api_middleware_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut recorder = MetricsRecorder::new();
//! recorder.install()?;
//!
//! if let Some(text) = recorder.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder for the middleware's metrics.
///
/// Installs the global recorder and renders the text exposition format; it
/// does not listen on a socket.
#[derive(Default)]
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Create a recorder that is not installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., by another test), this logs a
    /// warning and succeeds without a handle.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the global recorder was not installed by this value.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "api_middleware_pass_through_total",
        "Actions forwarded untouched because they carry no API call"
    );
    describe_counter!(
        "api_middleware_invalid_calls_total",
        "API calls rejected by validation"
    );
    describe_counter!(
        "api_middleware_bailouts_total",
        "API calls abandoned by bailout"
    );
    describe_counter!(
        "api_middleware_field_errors_total",
        "API calls stopped because a dynamic field or bailout function failed"
    );
    describe_counter!(
        "api_middleware_requests_sent_total",
        "API calls handed to the transport"
    );
    describe_counter!(
        "api_middleware_transport_errors_total",
        "API calls whose transport failed before producing a response"
    );
    describe_counter!(
        "api_middleware_responses_total",
        "Responses received, by outcome and status"
    );
    describe_histogram!(
        "api_middleware_call_duration_seconds",
        "Time from request-sent to the final notification"
    );
}

/// Outcome of a call that produced a response
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Success notification emitted
    Success,
    /// Failure notification emitted
    Failure,
}

impl Outcome {
    const fn label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// API call metrics recorder.
pub struct ApiCallMetrics;

impl ApiCallMetrics {
    /// Record an action that was not an API call.
    pub fn record_pass_through() {
        counter!("api_middleware_pass_through_total").increment(1);
    }

    /// Record a call rejected by validation.
    pub fn record_invalid() {
        counter!("api_middleware_invalid_calls_total").increment(1);
    }

    /// Record a bailout.
    pub fn record_bailout() {
        counter!("api_middleware_bailouts_total").increment(1);
    }

    /// Record a failing dynamic field (`endpoint`, `headers`, `options`, `bailout`).
    pub fn record_field_error(field: &'static str) {
        counter!("api_middleware_field_errors_total", "field" => field).increment(1);
    }

    /// Record a request handed to the transport.
    pub fn record_request_sent() {
        counter!("api_middleware_requests_sent_total").increment(1);
    }

    /// Record a transport failure.
    pub fn record_transport_error(duration: Duration) {
        counter!("api_middleware_transport_errors_total").increment(1);
        histogram!("api_middleware_call_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a response and how it was classified.
    pub fn record_response(outcome: Outcome, status: u16, duration: Duration) {
        counter!(
            "api_middleware_responses_total",
            "outcome" => outcome.label(),
            "status" => status.to_string()
        )
        .increment(1);
        histogram!("api_middleware_call_duration_seconds").record(duration.as_secs_f64());
    }
}
