//! # API Middleware Testing
//!
//! Testing utilities and helpers for the API call middleware.
//!
//! This crate provides:
//! - Mock collaborators: scripted transport, recording downstream stage,
//!   mutable state accessor
//! - A Given-When-Then harness for the middleware
//! - Property-based testing strategies
//! - Assertion helpers for notifications
//!
//! ## Example
//!
//! ```
//! use api_middleware_core::{Action, ApiCall, ApiResponse};
//! use api_middleware_runtime::ApiMiddleware;
//! use api_middleware_testing::{MockTransport, RecordingNext};
//!
//! # tokio_test::block_on(async {
//! let transport = MockTransport::new().respond(ApiResponse::new(204));
//! let middleware = ApiMiddleware::new(|| (), transport.shared());
//! let next = RecordingNext::new();
//!
//! let call = ApiCall::new()
//!     .endpoint("https://api.example.com/ping")
//!     .method("HEAD")
//!     .types("PING_REQUEST", "PING_SUCCESS", "PING_FAILURE");
//! middleware.process(Action::Call(call), &next).await;
//!
//! assert_eq!(next.notifications().len(), 2);
//! assert_eq!(transport.call_count(), 1);
//! # });
//! ```

pub mod mocks;

pub use middleware_test::{MiddlewareTest, assertions};
pub use mocks::{MockState, MockTransport, RecordedRequest, RecordingNext};

/// Install a `tracing` subscriber for tests.
///
/// Honors `RUST_LOG` (default `warn`) and writes through the test harness's
/// captured output. Safe to call from every test; only the first call wins.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use api_middleware_core::ApiResponse;
    use proptest::prelude::*;

    /// Any status code a server may answer with
    pub fn status_code() -> impl Strategy<Value = u16> {
        100_u16..600
    }

    /// Statuses that never carry a body
    pub fn empty_body_status() -> impl Strategy<Value = u16> {
        prop_oneof![Just(204_u16), Just(205_u16)]
    }

    /// Non-empty notification identifiers
    pub fn action_type() -> impl Strategy<Value = String> {
        "[A-Z][A-Z_]{0,23}"
    }

    /// Small JSON documents
    pub fn json_value() -> impl Strategy<Value = serde_json::Value> {
        let leaf = prop_oneof![
            Just(serde_json::Value::Null),
            any::<bool>().prop_map(serde_json::Value::from),
            any::<i64>().prop_map(serde_json::Value::from),
            "[a-z0-9 ]{0,16}".prop_map(serde_json::Value::from),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::from),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..4)
                    .prop_map(|map| serde_json::Value::Object(map.into_iter().collect())),
            ]
        })
    }

    /// JSON response with an arbitrary status and body
    pub fn json_response() -> impl Strategy<Value = (u16, serde_json::Value, ApiResponse)> {
        (status_code(), json_value()).prop_map(|(status, body)| {
            let response = ApiResponse::json(status, &body);
            (status, body, response)
        })
    }
}
