//! # API Middleware Runtime
//!
//! Runtime implementation of the API call middleware.
//!
//! ## Core Components
//!
//! - **[`ApiMiddleware`]**: the pipeline stage that validates a call,
//!   resolves its dynamic fields, performs it and emits lifecycle
//!   notifications
//! - **[`resolve_descriptor`]**: turns a lifecycle descriptor into a
//!   finished notification, never failing
//! - **[`HttpTransport`]**: `reqwest`-backed transport
//! - **[`MiddlewareConfig`]**: environment-driven configuration
//! - **[`metrics`]**: Prometheus metrics for call outcomes
//!
//! ## Example
//!
//! ```no_run
//! use api_middleware_core::{Action, ApiCall};
//! use api_middleware_runtime::{ApiMiddleware, HttpTransport, HttpTransportConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(&HttpTransportConfig::default())?;
//! let middleware = ApiMiddleware::new(|| 0_u32, Arc::new(transport));
//!
//! let call = ApiCall::new()
//!     .endpoint_fn(|page: &u32| Ok(format!("https://api.example.com/items?page={page}")))
//!     .method("GET")
//!     .types("ITEMS_REQUEST", "ITEMS_SUCCESS", "ITEMS_FAILURE");
//!
//! let next = |action: Action<u32>| async move {
//!     if let Some(notification) = action.as_notification() {
//!         println!("{}", notification.action_type);
//!     }
//! };
//! middleware.process(Action::Call(call), &next).await;
//! # Ok(())
//! # }
//! ```

/// Middleware configuration
pub mod config;

/// HTTP transport
pub mod http;

/// Prometheus metrics for observability
pub mod metrics;

/// The middleware stage
pub mod middleware;

/// Descriptor resolution
pub mod resolve;

pub use config::{ConfigError, HttpTransportConfig, MiddlewareConfig};
pub use http::{HttpResponse, HttpTransport};
pub use metrics::{ApiCallMetrics, MetricsError, MetricsRecorder};
pub use middleware::ApiMiddleware;
pub use resolve::resolve_descriptor;
