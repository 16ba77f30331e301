//! Response contract and JSON extraction.
//!
//! The middleware only sees responses through the [`Response`] trait, so a
//! response produced by a real transport and one synthesized locally (for
//! example replayed from a cache) are indistinguishable.

use bytes::Bytes;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Status codes whose body is always treated as empty
pub const EMPTY_BODY_STATUSES: [u16; 2] = [204, 205];

/// Errors raised while reading or decoding a response body
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    /// The body could not be read from the connection
    #[error("Failed to read response body: {0}")]
    BodyRead(String),

    /// The body is not valid JSON
    #[error("Failed to decode response body as JSON: {0}")]
    Decode(String),
}

/// A response as seen by the middleware.
///
/// # Dyn Compatibility
///
/// `json` returns an explicit `Pin<Box<dyn Future>>` so responses can be
/// shared as `Arc<dyn Response>` between resolvers.
pub trait Response: Send + Sync + std::fmt::Debug {
    /// Whether the response counts as successful (2xx for HTTP)
    fn ok(&self) -> bool;

    /// Numeric status code
    fn status(&self) -> u16;

    /// Status text (`"Not Found"`, ...)
    fn status_text(&self) -> &str;

    /// Case-insensitive header lookup
    fn header(&self, name: &str) -> Option<&str>;

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError`] if the body cannot be read or is not JSON.
    fn json(&self) -> Pin<Box<dyn Future<Output = Result<Value, ResponseError>> + Send + '_>>;
}

/// Extract a JSON body from a response.
///
/// Resolves to `None` without touching the decoder when the status is 204 or
/// 205, or when the `Content-Type` header does not mention JSON.
///
/// # Errors
///
/// Propagates the decoder's [`ResponseError`].
pub async fn get_json(response: &dyn Response) -> Result<Option<Value>, ResponseError> {
    if EMPTY_BODY_STATUSES.contains(&response.status()) {
        return Ok(None);
    }

    let is_json = response
        .header("content-type")
        .is_some_and(|content_type| content_type.contains("json"));
    if !is_json {
        return Ok(None);
    }

    response.json().await.map(Some)
}

/// Fully buffered, in-memory response.
///
/// Used for synthesized responses and by test transports.
///
/// # Example
///
/// ```
/// use api_middleware_core::response::{ApiResponse, Response};
/// use serde_json::json;
///
/// let response = ApiResponse::json(200, &json!({ "id": 1 }));
/// assert!(response.ok());
/// assert_eq!(response.header("Content-Type"), Some("application/json"));
/// ```
#[derive(Clone, Debug)]
pub struct ApiResponse {
    ok: bool,
    status: u16,
    status_text: String,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl ApiResponse {
    /// Create an empty response with the given status.
    ///
    /// `ok` is derived from the status (2xx) and the status text from the
    /// canonical reason phrase.
    #[must_use]
    pub fn new(status: u16) -> Self {
        let status_text = http::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or_default()
            .to_string();

        Self {
            ok: (200..300).contains(&status),
            status,
            status_text,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Create a response with a JSON body and `Content-Type: application/json`
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status)
            .with_header("Content-Type", "application/json")
            .with_body(body.to_string())
    }

    /// Override the status text
    #[must_use]
    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    /// Override the `ok` flag
    #[must_use]
    pub const fn with_ok(mut self, ok: bool) -> Self {
        self.ok = ok;
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Raw body bytes
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }
}

impl Response for ApiResponse {
    fn ok(&self) -> bool {
        self.ok
    }

    fn status(&self) -> u16 {
        self.status
    }

    fn status_text(&self) -> &str {
        &self.status_text
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn json(&self) -> Pin<Box<dyn Future<Output = Result<Value, ResponseError>> + Send + '_>> {
        Box::pin(async move {
            serde_json::from_slice(&self.body).map_err(|e| ResponseError::Decode(e.to_string()))
        })
    }
}
