//! HTTP transport built on `reqwest`.
//!
//! [`HttpTransport`] implements [`Transport`] for real network calls. The
//! returned [`HttpResponse`] keeps the connection's body unread until a
//! resolver asks for JSON, then buffers it so later reads are free.
//!
//! A `timeout_ms` entry in the call's `options` becomes a per-request
//! timeout. Other options are ignored by this transport.

use crate::config::{ConfigError, HttpTransportConfig};
use api_middleware_core::{
    RequestBody, RequestConfig, Response, ResponseError, Transport, TransportError,
    transport::TransportFuture,
};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};

/// Option key holding a per-request timeout in milliseconds
pub const TIMEOUT_OPTION: &str = "timeout_ms";

/// Transport performing calls with a shared `reqwest::Client`
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport from configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ClientBuild`] if a default header is invalid
    /// or the client cannot be constructed.
    pub fn new(config: &HttpTransportConfig) -> Result<Self, ConfigError> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ConfigError::ClientBuild(e.to_string()))?;
            let value =
                HeaderValue::from_str(value).map_err(|e| ConfigError::ClientBuild(e.to_string()))?;
            default_headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout())
            .default_headers(default_headers);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| ConfigError::ClientBuild(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build_request(
        &self,
        endpoint: &str,
        config: RequestConfig,
    ) -> Result<reqwest::Request, TransportError> {
        let RequestConfig {
            method,
            body,
            credentials,
            headers,
            options,
        } = config;

        let mut builder = self.client.request(method.into(), endpoint);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match body {
            Some(RequestBody::Text(text)) => builder.body(text),
            Some(RequestBody::Bytes(bytes)) => builder.body(bytes),
            Some(RequestBody::Json(value)) => builder.json(&value),
            None => builder,
        };

        if let Some(millis) = options.get(TIMEOUT_OPTION).and_then(Value::as_u64) {
            builder = builder.timeout(Duration::from_millis(millis));
        }

        if let Some(credentials) = credentials {
            // No cookie jar: the policy is recorded, not enforced
            tracing::trace!(credentials = credentials.as_str(), "Credential policy forwarded");
        }

        builder
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))
    }
}

impl Transport for HttpTransport {
    fn request<'a>(&'a self, endpoint: &'a str, config: RequestConfig) -> TransportFuture<'a> {
        Box::pin(async move {
            let request = self.build_request(endpoint, config)?;
            let response = self.client.execute(request).await.map_err(map_error)?;

            tracing::debug!(
                endpoint,
                status = response.status().as_u16(),
                "HTTP response received"
            );

            Ok(Arc::new(HttpResponse::new(response)) as Arc<dyn Response>)
        })
    }
}

fn map_error(error: reqwest::Error) -> TransportError {
    if error.is_builder() {
        TransportError::InvalidRequest(error.to_string())
    } else if error.is_timeout() {
        TransportError::Network(format!("Request timed out: {error}"))
    } else {
        TransportError::Network(error.to_string())
    }
}

/// Response from [`HttpTransport`].
///
/// Status and headers are captured eagerly; the body is read from the
/// connection at most once, on first [`Response::json`] call.
#[derive(Debug)]
pub struct HttpResponse {
    status: u16,
    status_text: String,
    headers: HeaderMap,
    inner: Mutex<Option<reqwest::Response>>,
    body: OnceCell<Result<Bytes, ResponseError>>,
}

impl HttpResponse {
    fn new(response: reqwest::Response) -> Self {
        let status = response.status();
        Self {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers: response.headers().clone(),
            inner: Mutex::new(Some(response)),
            body: OnceCell::new(),
        }
    }

    /// Raw body bytes, reading them from the connection on first use
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::BodyRead`] if the connection failed mid-body.
    pub async fn bytes(&self) -> Result<Bytes, ResponseError> {
        self.body
            .get_or_init(|| async {
                match self.inner.lock().await.take() {
                    Some(response) => response
                        .bytes()
                        .await
                        .map_err(|e| ResponseError::BodyRead(e.to_string())),
                    None => Ok(Bytes::new()),
                }
            })
            .await
            .clone()
    }
}

impl Response for HttpResponse {
    fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn status(&self) -> u16 {
        self.status
    }

    fn status_text(&self) -> &str {
        &self.status_text
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    fn json(&self) -> Pin<Box<dyn Future<Output = Result<Value, ResponseError>> + Send + '_>> {
        Box::pin(async move {
            let body = self.bytes().await?;
            serde_json::from_slice(&body).map_err(|e| ResponseError::Decode(e.to_string()))
        })
    }
}
