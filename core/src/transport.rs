//! Transport contract.
//!
//! The middleware performs each call through a [`Transport`]:
//! `request(endpoint, config) -> Response`. The HTTP implementation lives in
//! the runtime crate; tests use scripted transports.

use crate::response::Response;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Request headers, ordered by name
pub type Headers = BTreeMap<String, String>;

/// Extra transport options (`{"timeout_ms": 5000}`, ...)
pub type RequestOptions = Map<String, Value>;

/// HTTP verbs an API call may use
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET
    Get,
    /// HEAD
    Head,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// OPTIONS
    Options,
}

impl Method {
    /// Every accepted verb
    pub const ALL: [Self; 7] = [
        Self::Get,
        Self::Head,
        Self::Post,
        Self::Put,
        Self::Patch,
        Self::Delete,
        Self::Options,
    ];

    /// Upper-case verb
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    /// Case-insensitive parse
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Invalid [ApiCall].method: {s}"))
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Head => Self::HEAD,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Patch => Self::PATCH,
            Method::Delete => Self::DELETE,
            Method::Options => Self::OPTIONS,
        }
    }
}

/// Credential policy forwarded to the transport
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Credentials {
    /// Never send credentials
    Omit,
    /// Send credentials to the same origin only
    SameOrigin,
    /// Always send credentials
    Include,
}

impl Credentials {
    /// Policy token as written in a call descriptor
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Omit => "omit",
            Self::SameOrigin => "same-origin",
            Self::Include => "include",
        }
    }
}

impl FromStr for Credentials {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "omit" => Ok(Self::Omit),
            "same-origin" => Ok(Self::SameOrigin),
            "include" => Ok(Self::Include),
            other => Err(format!("Invalid [ApiCall].credentials: {other}")),
        }
    }
}

/// Opaque request body
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Bytes(bytes::Bytes),
    /// JSON document, serialized by the transport
    Json(Value),
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Everything the transport needs besides the endpoint
#[derive(Clone, Debug, PartialEq)]
pub struct RequestConfig {
    /// HTTP verb
    pub method: Method,
    /// Body, if any
    pub body: Option<RequestBody>,
    /// Credential policy, if any
    pub credentials: Option<Credentials>,
    /// Resolved headers
    pub headers: Headers,
    /// Remaining transport options
    pub options: RequestOptions,
}

impl RequestConfig {
    /// Keys of `options` shadowed by the explicit fields
    pub const RESERVED_OPTIONS: [&'static str; 4] = ["method", "body", "credentials", "headers"];

    /// Merge resolved options with the explicit call fields.
    ///
    /// Explicit fields win: reserved keys are dropped from `options`.
    #[must_use]
    pub fn merge(
        mut options: RequestOptions,
        method: Method,
        body: Option<RequestBody>,
        credentials: Option<Credentials>,
        headers: Option<Headers>,
    ) -> Self {
        for key in Self::RESERVED_OPTIONS {
            options.remove(key);
        }

        Self {
            method,
            body,
            credentials,
            headers: headers.unwrap_or_default(),
            options,
        }
    }
}

/// Errors a transport may fail with before producing a response
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection, DNS, TLS or timeout failure
    #[error("{0}")]
    Network(String),

    /// The request could not be built (bad header, bad URL, ...)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Boxed future returned by [`Transport::request`]
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Arc<dyn Response>, TransportError>> + Send + 'a>>;

/// Performs one network call.
///
/// # Dyn Compatibility
///
/// `request` returns an explicit `Pin<Box<dyn Future>>` so transports can
/// be stored as `Arc<dyn Transport>`, both on the middleware and per call.
pub trait Transport: Send + Sync {
    /// Perform the call.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no response could be obtained.
    /// Unsuccessful HTTP statuses are *not* errors.
    fn request<'a>(&'a self, endpoint: &'a str, config: RequestConfig) -> TransportFuture<'a>;
}
