//! Error shapes carried in notification payloads.
//!
//! These are constructed by the middleware, never thrown past it. Each one
//! ends up as the `payload` of a notification flagged `error: true`.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;
use thiserror::Error;

/// Errors the middleware reports through lifecycle notifications.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiMiddlewareError {
    /// The API call failed validation
    #[error("Invalid API call request")]
    InvalidRequest {
        /// Every violation found by the validation rule set
        validation_errors: Vec<String>,
    },

    /// Something went wrong before a response was received
    ///
    /// Covers bailout, endpoint, headers and options evaluation failures as
    /// well as transport (network) failures.
    #[error("{message}")]
    Request {
        /// Human readable failure description
        message: String,
    },

    /// The server answered with an unsuccessful response
    #[error("{status} - {status_text}")]
    Api {
        /// HTTP status code
        status: u16,
        /// HTTP status text
        status_text: String,
        /// Decoded JSON body, if the response carried one
        response: Option<Value>,
    },

    /// A payload, meta or ok resolver failed
    #[error("{message}")]
    Internal {
        /// Message of the underlying failure
        message: String,
    },
}

impl ApiMiddlewareError {
    /// Create an [`ApiMiddlewareError::InvalidRequest`]
    #[must_use]
    pub const fn invalid_request(validation_errors: Vec<String>) -> Self {
        Self::InvalidRequest { validation_errors }
    }

    /// Create an [`ApiMiddlewareError::Request`]
    #[must_use]
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    /// Create an [`ApiMiddlewareError::Api`]
    #[must_use]
    pub fn api(status: u16, status_text: impl Into<String>, response: Option<Value>) -> Self {
        Self::Api {
            status,
            status_text: status_text.into(),
            response,
        }
    }

    /// Create an [`ApiMiddlewareError::Internal`]
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable name of the error shape
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "InvalidRequestError",
            Self::Request { .. } => "RequestError",
            Self::Api { .. } => "ApiError",
            Self::Internal { .. } => "InternalError",
        }
    }
}

// Serialized as `{ name, message, ...fields }` so downstream consumers can
// tell error payloads apart without knowing the Rust type.
impl Serialize for ApiMiddlewareError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let message = self.to_string();
        match self {
            Self::InvalidRequest { validation_errors } => {
                let mut s = serializer.serialize_struct("InvalidRequestError", 3)?;
                s.serialize_field("name", self.name())?;
                s.serialize_field("message", &message)?;
                s.serialize_field("validation_errors", validation_errors)?;
                s.end()
            },
            Self::Api {
                status,
                status_text,
                response,
            } => {
                let mut s = serializer.serialize_struct("ApiError", 5)?;
                s.serialize_field("name", self.name())?;
                s.serialize_field("message", &message)?;
                s.serialize_field("status", status)?;
                s.serialize_field("status_text", status_text)?;
                s.serialize_field("response", response)?;
                s.end()
            },
            Self::Request { .. } | Self::Internal { .. } => {
                let mut s = serializer.serialize_struct(self.name(), 2)?;
                s.serialize_field("name", self.name())?;
                s.serialize_field("message", &message)?;
                s.end()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn api_error_message_joins_status_and_text() {
        let err = ApiMiddlewareError::api(404, "Not Found", None);
        assert_eq!(err.to_string(), "404 - Not Found");
        assert_eq!(err.name(), "ApiError");
    }

    #[test]
    fn serializes_with_name_and_message() {
        let err = ApiMiddlewareError::invalid_request(vec!["bad method".to_string()]);
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "InvalidRequestError",
                "message": "Invalid API call request",
                "validation_errors": ["bad method"],
            })
        );

        let value = serde_json::to_value(ApiMiddlewareError::internal("boom")).unwrap();
        assert_eq!(value, json!({ "name": "InternalError", "message": "boom" }));
    }
}
