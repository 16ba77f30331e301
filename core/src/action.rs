//! Notification types emitted into the dispatch pipeline.
//!
//! A [`Notification`] follows the Flux Standard Action shape:
//! `{ type, payload?, meta?, error? }`.

use crate::error::ApiMiddlewareError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

/// Identifier of a lifecycle notification (`"FETCH_USER_REQUEST"`, ...)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionType(Cow<'static, str>);

impl ActionType {
    /// Create an action type from a static or owned string
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// The identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is the empty string
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for ActionType {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl From<String> for ActionType {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

/// Notification payload: plain data or one of the constructed error shapes
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// Arbitrary JSON data
    Value(Value),
    /// Error constructed by the middleware
    Error(ApiMiddlewareError),
}

impl Payload {
    /// The JSON value, if this is not an error payload
    #[must_use]
    pub const fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Error(_) => None,
        }
    }

    /// The error, if this is an error payload
    #[must_use]
    pub const fn as_error(&self) -> Option<&ApiMiddlewareError> {
        match self {
            Self::Error(err) => Some(err),
            Self::Value(_) => None,
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<ApiMiddlewareError> for Payload {
    fn from(err: ApiMiddlewareError) -> Self {
        Self::Error(err)
    }
}

/// A lifecycle notification (request sent, success, failure)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Notification {
    /// Notification identifier, always taken from the call's `types` triple
    #[serde(rename = "type")]
    pub action_type: ActionType,

    /// Resolved payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,

    /// Resolved metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,

    /// Set when the notification reports a failure
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl Notification {
    /// Create a notification carrying only its type
    #[must_use]
    pub fn new(action_type: impl Into<ActionType>) -> Self {
        Self {
            action_type: action_type.into(),
            payload: None,
            meta: None,
            error: false,
        }
    }

    /// Create an error notification with the given error payload
    #[must_use]
    pub fn failure(action_type: impl Into<ActionType>, err: ApiMiddlewareError) -> Self {
        Self {
            action_type: action_type.into(),
            payload: Some(Payload::Error(err)),
            meta: None,
            error: true,
        }
    }

    /// The error payload, if any
    #[must_use]
    pub fn error_payload(&self) -> Option<&ApiMiddlewareError> {
        self.payload.as_ref().and_then(Payload::as_error)
    }
}
