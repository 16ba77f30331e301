//! # API Middleware Core
//!
//! Core types for the API call middleware.
//!
//! The middleware is a dispatch-pipeline stage: it intercepts actions that
//! carry a declarative [`ApiCall`](call::ApiCall), performs the call, and
//! emits up to two lifecycle [`Notification`](action::Notification)s back
//! into the pipeline (request sent, then success or failure).
//!
//! This crate holds everything that does not need a runtime:
//!
//! - **Call descriptors** ([`call`]): endpoint, method, headers, options,
//!   body, credentials, bailout and the `types` triple
//! - **Notifications** ([`action`]): the uniform `{ type, payload, meta, error }` shape
//! - **Error shapes** ([`error`]): what failure notifications carry
//! - **Normalization** ([`normalize`]): shorthand types to full descriptors
//! - **Validation** ([`validation`]): pluggable rule sets
//! - **Collaborator contracts** ([`transport`], [`response`], [`pipeline`],
//!   [`environment`]): transport, responses, the surrounding pipeline and
//!   state access
//!
//! The orchestrating stage itself lives in `api-middleware-runtime`.

// Re-export commonly used types
pub use serde::{Deserialize, Serialize};
pub use serde_json::{Value, json};

pub mod action;
pub mod call;
pub mod environment;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod response;
pub mod transport;
pub mod validation;

pub use action::{ActionType, Notification, Payload};
pub use call::{ApiCall, Field, LifecycleDescriptor, OkPredicate, ResolveArgs, Resolvable, TypeSlot};
pub use environment::GetState;
pub use error::ApiMiddlewareError;
pub use normalize::{NormalizedTypes, normalize_type_descriptors};
pub use pipeline::{Action, Middleware, Next, PipelineAction};
pub use response::{ApiResponse, Response, ResponseError, get_json};
pub use transport::{
    Credentials, Headers, Method, RequestBody, RequestConfig, RequestOptions, Transport,
    TransportError,
};
pub use validation::{DefaultValidator, Validator, validate_api_call};
