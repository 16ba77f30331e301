//! Declarative API call descriptors.
//!
//! An [`ApiCall`] describes one network call: where to send it, how, and
//! which three lifecycle notifications (request, success, failure) announce
//! its progress. Fields marked dynamic are functions of the current
//! application state, evaluated right before the call is made.
//!
//! # Example
//!
//! ```
//! use api_middleware_core::call::{ApiCall, LifecycleDescriptor, Resolvable};
//! use serde_json::json;
//!
//! #[derive(Clone)]
//! struct AppState {
//!     token: String,
//! }
//!
//! let call: ApiCall<AppState> = ApiCall::new()
//!     .endpoint("https://api.example.com/users")
//!     .method("GET")
//!     .headers_fn(|state: &AppState| {
//!         let mut headers = std::collections::BTreeMap::new();
//!         headers.insert("Authorization".to_string(), format!("Bearer {}", state.token));
//!         Ok(headers)
//!     })
//!     .types(
//!         "USERS_REQUEST",
//!         LifecycleDescriptor::new("USERS_SUCCESS").with_meta(Resolvable::value(json!({ "page": 1 }))),
//!         "USERS_FAILURE",
//!     );
//!
//! assert_eq!(call.request_type().map(|t| t.as_str()), Some("USERS_REQUEST"));
//! ```

use crate::action::{ActionType, Payload};
use crate::response::Response;
use crate::transport::{Credentials, Headers, Method, RequestBody, RequestOptions, Transport};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Function evaluating a dynamic field against the current state
pub type FieldFn<S, T> = Arc<dyn Fn(&S) -> anyhow::Result<T> + Send + Sync>;

/// A call field that is either fixed or computed from state
pub enum Field<S, T> {
    /// Fixed value
    Static(T),
    /// Computed from the current state when the call is prepared
    Dynamic(FieldFn<S, T>),
}

impl<S, T> Field<S, T> {
    /// Wrap a function of state as a dynamic field
    #[must_use]
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&S) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(f))
    }

    /// Resolve the field: clone a static value or invoke the function.
    ///
    /// `state` is only called for dynamic fields.
    ///
    /// # Errors
    ///
    /// Returns whatever the dynamic function returns on failure.
    pub fn resolve(&self, state: impl FnOnce() -> S) -> anyhow::Result<T>
    where
        T: Clone,
    {
        match self {
            Self::Static(value) => Ok(value.clone()),
            Self::Dynamic(f) => f(&state()),
        }
    }
}

impl<S, T: Clone> Clone for Field<S, T> {
    fn clone(&self) -> Self {
        match self {
            Self::Static(value) => Self::Static(value.clone()),
            Self::Dynamic(f) => Self::Dynamic(Arc::clone(f)),
        }
    }
}

impl<S, T: fmt::Debug> fmt::Debug for Field<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Dynamic(_) => write!(f, "Dynamic(<fn>)"),
        }
    }
}

/// Arguments handed to payload and meta resolvers
pub struct ResolveArgs<S> {
    /// The API call being processed
    pub request: Arc<ApiCall<S>>,
    /// State snapshot taken when the notification is built
    pub state: S,
    /// The response, for success and failure notifications
    pub response: Option<Arc<dyn Response>>,
}

impl<S: Clone> Clone for ResolveArgs<S> {
    fn clone(&self) -> Self {
        Self {
            request: Arc::clone(&self.request),
            state: self.state.clone(),
            response: self.response.clone(),
        }
    }
}

/// Async resolver producing a payload or meta value
pub type ResolverFn<S, T> =
    Arc<dyn Fn(ResolveArgs<S>) -> BoxFuture<'static, anyhow::Result<Option<T>>> + Send + Sync>;

/// A payload or meta entry: a value, or an async function of the call context
pub enum Resolvable<S, T> {
    /// Used as is
    Value(T),
    /// Invoked with `(request, state, response?)`; `Ok(None)` leaves the field empty
    Resolver(ResolverFn<S, T>),
}

impl<S, T> Resolvable<S, T>
where
    S: 'static,
    T: 'static,
{
    /// Fixed value
    #[must_use]
    pub fn value(value: impl Into<T>) -> Self {
        Self::Value(value.into())
    }

    /// Resolver that may leave the field empty
    #[must_use]
    pub fn resolver<F, Fut>(f: F) -> Self
    where
        F: Fn(ResolveArgs<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<T>>> + Send + 'static,
    {
        Self::Resolver(Arc::new(move |args| f(args).boxed()))
    }

    /// Resolver that always produces a value
    #[must_use]
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(ResolveArgs<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self::Resolver(Arc::new(move |args| {
            f(args).map(|result| result.map(Some)).boxed()
        }))
    }
}

impl<S, T: Clone> Clone for Resolvable<S, T> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(value) => Self::Value(value.clone()),
            Self::Resolver(f) => Self::Resolver(Arc::clone(f)),
        }
    }
}

impl<S, T: fmt::Debug> fmt::Debug for Resolvable<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Resolver(_) => write!(f, "Resolver(<fn>)"),
        }
    }
}

/// Full description of one lifecycle notification
pub struct LifecycleDescriptor<S> {
    /// Notification type
    pub action_type: ActionType,
    /// Payload, value or resolver
    pub payload: Option<Resolvable<S, Payload>>,
    /// Metadata, value or resolver
    pub meta: Option<Resolvable<S, Value>>,
}

impl<S> LifecycleDescriptor<S> {
    /// Descriptor with only a type
    #[must_use]
    pub fn new(action_type: impl Into<ActionType>) -> Self {
        Self {
            action_type: action_type.into(),
            payload: None,
            meta: None,
        }
    }

    /// Set the payload
    #[must_use]
    pub fn with_payload(mut self, payload: Resolvable<S, Payload>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Set the metadata
    #[must_use]
    pub fn with_meta(mut self, meta: Resolvable<S, Value>) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl<S> Clone for LifecycleDescriptor<S> {
    fn clone(&self) -> Self {
        Self {
            action_type: self.action_type.clone(),
            payload: self.payload.clone(),
            meta: self.meta.clone(),
        }
    }
}

impl<S> fmt::Debug for LifecycleDescriptor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleDescriptor")
            .field("action_type", &self.action_type)
            .field("payload", &self.payload)
            .field("meta", &self.meta)
            .finish()
    }
}

/// One entry of the `types` triple
pub enum TypeSlot<S> {
    /// Shorthand: just the notification type
    Bare(ActionType),
    /// Full descriptor
    Descriptor(LifecycleDescriptor<S>),
}

impl<S> TypeSlot<S> {
    /// The notification type this slot announces
    #[must_use]
    pub const fn action_type(&self) -> &ActionType {
        match self {
            Self::Bare(action_type) => action_type,
            Self::Descriptor(descriptor) => &descriptor.action_type,
        }
    }
}

impl<S> Clone for TypeSlot<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Bare(action_type) => Self::Bare(action_type.clone()),
            Self::Descriptor(descriptor) => Self::Descriptor(descriptor.clone()),
        }
    }
}

impl<S> fmt::Debug for TypeSlot<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bare(action_type) => f.debug_tuple("Bare").field(action_type).finish(),
            Self::Descriptor(descriptor) => f.debug_tuple("Descriptor").field(descriptor).finish(),
        }
    }
}

impl<S> From<&'static str> for TypeSlot<S> {
    fn from(name: &'static str) -> Self {
        Self::Bare(ActionType::from(name))
    }
}

impl<S> From<String> for TypeSlot<S> {
    fn from(name: String) -> Self {
        Self::Bare(ActionType::from(name))
    }
}

impl<S> From<ActionType> for TypeSlot<S> {
    fn from(action_type: ActionType) -> Self {
        Self::Bare(action_type)
    }
}

impl<S> From<LifecycleDescriptor<S>> for TypeSlot<S> {
    fn from(descriptor: LifecycleDescriptor<S>) -> Self {
        Self::Descriptor(descriptor)
    }
}

/// Predicate deciding whether a response counts as success
pub type OkPredicate = Arc<dyn Fn(&dyn Response) -> anyhow::Result<bool> + Send + Sync>;

/// Declarative description of one API call.
///
/// Fields are public and loosely typed (`method` and `credentials` are
/// strings, `types` is a list) so malformed calls can be represented and
/// reported through validation rather than rejected at construction.
pub struct ApiCall<S> {
    /// Target URL
    pub endpoint: Option<Field<S, String>>,
    /// HTTP verb, case-insensitive
    pub method: Option<String>,
    /// Request headers
    pub headers: Option<Field<S, Headers>>,
    /// Extra transport options
    pub options: Option<Field<S, RequestOptions>>,
    /// Request body, forwarded unchanged
    pub body: Option<RequestBody>,
    /// Credential policy token
    pub credentials: Option<String>,
    /// When it resolves to `true` the call is silently abandoned
    pub bailout: Option<Field<S, bool>>,
    /// Request, success and failure notification slots
    pub types: Vec<TypeSlot<S>>,
    /// Transport used instead of the middleware's
    pub transport: Option<Arc<dyn Transport>>,
    /// Success predicate used instead of the middleware's
    pub ok: Option<OkPredicate>,
}

impl<S> ApiCall<S> {
    /// Empty call; fill it with the builder methods
    #[must_use]
    pub fn new() -> Self {
        Self {
            endpoint: None,
            method: None,
            headers: None,
            options: None,
            body: None,
            credentials: None,
            bailout: None,
            types: Vec::new(),
            transport: None,
            ok: None,
        }
    }

    /// Static endpoint
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(Field::Static(endpoint.into()));
        self
    }

    /// Endpoint computed from state
    #[must_use]
    pub fn endpoint_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&S) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        self.endpoint = Some(Field::dynamic(f));
        self
    }

    /// HTTP verb
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Static headers
    #[must_use]
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = Some(Field::Static(headers));
        self
    }

    /// Headers computed from state
    #[must_use]
    pub fn headers_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&S) -> anyhow::Result<Headers> + Send + Sync + 'static,
    {
        self.headers = Some(Field::dynamic(f));
        self
    }

    /// Static transport options
    #[must_use]
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = Some(Field::Static(options));
        self
    }

    /// Transport options computed from state
    #[must_use]
    pub fn options_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&S) -> anyhow::Result<RequestOptions> + Send + Sync + 'static,
    {
        self.options = Some(Field::dynamic(f));
        self
    }

    /// Request body
    #[must_use]
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Credential policy token (`omit`, `same-origin`, `include`)
    #[must_use]
    pub fn credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    /// Fixed bailout flag
    #[must_use]
    pub fn bailout(mut self, bailout: bool) -> Self {
        self.bailout = Some(Field::Static(bailout));
        self
    }

    /// Bailout computed from state
    #[must_use]
    pub fn bailout_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&S) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.bailout = Some(Field::dynamic(f));
        self
    }

    /// Set the request, success and failure slots
    #[must_use]
    pub fn types(
        mut self,
        request: impl Into<TypeSlot<S>>,
        success: impl Into<TypeSlot<S>>,
        failure: impl Into<TypeSlot<S>>,
    ) -> Self {
        self.types = vec![request.into(), success.into(), failure.into()];
        self
    }

    /// Use a dedicated transport for this call
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a dedicated success predicate for this call
    #[must_use]
    pub fn ok_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&dyn Response) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.ok = Some(Arc::new(f));
        self
    }

    /// The request-type identifier, if it can be determined.
    ///
    /// It is the type of the first slot, provided that slot exists and its
    /// type is not empty.
    #[must_use]
    pub fn request_type(&self) -> Option<&ActionType> {
        self.types
            .first()
            .map(TypeSlot::action_type)
            .filter(|action_type| !action_type.is_empty())
    }

    /// Parse `method` into a [`Method`].
    ///
    /// # Errors
    ///
    /// Returns a violation message when the method is missing or unknown.
    pub fn parse_method(&self) -> Result<Method, String> {
        self.method
            .as_deref()
            .ok_or_else(|| "[ApiCall] must have a method".to_string())?
            .parse()
    }

    /// Parse `credentials` into a [`Credentials`].
    ///
    /// # Errors
    ///
    /// Returns a violation message when the token is unknown.
    pub fn parse_credentials(&self) -> Result<Option<Credentials>, String> {
        self.credentials
            .as_deref()
            .map(str::parse::<Credentials>)
            .transpose()
    }

    /// View `types` as a triple.
    ///
    /// # Errors
    ///
    /// Returns a violation message when `types` does not have three entries.
    pub fn type_triple(&self) -> Result<&[TypeSlot<S>; 3], String> {
        self.types.as_slice().try_into().map_err(|_| {
            format!(
                "[ApiCall].types must have exactly three entries, found {}",
                self.types.len()
            )
        })
    }
}

impl<S> Default for ApiCall<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for ApiCall<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCall")
            .field("endpoint", &self.endpoint)
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("options", &self.options)
            .field("body", &self.body)
            .field("credentials", &self.credentials)
            .field("bailout", &self.bailout)
            .field("types", &self.types)
            .field("transport", &self.transport.as_ref().map(|_| "<transport>"))
            .field("ok", &self.ok.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
