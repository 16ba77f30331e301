//! The API call middleware stage.
//!
//! [`ApiMiddleware`] intercepts actions carrying an [`ApiCall`], performs
//! the call, and emits lifecycle notifications downstream:
//!
//! ```text
//! action ─▶ not a call? ──────────────────────────▶ next(action)
//!             │
//!             ▼
//!          validate ─ violations ─▶ next(request-type InvalidRequestError)
//!             │
//!          normalize types
//!             │
//!          bailout ─ true ─▶ (nothing)
//!             │
//!          endpoint ▸ headers ▸ options ─ failure ─▶ next(request-type RequestError)
//!             │
//!          next(request-type)
//!             │
//!          transport ─ failure ─▶ next(request-type RequestError)
//!             │
//!          ok? ─▶ next(success-type) | next(failure-type, error: true)
//! ```
//!
//! Every step is fallible and short-circuits with a `Halt`; at most one
//! notification follows the request-sent one.

use crate::config::{ConfigError, MiddlewareConfig};
use crate::http::HttpTransport;
use crate::metrics::{ApiCallMetrics, Outcome};
use crate::resolve::{guarded, panic_error, resolve_descriptor};
use api_middleware_core::pipeline::StageFuture;
use api_middleware_core::{
    ApiCall, ApiMiddlewareError, Credentials, DefaultValidator, Field, GetState,
    LifecycleDescriptor, Method, Middleware, Next, Notification, OkPredicate, Payload,
    PipelineAction, RequestConfig, ResolveArgs, Resolvable, Response, Transport, TransportError,
    TypeSlot, Validator, normalize_type_descriptors,
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

/// Why a call stopped before producing a final notification
#[derive(Debug)]
pub(crate) enum Halt {
    /// Stop without emitting anything (bailout, undeterminable request-type)
    Silent,
    /// Stop after emitting this notification
    Notify(Notification),
}

/// Pipeline stage performing API calls.
///
/// # Type Parameters
///
/// - `S`: application state snapshot handed to dynamic fields and resolvers
///
/// # Example
///
/// ```no_run
/// use api_middleware_core::{Action, ApiCall};
/// use api_middleware_runtime::{ApiMiddleware, MiddlewareConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let middleware = ApiMiddleware::<()>::from_config(|| (), &MiddlewareConfig::from_env()?)?;
///
/// let call = ApiCall::new()
///     .endpoint("https://api.example.com/users")
///     .method("GET")
///     .types("USERS_REQUEST", "USERS_SUCCESS", "USERS_FAILURE");
///
/// let next = |action: Action<()>| async move {
///     println!("{action:?}");
/// };
/// middleware.process(Action::Call(call), &next).await;
/// # Ok(())
/// # }
/// ```
pub struct ApiMiddleware<S> {
    get_state: Arc<dyn GetState<S>>,
    transport: Arc<dyn Transport>,
    validator: Arc<dyn Validator<S>>,
    ok: Option<OkPredicate>,
    metrics: bool,
}

impl<S> Clone for ApiMiddleware<S> {
    fn clone(&self) -> Self {
        Self {
            get_state: Arc::clone(&self.get_state),
            transport: Arc::clone(&self.transport),
            validator: Arc::clone(&self.validator),
            ok: self.ok.clone(),
            metrics: self.metrics,
        }
    }
}

impl<S> std::fmt::Debug for ApiMiddleware<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMiddleware")
            .field("ok", &self.ok.as_ref().map(|_| "<fn>"))
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl<S> ApiMiddleware<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Create a stage with the default validator and no metrics
    #[must_use]
    pub fn new(get_state: impl GetState<S> + 'static, transport: Arc<dyn Transport>) -> Self {
        Self {
            get_state: Arc::new(get_state),
            transport,
            validator: Arc::new(DefaultValidator),
            ok: None,
            metrics: false,
        }
    }

    /// Create a stage backed by an [`HttpTransport`] built from `config`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn from_config(
        get_state: impl GetState<S> + 'static,
        config: &MiddlewareConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport = HttpTransport::new(&config.http)?;
        Ok(Self::new(get_state, Arc::new(transport)).with_metrics(config.metrics_enabled))
    }

    /// Replace the validation rule set
    #[must_use]
    pub fn with_validator(mut self, validator: impl Validator<S> + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Success predicate used when a call does not bring its own
    #[must_use]
    pub fn with_ok<F>(mut self, f: F) -> Self
    where
        F: Fn(&dyn Response) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.ok = Some(Arc::new(f));
        self
    }

    /// Enable or disable metric recording
    #[must_use]
    pub const fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics = enabled;
        self
    }

    /// Process one action.
    ///
    /// Non-call actions are forwarded to `next` unchanged. Calls are
    /// performed and their lifecycle notifications forwarded instead; the
    /// call action itself never reaches `next`.
    pub async fn process<A, N>(&self, action: A, next: &N)
    where
        A: PipelineAction<S>,
        N: Next<A> + ?Sized,
    {
        match action.into_api_call() {
            Ok(call) => self.execute(Arc::new(call), next).await,
            Err(action) => {
                tracing::trace!("Action carries no API call, passing through");
                if self.metrics {
                    ApiCallMetrics::record_pass_through();
                }
                next.dispatch(action).await;
            },
        }
    }

    #[tracing::instrument(
        name = "api_call",
        skip_all,
        fields(endpoint = tracing::field::Empty, method = tracing::field::Empty)
    )]
    async fn execute<A, N>(&self, call: Arc<ApiCall<S>>, next: &N)
    where
        A: PipelineAction<S>,
        N: Next<A> + ?Sized,
    {
        match self.run(&call, next).await {
            Ok(notification) | Err(Halt::Notify(notification)) => {
                next.dispatch(A::from_notification(notification)).await;
            },
            Err(Halt::Silent) => {},
        }
    }

    async fn run<A, N>(&self, call: &Arc<ApiCall<S>>, next: &N) -> Result<Notification, Halt>
    where
        A: PipelineAction<S>,
        N: Next<A> + ?Sized,
    {
        let validated = self.validate(call)?;
        tracing::Span::current().record("method", validated.method.as_str());

        let types = normalize_type_descriptors(validated.types);

        let bailout = self
            .field(call, &types.request, call.bailout.as_ref(), "bailout")
            .await?;
        if bailout.unwrap_or(false) {
            tracing::debug!("Bailout requested, call abandoned");
            if self.metrics {
                ApiCallMetrics::record_bailout();
            }
            return Err(Halt::Silent);
        }

        let endpoint = self
            .field(call, &types.request, Some(validated.endpoint), "endpoint")
            .await?
            .unwrap_or_default();
        tracing::Span::current().record("endpoint", endpoint.as_str());

        let headers = self
            .field(call, &types.request, call.headers.as_ref(), "headers")
            .await?;
        let options = self
            .field(call, &types.request, call.options.as_ref(), "options")
            .await?;

        let config = RequestConfig::merge(
            options.unwrap_or_default(),
            validated.method,
            call.body.clone(),
            validated.credentials,
            headers,
        );

        let sent = resolve_descriptor(types.request.clone(), self.args(call, None), false).await;
        tracing::debug!(action_type = %sent.action_type, "Request sent");
        next.dispatch(A::from_notification(sent)).await;
        if self.metrics {
            ApiCallMetrics::record_request_sent();
        }

        let started = Instant::now();
        let transport = call.transport.as_ref().unwrap_or(&self.transport);
        let response = match perform(transport.as_ref(), &endpoint, config).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "Transport failed");
                if self.metrics {
                    ApiCallMetrics::record_transport_error(started.elapsed());
                }
                return Err(Halt::Notify(
                    self.request_error(call, &types.request, err.to_string()).await,
                ));
            },
        };

        let predicate = call.ok.as_ref().or(self.ok.as_ref());
        let ok = match predicate {
            Some(predicate) => guarded(|| predicate(response.as_ref())),
            None => Ok(response.ok()),
        };

        let status = response.status();
        let args = self.args(call, Some(Arc::clone(&response)));
        let (outcome, notification) = match ok {
            Ok(true) => (
                Outcome::Success,
                resolve_descriptor(types.success, args, false).await,
            ),
            Ok(false) => (
                Outcome::Failure,
                resolve_descriptor(types.failure, args, true).await,
            ),
            Err(err) => {
                tracing::warn!(error = %err, "Success predicate failed");
                let descriptor = LifecycleDescriptor {
                    payload: Some(error_payload(ApiMiddlewareError::internal(
                        "[ApiCall].ok function failed",
                    ))),
                    ..types.failure
                };
                (Outcome::Failure, resolve_descriptor(descriptor, args, true).await)
            },
        };

        tracing::debug!(
            status,
            action_type = %notification.action_type,
            error = notification.error,
            "Response handled"
        );
        if self.metrics {
            ApiCallMetrics::record_response(outcome, status, started.elapsed());
        }

        Ok(notification)
    }

    fn validate<'c>(&self, call: &'c ApiCall<S>) -> Result<Validated<'c, S>, Halt> {
        let mut violations = self.validator.validate(call);

        let parsed = Validated::parse(call);
        if let Err(structural) = &parsed {
            for violation in structural {
                if !violations.contains(violation) {
                    violations.push(violation.clone());
                }
            }
        }

        match parsed {
            Ok(validated) if violations.is_empty() => Ok(validated),
            _ => {
                tracing::warn!(?violations, "Invalid API call");
                if self.metrics {
                    ApiCallMetrics::record_invalid();
                }
                Err(call.request_type().map_or(Halt::Silent, |request_type| {
                    Halt::Notify(Notification::failure(
                        request_type.clone(),
                        ApiMiddlewareError::invalid_request(violations),
                    ))
                }))
            },
        }
    }

    /// Resolve a possibly dynamic field against a fresh state snapshot.
    ///
    /// A failing function stops the call with a request-type
    /// `RequestError("[ApiCall].<name> function failed")`.
    async fn field<T: Clone>(
        &self,
        call: &Arc<ApiCall<S>>,
        request: &LifecycleDescriptor<S>,
        field: Option<&Field<S, T>>,
        name: &'static str,
    ) -> Result<Option<T>, Halt> {
        let Some(field) = field else {
            return Ok(None);
        };

        match guarded(|| field.resolve(|| self.get_state.get_state())) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                tracing::warn!(field = name, error = %err, "Dynamic field failed");
                if self.metrics {
                    ApiCallMetrics::record_field_error(name);
                }
                Err(Halt::Notify(
                    self.request_error(call, request, format!("[ApiCall].{name} function failed"))
                        .await,
                ))
            },
        }
    }

    // Request-type descriptor with its payload replaced; meta still resolves
    async fn request_error(
        &self,
        call: &Arc<ApiCall<S>>,
        request: &LifecycleDescriptor<S>,
        message: String,
    ) -> Notification {
        let descriptor = LifecycleDescriptor {
            payload: Some(error_payload(ApiMiddlewareError::request(message))),
            ..request.clone()
        };
        resolve_descriptor(descriptor, self.args(call, None), true).await
    }

    fn args(&self, call: &Arc<ApiCall<S>>, response: Option<Arc<dyn Response>>) -> ResolveArgs<S> {
        ResolveArgs {
            request: Arc::clone(call),
            state: self.get_state.get_state(),
            response,
        }
    }
}

impl<S, A> Middleware<A> for ApiMiddleware<S>
where
    S: Clone + Send + Sync + 'static,
    A: PipelineAction<S>,
{
    fn handle<'a>(&'a self, action: A, next: &'a dyn Next<A>) -> StageFuture<'a> {
        Box::pin(self.process(action, next))
    }
}

/// The parts of a call that must parse before it can be performed
struct Validated<'c, S> {
    endpoint: &'c Field<S, String>,
    method: Method,
    credentials: Option<Credentials>,
    types: &'c [TypeSlot<S>; 3],
}

impl<'c, S> Validated<'c, S> {
    fn parse(call: &'c ApiCall<S>) -> Result<Self, Vec<String>> {
        let endpoint = call
            .endpoint
            .as_ref()
            .ok_or_else(|| "[ApiCall] must have an endpoint".to_string());
        let method = call.parse_method();
        let credentials = call.parse_credentials();
        let types = call.type_triple();

        match (endpoint, method, credentials, types) {
            (Ok(endpoint), Ok(method), Ok(credentials), Ok(types)) => Ok(Self {
                endpoint,
                method,
                credentials,
                types,
            }),
            (endpoint, method, credentials, types) => Err([
                endpoint.err(),
                method.err(),
                credentials.err(),
                types.err(),
            ]
            .into_iter()
            .flatten()
            .collect()),
        }
    }
}

async fn perform(
    transport: &dyn Transport,
    endpoint: &str,
    config: RequestConfig,
) -> Result<Arc<dyn Response>, TransportError> {
    let request = guarded(|| Ok(transport.request(endpoint, config)))
        .map_err(|e| TransportError::Network(e.to_string()))?;
    AssertUnwindSafe(request)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            Err(TransportError::Network(panic_error(panic.as_ref()).to_string()))
        })
}

const fn error_payload<S>(error: ApiMiddlewareError) -> Resolvable<S, Payload> {
    Resolvable::Value(Payload::Error(error))
}
