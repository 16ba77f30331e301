//! Descriptor resolution.
//!
//! Turns a [`LifecycleDescriptor`] into a finished [`Notification`] by
//! evaluating its payload and meta against the call context. Resolution
//! never fails: resolver errors (and panics) become an
//! [`ApiMiddlewareError::Internal`] payload with `error: true`.

use api_middleware_core::{
    ApiMiddlewareError, LifecycleDescriptor, Notification, Payload, ResolveArgs, Resolvable,
};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;

/// Resolve a descriptor against `(request, state, response?)`.
///
/// `payload` is resolved first, then `meta`.
///
/// - payload failure: payload becomes an internal error, `error` is set
/// - meta failure: meta is removed, payload is overwritten with an internal
///   error (even if it resolved fine), `error` is set
///
/// `error` seeds the notification's error flag (`true` for failure slots).
pub async fn resolve_descriptor<S>(
    descriptor: LifecycleDescriptor<S>,
    args: ResolveArgs<S>,
    error: bool,
) -> Notification
where
    S: Clone,
{
    let LifecycleDescriptor {
        action_type,
        payload,
        meta,
    } = descriptor;

    let mut notification = Notification {
        action_type,
        payload: None,
        meta: None,
        error,
    };

    match resolve(payload, &args).await {
        Ok(payload) => notification.payload = payload,
        Err(err) => {
            tracing::warn!(
                action_type = %notification.action_type,
                error = %err,
                "Payload resolver failed"
            );
            notification.payload = Some(internal_error(&err));
            notification.error = true;
        },
    }

    match resolve(meta, &args).await {
        Ok(meta) => notification.meta = meta,
        Err(err) => {
            tracing::warn!(
                action_type = %notification.action_type,
                error = %err,
                "Meta resolver failed"
            );
            notification.meta = None;
            notification.payload = Some(internal_error(&err));
            notification.error = true;
        },
    }

    notification
}

async fn resolve<S, T>(
    entry: Option<Resolvable<S, T>>,
    args: &ResolveArgs<S>,
) -> anyhow::Result<Option<T>>
where
    S: Clone,
{
    match entry {
        None => Ok(None),
        Some(Resolvable::Value(value)) => Ok(Some(value)),
        Some(Resolvable::Resolver(resolver)) => {
            let future = guarded(|| Ok(resolver(args.clone())))?;
            AssertUnwindSafe(future)
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(panic_error(panic.as_ref())))
        },
    }
}

fn internal_error(err: &anyhow::Error) -> Payload {
    Payload::Error(ApiMiddlewareError::internal(err.to_string()))
}

/// Run a user callback, turning a panic into an error.
pub(crate) fn guarded<T>(f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    std::panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|panic| Err(panic_error(panic.as_ref())))
}

pub(crate) fn panic_error(panic: &(dyn Any + Send)) -> anyhow::Error {
    let message = panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "callback panicked".to_string());
    anyhow::anyhow!(message)
}
