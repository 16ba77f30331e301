//! Dispatch pipeline seams.
//!
//! The dispatch pipeline itself is external. The middleware only needs to
//! recognize API call actions ([`PipelineAction`]), build notification
//! actions, and forward actions downstream ([`Next`]).

use crate::action::Notification;
use crate::call::ApiCall;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by pipeline stages
pub type StageFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// The downstream part of the pipeline.
///
/// Blanket-implemented for async closures taking the action by value.
pub trait Next<A>: Send + Sync {
    /// Forward an action downstream
    fn dispatch(&self, action: A) -> StageFuture<'_>;
}

impl<A, F, Fut> Next<A> for F
where
    F: Fn(A) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn dispatch(&self, action: A) -> StageFuture<'_> {
        Box::pin(self(action))
    }
}

/// Actions flowing through a pipeline that may carry an API call
pub trait PipelineAction<S>: Sized + Send + 'static {
    /// Take the API call out of the action, or hand the action back untouched
    ///
    /// # Errors
    ///
    /// Returns the original action when it does not carry an API call.
    fn into_api_call(self) -> Result<ApiCall<S>, Self>;

    /// Wrap a lifecycle notification as an action
    fn from_notification(notification: Notification) -> Self;
}

/// Ready-made action type for pipelines that only carry calls and notifications
#[derive(Debug)]
pub enum Action<S> {
    /// An API call to perform
    Call(ApiCall<S>),
    /// A lifecycle (or any other) notification
    Notify(Notification),
}

impl<S: Send + 'static> PipelineAction<S> for Action<S> {
    fn into_api_call(self) -> Result<ApiCall<S>, Self> {
        match self {
            Self::Call(call) => Ok(call),
            other @ Self::Notify(_) => Err(other),
        }
    }

    fn from_notification(notification: Notification) -> Self {
        Self::Notify(notification)
    }
}

impl<S> Action<S> {
    /// The notification, if this action is one
    #[must_use]
    pub const fn as_notification(&self) -> Option<&Notification> {
        match self {
            Self::Notify(notification) => Some(notification),
            Self::Call(_) => None,
        }
    }
}

/// A pipeline stage.
///
/// # Dyn Compatibility
///
/// Uses an explicit boxed future so stages can be stored as
/// `Arc<dyn Middleware<A>>`.
pub trait Middleware<A>: Send + Sync {
    /// Process one action, forwarding whatever the stage emits to `next`
    fn handle<'a>(&'a self, action: A, next: &'a dyn Next<A>) -> StageFuture<'a>;
}
