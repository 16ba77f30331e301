//! Mock collaborators for middleware tests
//!
//! - [`MockTransport`]: scripted responses, records every request
//! - [`RecordingNext`]: downstream stage that keeps whatever it receives
//! - [`MockState`]: state accessor that can be changed mid-test and counts reads

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on poisoned locks

use api_middleware_core::pipeline::StageFuture;
use api_middleware_core::transport::TransportFuture;
use api_middleware_core::{
    Action, ApiResponse, GetState, Next, Notification, RequestConfig, Response, Transport,
    TransportError,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A request as seen by [`MockTransport`]
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedRequest {
    /// Resolved endpoint
    pub endpoint: String,
    /// Merged request configuration
    pub config: RequestConfig,
}

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<Result<ApiResponse, TransportError>>,
    calls: Vec<RecordedRequest>,
}

/// Transport replaying scripted replies in order.
///
/// Clones share the same script and call log, so a test can keep one
/// handle and give another to the middleware. Once the script runs out,
/// requests fail with a network error.
///
/// # Example
///
/// ```
/// use api_middleware_core::{ApiResponse, json};
/// use api_middleware_testing::MockTransport;
///
/// let transport = MockTransport::new()
///     .respond(ApiResponse::json(200, &json!({ "id": 1 })))
///     .respond(ApiResponse::new(404));
/// assert_eq!(transport.call_count(), 0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
}

impl MockTransport {
    /// Create a transport with an empty script
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response
    #[must_use]
    pub fn respond(self, response: ApiResponse) -> Self {
        self.script.lock().unwrap().replies.push_back(Ok(response));
        self
    }

    /// Queue a transport failure
    #[must_use]
    pub fn fail(self, error: TransportError) -> Self {
        self.script.lock().unwrap().replies.push_back(Err(error));
        self
    }

    /// Every request received so far
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedRequest> {
        self.script.lock().unwrap().calls.clone()
    }

    /// Number of requests received so far
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.script.lock().unwrap().calls.len()
    }

    /// The transport as the middleware stores it
    #[must_use]
    pub fn shared(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }
}

impl Transport for MockTransport {
    fn request<'a>(&'a self, endpoint: &'a str, config: RequestConfig) -> TransportFuture<'a> {
        let reply = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(RecordedRequest {
                endpoint: endpoint.to_string(),
                config,
            });
            script.replies.pop_front()
        };

        Box::pin(async move {
            match reply {
                Some(Ok(response)) => Ok(Arc::new(response) as Arc<dyn Response>),
                Some(Err(error)) => Err(error),
                None => Err(TransportError::Network(
                    "MockTransport: no scripted reply left".to_string(),
                )),
            }
        })
    }
}

/// Downstream stage that records every action it receives
#[derive(Debug)]
pub struct RecordingNext<A> {
    received: Arc<Mutex<Vec<A>>>,
}

impl<A> Clone for RecordingNext<A> {
    fn clone(&self) -> Self {
        Self {
            received: Arc::clone(&self.received),
        }
    }
}

impl<A> Default for RecordingNext<A> {
    fn default() -> Self {
        Self {
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<A> RecordingNext<A> {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything received so far
    #[must_use]
    pub fn take(&self) -> Vec<A> {
        std::mem::take(&mut *self.received.lock().unwrap())
    }

    /// Number of actions received
    #[must_use]
    pub fn len(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    /// Whether nothing was received
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S> RecordingNext<Action<S>> {
    /// Copies of the notifications received, in order
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter_map(Action::as_notification)
            .cloned()
            .collect()
    }
}

impl<A: Send + 'static> Next<A> for RecordingNext<A> {
    fn dispatch(&self, action: A) -> StageFuture<'_> {
        self.received.lock().unwrap().push(action);
        Box::pin(async {})
    }
}

/// State accessor backed by a mutable cell.
///
/// Every read hands out a clone of the current value and is counted.
#[derive(Debug)]
pub struct MockState<S> {
    value: Arc<Mutex<S>>,
    reads: Arc<AtomicUsize>,
}

impl<S> Clone for MockState<S> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            reads: Arc::clone(&self.reads),
        }
    }
}

impl<S> MockState<S> {
    /// Create an accessor returning `value`
    #[must_use]
    pub fn new(value: S) -> Self {
        Self {
            value: Arc::new(Mutex::new(value)),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the current value
    pub fn set(&self, value: S) {
        *self.value.lock().unwrap() = value;
    }

    /// Number of snapshots taken so far
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl<S: Clone + Send> GetState<S> for MockState<S> {
    fn get_state(&self) -> S {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.value.lock().unwrap().clone()
    }
}
