//! Application state access.

/// Returns the current application state snapshot.
///
/// Supplied once when the middleware is built and called every time a
/// dynamic field or resolver needs state. Must be safe for concurrent reads.
///
/// # Examples
///
/// ```
/// use api_middleware_core::environment::GetState;
/// use std::sync::{Arc, RwLock};
///
/// let store = Arc::new(RwLock::new(3_u32));
/// let reader = {
///     let store = Arc::clone(&store);
///     move || store.read().map(|guard| *guard).unwrap_or_default()
/// };
/// assert_eq!(reader.get_state(), 3);
/// ```
pub trait GetState<S>: Send + Sync {
    /// Snapshot of the current state
    fn get_state(&self) -> S;
}

impl<S, F> GetState<S> for F
where
    F: Fn() -> S + Send + Sync,
{
    fn get_state(&self) -> S {
        self()
    }
}
