//! Descriptor normalization.
//!
//! Expands the `types` triple into three full [`LifecycleDescriptor`]s and
//! injects the default payload resolvers for the success and failure slots.

use crate::action::Payload;
use crate::call::{LifecycleDescriptor, ResolveArgs, Resolvable, TypeSlot};
use crate::error::ApiMiddlewareError;
use crate::response::get_json;

/// The three lifecycle descriptors of a call, in full form
pub struct NormalizedTypes<S> {
    /// Emitted before the call is made
    pub request: LifecycleDescriptor<S>,
    /// Emitted when the response is successful
    pub success: LifecycleDescriptor<S>,
    /// Emitted when the response is unsuccessful
    pub failure: LifecycleDescriptor<S>,
}

impl<S> std::fmt::Debug for NormalizedTypes<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizedTypes")
            .field("request", &self.request)
            .field("success", &self.success)
            .field("failure", &self.failure)
            .finish()
    }
}

/// Normalize a `types` triple.
///
/// Bare identifiers become `{ type }`. The success slot's payload defaults
/// to the response's JSON body; the failure slot's payload defaults to an
/// [`ApiMiddlewareError::Api`] wrapping status, status text and JSON body.
/// Fields set explicitly on a descriptor always replace the defaults.
#[must_use]
pub fn normalize_type_descriptors<S>(types: &[TypeSlot<S>; 3]) -> NormalizedTypes<S>
where
    S: Send + 'static,
{
    let [request, success, failure] = types;

    NormalizedTypes {
        request: expand(request),
        success: with_default_payload(expand(success), default_success_payload()),
        failure: with_default_payload(expand(failure), default_failure_payload()),
    }
}

fn expand<S>(slot: &TypeSlot<S>) -> LifecycleDescriptor<S> {
    match slot {
        TypeSlot::Bare(action_type) => LifecycleDescriptor::new(action_type.clone()),
        TypeSlot::Descriptor(descriptor) => descriptor.clone(),
    }
}

// Default first, explicit fields win
fn with_default_payload<S>(
    explicit: LifecycleDescriptor<S>,
    default_payload: Resolvable<S, Payload>,
) -> LifecycleDescriptor<S> {
    LifecycleDescriptor {
        payload: explicit.payload.or(Some(default_payload)),
        ..explicit
    }
}

fn default_success_payload<S>() -> Resolvable<S, Payload>
where
    S: Send + 'static,
{
    Resolvable::resolver(json_body::<S>)
}

fn default_failure_payload<S>() -> Resolvable<S, Payload>
where
    S: Send + 'static,
{
    Resolvable::resolver(api_error::<S>)
}

async fn json_body<S>(args: ResolveArgs<S>) -> anyhow::Result<Option<Payload>> {
    let Some(response) = args.response else {
        return Ok(None);
    };
    Ok(get_json(response.as_ref()).await?.map(Payload::Value))
}

async fn api_error<S>(args: ResolveArgs<S>) -> anyhow::Result<Option<Payload>> {
    let Some(response) = args.response else {
        return Ok(None);
    };
    let body = get_json(response.as_ref()).await?;
    Ok(Some(Payload::Error(ApiMiddlewareError::api(
        response.status(),
        response.status_text(),
        body,
    ))))
}
