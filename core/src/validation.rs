//! Validation rule sets for API calls.
//!
//! A rule set maps a call to the list of its violations; an empty list means
//! the call is valid. [`DefaultValidator`] ships the standard catalog; any
//! `Fn(&ApiCall<S>) -> Vec<String>` can be plugged in instead.

use crate::call::{ApiCall, Field, TypeSlot};

/// A pluggable validation rule set
pub trait Validator<S>: Send + Sync {
    /// Every violation found in `call`; empty when valid
    fn validate(&self, call: &ApiCall<S>) -> Vec<String>;
}

impl<S, F> Validator<S> for F
where
    F: Fn(&ApiCall<S>) -> Vec<String> + Send + Sync,
{
    fn validate(&self, call: &ApiCall<S>) -> Vec<String> {
        self(call)
    }
}

/// The standard rule catalog, see [`validate_api_call`]
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultValidator;

impl<S> Validator<S> for DefaultValidator {
    fn validate(&self, call: &ApiCall<S>) -> Vec<String> {
        validate_api_call(call)
    }
}

/// Run the standard rule catalog.
///
/// - an endpoint is required, and a static endpoint must not be empty
/// - a method is required and must be a known verb (case-insensitive)
/// - static header names and values must be valid HTTP header tokens
/// - credentials, when present, must be `omit`, `same-origin` or `include`
/// - `types` must have exactly three entries, each with a non-empty type
#[must_use]
pub fn validate_api_call<S>(call: &ApiCall<S>) -> Vec<String> {
    let mut violations = Vec::new();

    match &call.endpoint {
        None => violations.push("[ApiCall] must have an endpoint".to_string()),
        Some(Field::Static(endpoint)) if endpoint.is_empty() => {
            violations.push("[ApiCall].endpoint must not be empty".to_string());
        },
        Some(_) => {},
    }

    if let Err(violation) = call.parse_method() {
        violations.push(violation);
    }

    if let Some(Field::Static(headers)) = &call.headers {
        for (name, value) in headers {
            if http::HeaderName::from_bytes(name.as_bytes()).is_err() {
                violations.push(format!("Invalid [ApiCall].headers name: {name}"));
            } else if http::HeaderValue::from_str(value).is_err() {
                violations.push(format!("Invalid [ApiCall].headers value for {name}"));
            }
        }
    }

    if let Err(violation) = call.parse_credentials() {
        violations.push(violation);
    }

    match call.type_triple() {
        Ok(types) => {
            for (slot, label) in types.iter().zip(["request", "success", "failure"]) {
                validate_type_slot(slot, label, &mut violations);
            }
        },
        Err(violation) => violations.push(violation),
    }

    violations
}

fn validate_type_slot<S>(slot: &TypeSlot<S>, label: &str, violations: &mut Vec<String>) {
    if slot.action_type().is_empty() {
        let shape = match slot {
            TypeSlot::Bare(_) => "type",
            TypeSlot::Descriptor(_) => "type descriptor",
        };
        violations.push(format!("Invalid {label} {shape}: type must not be empty"));
    }
}
