//! Routing of failed init runs.
//!
//! An action failure is handed to the component's error handler when one is
//! configured and then counts as handled. Everything else, including a
//! contract violation ([`InitError::InvalidReturn`]), reaches the caller.

use serde_json::Value;

use crate::component::ErrorHandler;
use crate::errors::InitError;

/// Outcome of a failed run after the error policy was applied.
#[derive(Debug)]
pub enum Routed {
    /// The handler absorbed the failure; the run completes with no value.
    Absorbed,
    /// The failure reaches the caller.
    Propagated(InitError),
}

/// Apply the error policy to a failed run.
pub fn route(failure: InitError, on_error: Option<&ErrorHandler>) -> Routed {
    match (failure, on_error) {
        (InitError::Action(error), Some(handler)) => {
            tracing::warn!(error = %error, "init action failed; handled by on_error");
            handler(&error);
            Routed::Absorbed
        }
        (failure, _) => Routed::Propagated(failure),
    }
}

/// Map a run result through the error policy.
///
/// `Ok(Some(value))` on success, `Ok(None)` when a failure was absorbed.
pub fn apply(
    result: Result<Value, InitError>,
    on_error: Option<&ErrorHandler>,
) -> Result<Option<Value>, InitError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(failure) => match route(failure, on_error) {
            Routed::Absorbed => Ok(None),
            Routed::Propagated(failure) => Err(failure),
        },
    }
}
