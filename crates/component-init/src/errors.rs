//! Categorized initialization errors
//!
//! Every failure surfaced by the orchestrator is an [`InitError`]. Failures
//! produced by a component's own init action are carried as [`ActionError`]
//! so they can be handed to the component's error handler unchanged.

use std::fmt;
use std::sync::Arc;

// ============================================================================
// Error Categories
// ============================================================================

/// High-level classification of an [`InitError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed component configuration
    Config,
    /// The host did not wire the init state slice or an executor
    Integration,
    /// An init action broke its return contract
    Contract,
    /// Mount and prepare calls happened in the wrong order
    Ordering,
    /// The init action itself failed
    Action,
}

impl ErrorCategory {
    /// Get a short label for this category.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Config => "Config",
            Self::Integration => "Integration",
            Self::Contract => "Contract",
            Self::Ordering => "Ordering",
            Self::Action => "Action",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ============================================================================
// Action Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct MessageError(String);

/// Failure reported by a component's init action.
///
/// Cheap to clone; the underlying error is shared.
#[derive(Clone)]
pub struct ActionError {
    inner: Arc<dyn std::error::Error + Send + Sync + 'static>,
}

impl ActionError {
    /// Wrap an arbitrary error.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Create an action error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(MessageError(message.into()))
    }

    /// Try to view the wrapped error as a concrete type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.inner.downcast_ref::<E>()
    }
}

impl fmt::Debug for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActionError").field(&self.inner).finish()
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl std::error::Error for ActionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<String> for ActionError {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

impl From<&str> for ActionError {
    fn from(message: &str) -> Self {
        Self::msg(message)
    }
}

// ============================================================================
// Init Errors
// ============================================================================

/// Errors returned by initialization orchestration.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InitError {
    /// The component configuration is absent or malformed.
    #[error("Invalid init config: {message}")]
    Configuration {
        /// What is wrong with the configuration
        message: String,
    },

    /// The state container does not hold an init state slice.
    #[error("Could not find init state. Is the init reducer attached to the store?")]
    MissingState,

    /// The init action returned a plain value instead of a future.
    #[error(
        "Expected init action to return a future. Returned a {observed} instead. \
         Check the init action of \"{component_id}\""
    )]
    InvalidReturn {
        /// Component whose action broke the contract
        component_id: String,
        /// Runtime type of the returned value
        observed: &'static str,
    },

    /// A mount call found a component that was never prepared.
    #[error(
        "Expected component \"{component_id}\" to be prepared but prepare_component \
         has not been called with props: {props}"
    )]
    NotPrepared {
        /// Component that was mounted
        component_id: String,
        /// JSON rendering of the resolved init props
        props: String,
    },

    /// A mount call found a preparation that has not completed yet.
    #[error("Expected component \"{component_id}\" to be prepared but preparation is still pending")]
    PreparePending {
        /// Component that was mounted
        component_id: String,
    },

    /// The executor refused the init run, or dropped it before it settled.
    #[error("Init run for \"{component_id}\" could not be driven: {message}")]
    Executor {
        /// Component whose run was lost
        component_id: String,
        /// Why the executor gave up on the run
        message: String,
    },

    /// The init action failed and no error handler absorbed the failure.
    #[error("{0}")]
    Action(#[source] ActionError),
}

impl InitError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Config,
            Self::MissingState | Self::Executor { .. } => ErrorCategory::Integration,
            Self::InvalidReturn { .. } => ErrorCategory::Contract,
            Self::NotPrepared { .. } | Self::PreparePending { .. } => ErrorCategory::Ordering,
            Self::Action(_) => ErrorCategory::Action,
        }
    }

    /// True for failures that indicate a bug in the host rather than a
    /// runtime failure of the init action.
    #[must_use]
    pub fn is_programming_error(&self) -> bool {
        !matches!(self, Self::Action(_))
    }

    /// The action failure, if this error wraps one.
    pub fn as_action(&self) -> Option<&ActionError> {
        match self {
            Self::Action(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ActionError> for InitError {
    fn from(error: ActionError) -> Self {
        Self::Action(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("backend unavailable")]
    struct Backend;

    #[test]
    fn action_error_displays_message() {
        let err = ActionError::msg("bar");
        assert_eq!(err.to_string(), "bar");
        assert_eq!(InitError::from(err).to_string(), "bar");
    }

    #[test]
    fn action_error_downcasts_to_wrapped_error() {
        let err = ActionError::new(Backend);
        assert!(err.downcast_ref::<Backend>().is_some());
        assert_eq!(err.to_string(), "backend unavailable");
    }

    #[test]
    fn categories_follow_taxonomy() {
        assert_eq!(InitError::MissingState.category(), ErrorCategory::Integration);
        assert_eq!(
            InitError::PreparePending {
                component_id: "Feed".into()
            }
            .category(),
            ErrorCategory::Ordering
        );
        assert!(InitError::configuration("x").is_programming_error());
        assert!(!InitError::Action(ActionError::msg("x")).is_programming_error());
    }

    #[test]
    fn invalid_return_names_component_and_type() {
        let err = InitError::InvalidReturn {
            component_id: "Feed".into(),
            observed: "number",
        };
        let text = err.to_string();
        assert!(text.contains("\"Feed\""));
        assert!(text.contains("number"));
    }
}
