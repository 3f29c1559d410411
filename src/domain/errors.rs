//! Domain errors for stack orchestration.

use std::error::Error as _;

use thiserror::Error;

use super::models::ServiceState;

/// Format a cycle path as a human-readable string: `a -> b -> c -> a`.
fn format_cycle_path(path: &[String]) -> String {
    path.join(" -> ")
}

/// Errors raised while validating or orchestrating a stack.
///
/// `DuplicateService`, `UnknownReference`, `Cycle` and `UnresolvedReference`
/// are configuration-time errors: they abort a run before any service starts.
/// Every other variant is local to one service and cascades to its
/// transitive dependents.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestrationError {
    #[error("Service '{0}' is declared more than once")]
    DuplicateService(String),

    #[error("Service '{service}' references undeclared service '{missing}'")]
    UnknownReference { service: String, missing: String },

    #[error("Service dependency cycle detected: {}", format_cycle_path(.0))]
    Cycle(Vec<String>),

    #[error("Service '{service}' has an unresolved environment value for {variable}: {reason}")]
    UnresolvedReference {
        service: String,
        variable: String,
        reason: String,
    },

    #[error("Invalid health probe for '{service}': {reason}")]
    Probe { service: String, reason: String },

    #[error("Service '{service}' was not ready after {attempts} attempt(s) in {elapsed_ms}ms")]
    Timeout {
        service: String,
        attempts: u32,
        elapsed_ms: u64,
    },

    #[error("Service '{service}' gave up waiting for '{dependency}' after {waited_ms}ms")]
    DependencyTimeout {
        service: String,
        dependency: String,
        waited_ms: u64,
    },

    #[error("Failed to launch '{service}': {reason}")]
    Launch { service: String, reason: String },

    #[error("Run cancelled before '{0}' became ready")]
    Cancelled(String),

    #[error("Service '{service}' not started because dependency '{dependency}' failed")]
    DependencyFailed {
        service: String,
        dependency: String,
        #[source]
        cause: Box<OrchestrationError>,
    },

    #[error("Invalid state transition for '{service}' from {from} to {to}")]
    InvalidStateTransition {
        service: String,
        from: ServiceState,
        to: ServiceState,
    },
}

impl OrchestrationError {
    /// Whether this error is detected before any service is started.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateService(_)
                | Self::UnknownReference { .. }
                | Self::Cycle(_)
                | Self::UnresolvedReference { .. }
        )
    }

    /// The error that started a cascade. Returns `self` for non-cascaded errors.
    pub fn root_cause(&self) -> &Self {
        let mut current = self;
        while let Self::DependencyFailed { cause, .. } = current {
            current = cause;
        }
        current
    }

    /// Render the error and every underlying cause, outermost first.
    pub fn cause_chain(&self) -> Vec<String> {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();
        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }
        chain
    }
}

pub type OrchestrationResult<T> = Result<T, OrchestrationError>;
