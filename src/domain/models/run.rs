//! Run domain model.
//!
//! Per-service lifecycle states and the report produced at the end of an
//! orchestration run.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::OrchestrationError;

/// Lifecycle state of a service within one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    /// Declared, nothing has happened yet
    #[default]
    Pending,
    /// Blocked on dependency readiness
    WaitingForDependencies,
    /// Launched, readiness not yet confirmed
    Starting,
    /// Accepting traffic from dependents
    Ready,
    /// Could not be brought up, or was cancelled
    Failed,
    /// Was ready and has been stopped
    Stopped,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::WaitingForDependencies => "waiting",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    /// Check if this state can no longer change within a run.
    ///
    /// `Ready` is not terminal: it may still move to `Stopped`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Stopped)
    }

    /// Whether the service is mid-startup.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::WaitingForDependencies | Self::Starting)
    }

    /// Valid transitions from this state.
    pub fn valid_transitions(&self) -> &'static [ServiceState] {
        match self {
            Self::Pending => &[Self::WaitingForDependencies, Self::Failed],
            Self::WaitingForDependencies => &[Self::Starting, Self::Failed],
            Self::Starting => &[Self::Ready, Self::Failed],
            Self::Ready => &[Self::Stopped, Self::Failed],
            Self::Failed | Self::Stopped => &[],
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final outcome of one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOutcome {
    pub state: ServiceState,
    pub error: Option<OrchestrationError>,
    /// Probe attempts spent before readiness was confirmed or abandoned.
    pub probe_attempts: u32,
    pub ready_at: Option<DateTime<Utc>>,
}

impl ServiceOutcome {
    pub fn pending() -> Self {
        Self {
            state: ServiceState::Pending,
            error: None,
            probe_attempts: 0,
            ready_at: None,
        }
    }

    /// Human-readable cause chain of the failure, outermost first.
    pub fn cause_chain(&self) -> Vec<String> {
        self.error
            .as_ref()
            .map(OrchestrationError::cause_chain)
            .unwrap_or_default()
    }
}

/// Structured result of one orchestration run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub stack: String,
    pub services: BTreeMap<String, ServiceOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cancelled: bool,
}

impl RunReport {
    /// A run succeeds only if every service reached `Ready`.
    pub fn is_successful(&self) -> bool {
        !self.cancelled && self.services.values().all(|o| o.state == ServiceState::Ready)
    }

    pub fn state_of(&self, service: &str) -> Option<ServiceState> {
        self.services.get(service).map(|o| o.state)
    }

    pub fn error_of(&self, service: &str) -> Option<&OrchestrationError> {
        self.services.get(service).and_then(|o| o.error.as_ref())
    }

    pub fn failed_services(&self) -> Vec<&str> {
        self.services_in(ServiceState::Failed)
    }

    pub fn services_in(&self, state: ServiceState) -> Vec<&str> {
        self.services
            .iter()
            .filter(|(_, o)| o.state == state)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let services: serde_json::Map<String, serde_json::Value> = self
            .services
            .iter()
            .map(|(name, outcome)| {
                (
                    name.clone(),
                    serde_json::json!({
                        "state": outcome.state,
                        "probe_attempts": outcome.probe_attempts,
                        "ready_at": outcome.ready_at,
                        "error": outcome.error.as_ref().map(ToString::to_string),
                        "cause_chain": outcome.cause_chain(),
                    }),
                )
            })
            .collect();

        serde_json::json!({
            "run_id": self.run_id,
            "stack": self.stack,
            "successful": self.is_successful(),
            "cancelled": self.cancelled,
            "started_at": self.started_at,
            "finished_at": self.finished_at,
            "services": services,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            ServiceState::Pending,
            ServiceState::WaitingForDependencies,
            ServiceState::Starting,
            ServiceState::Ready,
            ServiceState::Stopped,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        for next in [
            ServiceState::Pending,
            ServiceState::Ready,
            ServiceState::Failed,
            ServiceState::Stopped,
        ] {
            assert!(!ServiceState::Failed.can_transition_to(next));
            assert!(!ServiceState::Stopped.can_transition_to(next));
        }
    }

    #[test]
    fn test_any_live_state_may_fail() {
        for state in [
            ServiceState::Pending,
            ServiceState::WaitingForDependencies,
            ServiceState::Starting,
            ServiceState::Ready,
        ] {
            assert!(state.can_transition_to(ServiceState::Failed));
        }
    }

    #[test]
    fn test_report_success_requires_all_ready() {
        let now = Utc::now();
        let mut report = RunReport {
            run_id: Uuid::new_v4(),
            stack: "test".into(),
            services: BTreeMap::new(),
            started_at: now,
            finished_at: now,
            cancelled: false,
        };
        let mut ready = ServiceOutcome::pending();
        ready.state = ServiceState::Ready;
        report.services.insert("a".into(), ready.clone());
        assert!(report.is_successful());

        let mut failed = ServiceOutcome::pending();
        failed.state = ServiceState::Failed;
        failed.error = Some(OrchestrationError::Cancelled("b".into()));
        report.services.insert("b".into(), failed);
        assert!(!report.is_successful());
        assert_eq!(report.failed_services(), vec!["b"]);
        assert_eq!(report.services_in(ServiceState::Ready), vec!["a"]);

        let json = report.to_json();
        assert_eq!(json["successful"], false);
        assert_eq!(json["services"]["b"]["state"], "failed");
    }
}
