//! Launcher port - interface for bringing services up and down.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::ServiceDescriptor;

/// What kind of runtime object a handle points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Container,
    Process,
    /// In-memory handle used for dry runs and tests.
    Simulated,
}

/// Opaque reference to a started service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    pub service: String,
    /// Container id, process id, or simulated id.
    pub id: String,
    pub kind: HandleKind,
    /// Target port -> published host port, as reported by the runtime.
    pub published_ports: BTreeMap<u16, u16>,
    /// Whether an already running instance was adopted instead of started.
    pub reused: bool,
    /// Persistent services are left in place when stopped.
    pub persistent: bool,
}

impl ServiceHandle {
    pub fn new(service: impl Into<String>, id: impl Into<String>, kind: HandleKind) -> Self {
        Self {
            service: service.into(),
            id: id.into(),
            kind,
            published_ports: BTreeMap::new(),
            reused: false,
            persistent: false,
        }
    }

    pub fn host_port_for(&self, target_port: u16) -> Option<u16> {
        self.published_ports.get(&target_port).copied()
    }
}

/// Failure reported by a launcher.
#[derive(Debug, Error)]
pub enum LaunchFailure {
    #[error("{launcher} launcher cannot run '{kind}' services")]
    Unsupported {
        launcher: &'static str,
        kind: &'static str,
    },

    #[error("runtime command failed: {0}")]
    Runtime(String),

    #[error("unknown handle: {0}")]
    UnknownHandle(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Abstracts over however a service is actually brought up.
///
/// Implementations must be safe to call concurrently for different services.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Launcher name used in logs.
    fn name(&self) -> &'static str;

    /// Start a service with its fully resolved environment.
    async fn start(
        &self,
        descriptor: &ServiceDescriptor,
        environment: &BTreeMap<String, String>,
    ) -> Result<ServiceHandle, LaunchFailure>;

    /// Stop a previously started service.
    async fn stop(&self, handle: &ServiceHandle) -> Result<(), LaunchFailure>;

    /// Check whether the service behind a handle is still running.
    async fn is_running(&self, handle: &ServiceHandle) -> Result<bool, LaunchFailure>;
}
