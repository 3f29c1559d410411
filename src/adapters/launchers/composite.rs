//! Launcher dispatching to the container or process launcher.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::models::ServiceDescriptor;
use crate::domain::ports::{HandleKind, LaunchFailure, Launcher, ServiceHandle};

pub struct CompositeLauncher {
    containers: Arc<dyn Launcher>,
    processes: Arc<dyn Launcher>,
}

impl CompositeLauncher {
    pub fn new(containers: Arc<dyn Launcher>, processes: Arc<dyn Launcher>) -> Self {
        Self {
            containers,
            processes,
        }
    }

    fn for_handle(&self, handle: &ServiceHandle) -> Result<&Arc<dyn Launcher>, LaunchFailure> {
        match handle.kind {
            HandleKind::Container => Ok(&self.containers),
            HandleKind::Process => Ok(&self.processes),
            HandleKind::Simulated => Err(LaunchFailure::UnknownHandle(handle.id.clone())),
        }
    }
}

#[async_trait]
impl Launcher for CompositeLauncher {
    fn name(&self) -> &'static str {
        "composite"
    }

    async fn start(
        &self,
        descriptor: &ServiceDescriptor,
        environment: &BTreeMap<String, String>,
    ) -> Result<ServiceHandle, LaunchFailure> {
        if descriptor.launch.is_container() {
            self.containers.start(descriptor, environment).await
        } else {
            self.processes.start(descriptor, environment).await
        }
    }

    async fn stop(&self, handle: &ServiceHandle) -> Result<(), LaunchFailure> {
        self.for_handle(handle)?.stop(handle).await
    }

    async fn is_running(&self, handle: &ServiceHandle) -> Result<bool, LaunchFailure> {
        self.for_handle(handle)?.is_running(handle).await
    }
}
