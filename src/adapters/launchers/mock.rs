//! Mock launcher for testing and dry runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::models::ServiceDescriptor;
use crate::domain::ports::{HandleKind, LaunchFailure, Launcher, ServiceHandle};

/// Scripted behavior for one service.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Time `start` takes before answering
    pub start_delay: Duration,
    /// Fail `start` with this message
    pub fail_start: Option<String>,
    /// Report the service as not running right after start
    pub exits_immediately: bool,
}

impl MockBehavior {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            fail_start: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn delayed(delay: Duration) -> Self {
        Self {
            start_delay: delay,
            ..Default::default()
        }
    }

    pub fn exited() -> Self {
        Self {
            exits_immediately: true,
            ..Default::default()
        }
    }
}

/// Everything the launcher was asked to do, in call order.
#[derive(Debug, Clone, Default)]
pub struct LaunchLog {
    pub started: Vec<String>,
    pub stopped: Vec<String>,
    pub environments: HashMap<String, BTreeMap<String, String>>,
}

/// In-memory launcher.
///
/// Starts succeed after an optional delay unless a failure was scripted.
/// Every endpoint is "published" on its declared host port, or its target
/// port when none is declared.
pub struct MockLauncher {
    behaviors: Arc<RwLock<HashMap<String, MockBehavior>>>,
    running: Arc<RwLock<HashMap<String, ServiceHandle>>>,
    log: Arc<RwLock<LaunchLog>>,
    next_id: AtomicU64,
}

impl Default for MockLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLauncher {
    pub fn new() -> Self {
        Self {
            behaviors: Arc::new(RwLock::new(HashMap::new())),
            running: Arc::new(RwLock::new(HashMap::new())),
            log: Arc::new(RwLock::new(LaunchLog::default())),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn set_behavior(&self, service: &str, behavior: MockBehavior) {
        self.behaviors
            .write()
            .await
            .insert(service.to_string(), behavior);
    }

    pub async fn log(&self) -> LaunchLog {
        self.log.read().await.clone()
    }

    pub async fn started(&self) -> Vec<String> {
        self.log.read().await.started.clone()
    }

    pub async fn stopped(&self) -> Vec<String> {
        self.log.read().await.stopped.clone()
    }

    pub async fn running_services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.running.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl Launcher for MockLauncher {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn start(
        &self,
        descriptor: &ServiceDescriptor,
        environment: &BTreeMap<String, String>,
    ) -> Result<ServiceHandle, LaunchFailure> {
        let behavior = self
            .behaviors
            .read()
            .await
            .get(&descriptor.name)
            .cloned()
            .unwrap_or_default();

        {
            let mut log = self.log.write().await;
            log.started.push(descriptor.name.clone());
            log.environments
                .insert(descriptor.name.clone(), environment.clone());
        }

        if !behavior.start_delay.is_zero() {
            tokio::time::sleep(behavior.start_delay).await;
        }
        if let Some(message) = behavior.fail_start {
            return Err(LaunchFailure::Runtime(message));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut handle = ServiceHandle::new(
            descriptor.name.clone(),
            format!("mock-{id}"),
            HandleKind::Simulated,
        );
        handle.persistent = descriptor.lifetime.is_persistent();
        for endpoint in &descriptor.endpoints {
            handle.published_ports.insert(
                endpoint.target_port,
                endpoint.host_port.unwrap_or(endpoint.target_port),
            );
        }

        if !behavior.exits_immediately {
            self.running
                .write()
                .await
                .insert(descriptor.name.clone(), handle.clone());
        }
        Ok(handle)
    }

    async fn stop(&self, handle: &ServiceHandle) -> Result<(), LaunchFailure> {
        self.log.write().await.stopped.push(handle.service.clone());
        self.running.write().await.remove(&handle.service);
        Ok(())
    }

    async fn is_running(&self, handle: &ServiceHandle) -> Result<bool, LaunchFailure> {
        Ok(self
            .running
            .read()
            .await
            .get(&handle.service)
            .is_some_and(|h| h.id == handle.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Endpoint;

    #[tokio::test]
    async fn test_start_publishes_declared_ports() {
        let launcher = MockLauncher::new();
        let mut svc = ServiceDescriptor::image("localstack", "localstack/localstack");
        svc.endpoints.push(Endpoint::http("http", 4566, Some(4566)));
        svc.endpoints.push(Endpoint::tcp("edge", 4510, None));

        let handle = launcher.start(&svc, &BTreeMap::new()).await.unwrap();
        assert_eq!(handle.host_port_for(4566), Some(4566));
        assert_eq!(handle.host_port_for(4510), Some(4510));
        assert!(launcher.is_running(&handle).await.unwrap());

        launcher.stop(&handle).await.unwrap();
        assert!(!launcher.is_running(&handle).await.unwrap());
        assert_eq!(launcher.stopped().await, vec!["localstack".to_string()]);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let launcher = MockLauncher::new();
        launcher
            .set_behavior("mysql", MockBehavior::failure("image pull failed"))
            .await;

        let svc = ServiceDescriptor::image("mysql", "mysql:8");
        let err = launcher.start(&svc, &BTreeMap::new()).await.unwrap_err();
        assert!(err.to_string().contains("image pull failed"));
        assert_eq!(launcher.started().await, vec!["mysql".to_string()]);
        assert!(launcher.running_services().await.is_empty());
    }

    #[tokio::test]
    async fn test_exited_service_is_not_running() {
        let launcher = MockLauncher::new();
        launcher.set_behavior("job", MockBehavior::exited()).await;

        let handle = launcher
            .start(&ServiceDescriptor::image("job", "busybox"), &BTreeMap::new())
            .await
            .unwrap();
        assert!(!launcher.is_running(&handle).await.unwrap());
    }
}
