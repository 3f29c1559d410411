//! Stack orchestrator.
//!
//! Starts every service of a validated graph in its own task. A service
//! waits on the readiness signals of its dependencies, launches, then passes
//! its readiness gate. Failures cascade to transitive dependents only;
//! independent branches keep going.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::errors::{OrchestrationError, OrchestrationResult};
use crate::domain::models::{
    OrchestratorConfig, RunReport, ServiceDescriptor, ServiceOutcome, ServiceState,
};
use crate::domain::ports::{Launcher, ServiceHandle};
use crate::services::dependency_graph::DependencyGraph;
use crate::services::environment::EnvironmentResolver;
use crate::services::readiness_gate::{Readiness, ReadinessGate};

/// Progress notifications emitted during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// Run started.
    Started { run_id: Uuid, services: usize },
    /// A service moved between states.
    StateChanged {
        service: String,
        from: ServiceState,
        to: ServiceState,
    },
    /// A service failed.
    ServiceFailed { service: String, error: String },
    /// Every service task has settled.
    Finished { successful: bool, cancelled: bool },
}

/// Readiness broadcast of one node to its dependents.
#[derive(Debug, Clone)]
enum NodeSignal {
    Pending,
    Ready,
    Failed(OrchestrationError),
}

impl NodeSignal {
    fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Mutable state of one run. Terminal states are sticky.
#[derive(Debug, Default)]
struct RunState {
    outcomes: BTreeMap<String, ServiceOutcome>,
    handles: BTreeMap<String, ServiceHandle>,
}

impl RunState {
    fn transition(&mut self, service: &str, to: ServiceState) -> OrchestrationResult<ServiceState> {
        let outcome = self
            .outcomes
            .entry(service.to_string())
            .or_insert_with(ServiceOutcome::pending);
        let from = outcome.state;
        if !from.can_transition_to(to) {
            return Err(OrchestrationError::InvalidStateTransition {
                service: service.to_string(),
                from,
                to,
            });
        }
        outcome.state = to;
        if to == ServiceState::Ready {
            outcome.ready_at = Some(Utc::now());
        }
        Ok(from)
    }

    /// Returns the previous state, or `None` when already terminal.
    fn fail(&mut self, service: &str, error: OrchestrationError) -> Option<ServiceState> {
        let outcome = self
            .outcomes
            .entry(service.to_string())
            .or_insert_with(ServiceOutcome::pending);
        if outcome.state.is_terminal() {
            return None;
        }
        let from = outcome.state;
        if let OrchestrationError::Timeout { attempts, .. } = &error {
            outcome.probe_attempts = *attempts;
        }
        outcome.state = ServiceState::Failed;
        outcome.error = Some(error);
        Some(from)
    }
}

/// Everything a node task needs, shared across tasks.
struct NodeContext {
    launcher: Arc<dyn Launcher>,
    gate: ReadinessGate,
    state: Mutex<RunState>,
    events: Option<mpsc::Sender<RunEvent>>,
    cancel: CancellationToken,
    launch_timeout: Duration,
    startup_timeout: Duration,
    dependency_timeout: Duration,
    stop_timeout: Duration,
}

impl NodeContext {
    async fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }

    async fn transition(&self, service: &str, to: ServiceState) -> OrchestrationResult<()> {
        let from = self.state.lock().await.transition(service, to)?;
        debug!(service, %from, %to, "service state changed");
        self.emit(RunEvent::StateChanged {
            service: service.to_string(),
            from,
            to,
        })
        .await;
        Ok(())
    }

    async fn mark_ready(&self, service: &str, readiness: Readiness) -> OrchestrationResult<()> {
        let from = {
            let mut state = self.state.lock().await;
            let from = state.transition(service, ServiceState::Ready)?;
            if let Some(outcome) = state.outcomes.get_mut(service) {
                outcome.probe_attempts = readiness.attempts;
            }
            from
        };
        info!(
            service,
            attempts = readiness.attempts,
            elapsed_ms = readiness.elapsed.as_millis(),
            "service ready"
        );
        self.emit(RunEvent::StateChanged {
            service: service.to_string(),
            from,
            to: ServiceState::Ready,
        })
        .await;
        Ok(())
    }

    async fn mark_failed(&self, service: &str, err: OrchestrationError) {
        let message = err.to_string();
        let Some(from) = self.state.lock().await.fail(service, err) else {
            return;
        };
        warn!(service, error = %message, "service failed");
        self.emit(RunEvent::StateChanged {
            service: service.to_string(),
            from,
            to: ServiceState::Failed,
        })
        .await;
        self.emit(RunEvent::ServiceFailed {
            service: service.to_string(),
            error: message,
        })
        .await;
    }

    async fn stop_quietly(&self, handle: &ServiceHandle) {
        match tokio::time::timeout(self.stop_timeout, self.launcher.stop(handle)).await {
            Ok(Ok(())) => debug!(service = %handle.service, "stopped after failure"),
            Ok(Err(e)) => warn!(service = %handle.service, error = %e, "failed to stop service"),
            Err(_) => warn!(service = %handle.service, "timed out stopping service"),
        }
    }

    async fn await_dependencies(
        &self,
        service: &str,
        dependencies: &mut [(String, watch::Receiver<NodeSignal>)],
    ) -> OrchestrationResult<()> {
        if dependencies.is_empty() {
            return Ok(());
        }
        let started = Instant::now();
        let deadline = started + self.dependency_timeout;
        let waits = dependencies.iter_mut().map(|(dependency, rx)| {
            wait_for_dependency(service, dependency, rx, started, deadline, &self.cancel)
        });
        futures::future::try_join_all(waits).await.map(|_| ())
    }

    async fn launch(
        &self,
        descriptor: &ServiceDescriptor,
        environment: &BTreeMap<String, String>,
    ) -> OrchestrationResult<ServiceHandle> {
        let service = descriptor.name.as_str();
        info!(
            service,
            launcher = self.launcher.name(),
            kind = descriptor.launch.kind(),
            "starting service"
        );

        let handle = match tokio::time::timeout(
            self.launch_timeout,
            self.launcher.start(descriptor, environment),
        )
        .await
        {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                return Err(OrchestrationError::Launch {
                    service: service.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(OrchestrationError::Launch {
                    service: service.to_string(),
                    reason: format!(
                        "launcher did not answer within {}ms",
                        self.launch_timeout.as_millis()
                    ),
                })
            }
        };

        if self.cancel.is_cancelled() {
            self.stop_quietly(&handle).await;
            return Err(OrchestrationError::Cancelled(service.to_string()));
        }
        Ok(handle)
    }

    async fn await_ready(
        &self,
        descriptor: &ServiceDescriptor,
        handle: &ServiceHandle,
    ) -> OrchestrationResult<Readiness> {
        let service = descriptor.name.as_str();
        if !descriptor.has_active_probe() {
            let running = self.launcher.is_running(handle).await.map_err(|e| {
                OrchestrationError::Launch {
                    service: service.to_string(),
                    reason: e.to_string(),
                }
            })?;
            if !running {
                return Err(OrchestrationError::Launch {
                    service: service.to_string(),
                    reason: "exited before it was confirmed running".to_string(),
                });
            }
        }
        let deadline = Instant::now() + self.startup_timeout;
        self.gate
            .await_service(descriptor, handle, deadline, &self.cancel)
            .await
    }
}

async fn wait_for_dependency(
    service: &str,
    dependency: &str,
    rx: &mut watch::Receiver<NodeSignal>,
    started: Instant,
    deadline: Instant,
    cancel: &CancellationToken,
) -> OrchestrationResult<()> {
    let settled = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            return Err(OrchestrationError::Cancelled(service.to_string()));
        }
        () = tokio::time::sleep_until(deadline) => {
            return Err(OrchestrationError::DependencyTimeout {
                service: service.to_string(),
                dependency: dependency.to_string(),
                waited_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            });
        }
        settled = rx.wait_for(NodeSignal::is_settled) => settled.map(|signal| (*signal).clone()),
    };

    let cause = match settled {
        Ok(NodeSignal::Ready) => return Ok(()),
        Ok(NodeSignal::Failed(cause)) => cause,
        Ok(NodeSignal::Pending) | Err(_) => OrchestrationError::Launch {
            service: dependency.to_string(),
            reason: "service task ended without settling".to_string(),
        },
    };
    Err(OrchestrationError::DependencyFailed {
        service: service.to_string(),
        dependency: dependency.to_string(),
        cause: Box::new(cause),
    })
}

async fn drive_node(
    ctx: &NodeContext,
    descriptor: &ServiceDescriptor,
    environment: &BTreeMap<String, String>,
    mut dependencies: Vec<(String, watch::Receiver<NodeSignal>)>,
) -> OrchestrationResult<()> {
    let service = descriptor.name.as_str();
    ctx.transition(service, ServiceState::WaitingForDependencies)
        .await?;
    ctx.await_dependencies(service, &mut dependencies).await?;
    if ctx.cancel.is_cancelled() {
        return Err(OrchestrationError::Cancelled(service.to_string()));
    }

    ctx.transition(service, ServiceState::Starting).await?;
    let handle = ctx.launch(descriptor, environment).await?;
    ctx.state
        .lock()
        .await
        .handles
        .insert(service.to_string(), handle.clone());

    let result = match ctx.await_ready(descriptor, &handle).await {
        Ok(readiness) => ctx.mark_ready(service, readiness).await,
        Err(err) => Err(err),
    };
    if result.is_err() {
        ctx.stop_quietly(&handle).await;
        ctx.state.lock().await.handles.remove(service);
    }
    result
}

async fn run_node(
    ctx: Arc<NodeContext>,
    descriptor: ServiceDescriptor,
    environment: BTreeMap<String, String>,
    dependencies: Vec<(String, watch::Receiver<NodeSignal>)>,
    signal: watch::Sender<NodeSignal>,
) {
    match drive_node(&ctx, &descriptor, &environment, dependencies).await {
        Ok(()) => {
            signal.send_replace(NodeSignal::Ready);
        }
        Err(err) => {
            // A dependency that failed by cancellation means this one was cancelled too.
            let err = if ctx.cancel.is_cancelled()
                && matches!(err.root_cause(), OrchestrationError::Cancelled(_))
            {
                OrchestrationError::Cancelled(descriptor.name.clone())
            } else {
                err
            };
            ctx.mark_failed(&descriptor.name, err.clone()).await;
            signal.send_replace(NodeSignal::Failed(err));
        }
    }
}

/// Brings a stack up through a [`Launcher`] and a [`ReadinessGate`].
pub struct Orchestrator {
    launcher: Arc<dyn Launcher>,
    gate: ReadinessGate,
    resolver: EnvironmentResolver,
    config: OrchestratorConfig,
    stack_name: String,
    events: Option<mpsc::Sender<RunEvent>>,
}

impl Orchestrator {
    pub fn new(
        launcher: Arc<dyn Launcher>,
        gate: ReadinessGate,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            launcher,
            gate,
            resolver: EnvironmentResolver::default(),
            config,
            stack_name: "devhost".to_string(),
            events: None,
        }
    }

    /// Resolve parameters through `resolver` instead of an empty parameter set.
    #[must_use]
    pub fn with_resolver(mut self, resolver: EnvironmentResolver) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub fn with_stack_name(mut self, name: impl Into<String>) -> Self {
        self.stack_name = name.into();
        self
    }

    /// Stream [`RunEvent`]s to `tx`.
    #[must_use]
    pub fn with_events(mut self, tx: mpsc::Sender<RunEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Bring every service of `graph` up.
    ///
    /// Configuration errors (unresolvable environment values) are returned
    /// before anything is started. Runtime failures are recorded per service
    /// in the report of the returned [`RunningStack`].
    pub async fn run(
        &self,
        graph: &DependencyGraph,
        cancel: &CancellationToken,
    ) -> OrchestrationResult<RunningStack> {
        let mut environments = self.resolver.resolve_all(graph)?;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, stack = %self.stack_name, services = graph.len(), "starting run");

        let ctx = Arc::new(NodeContext {
            launcher: self.launcher.clone(),
            gate: self.gate.clone(),
            state: Mutex::new(RunState {
                outcomes: graph
                    .topological_order()
                    .iter()
                    .map(|name| (name.clone(), ServiceOutcome::pending()))
                    .collect(),
                handles: BTreeMap::new(),
            }),
            events: self.events.clone(),
            cancel: cancel.clone(),
            launch_timeout: Duration::from_millis(self.config.launch_timeout_ms),
            startup_timeout: Duration::from_millis(self.config.startup_timeout_ms),
            dependency_timeout: Duration::from_millis(self.config.dependency_timeout_ms),
            stop_timeout: Duration::from_millis(self.config.stop_timeout_ms),
        });
        ctx.emit(RunEvent::Started {
            run_id,
            services: graph.len(),
        })
        .await;

        let mut senders = BTreeMap::new();
        let mut receivers = BTreeMap::new();
        for name in graph.topological_order() {
            let (tx, rx) = watch::channel(NodeSignal::Pending);
            senders.insert(name.clone(), tx);
            receivers.insert(name.clone(), rx);
        }

        let mut tasks = JoinSet::new();
        for name in graph.topological_order() {
            let (Some(descriptor), Some(signal)) = (graph.descriptor(name), senders.remove(name))
            else {
                continue;
            };
            let dependencies: Vec<_> = graph
                .dependencies_of(name)
                .filter_map(|dep| receivers.get(dep).map(|rx| (dep.to_string(), rx.clone())))
                .collect();
            let environment = environments.remove(name).unwrap_or_default();
            tasks.spawn(run_node(
                ctx.clone(),
                descriptor.clone(),
                environment,
                dependencies,
                signal,
            ));
        }
        drop(receivers);

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "service task aborted");
            }
        }

        let (outcomes, handles) = {
            let mut state = ctx.state.lock().await;
            let unsettled: Vec<String> = state
                .outcomes
                .iter()
                .filter(|(_, o)| !o.state.is_terminal() && o.state != ServiceState::Ready)
                .map(|(name, _)| name.clone())
                .collect();
            for name in unsettled {
                state.fail(
                    &name,
                    OrchestrationError::Launch {
                        service: name.clone(),
                        reason: "service task aborted".to_string(),
                    },
                );
            }
            (
                std::mem::take(&mut state.outcomes),
                std::mem::take(&mut state.handles),
            )
        };

        let mut stack = RunningStack {
            report: RunReport {
                run_id,
                stack: self.stack_name.clone(),
                services: outcomes,
                started_at,
                finished_at: Utc::now(),
                cancelled: false,
            },
            handles,
            order: graph.topological_order().to_vec(),
            launcher: self.launcher.clone(),
            stop_timeout: ctx.stop_timeout,
            events: self.events.clone(),
        };

        if cancel.is_cancelled() {
            info!(%run_id, "run cancelled, stopping ready services");
            stack.report.cancelled = true;
            stack.stop_ready_services().await;
        }
        stack.report.finished_at = Utc::now();

        let successful = stack.report.is_successful();
        info!(
            %run_id,
            successful,
            failed = stack.report.failed_services().len(),
            duration_ms = stack.report.duration_ms(),
            "run finished"
        );
        ctx.emit(RunEvent::Finished {
            successful,
            cancelled: stack.report.cancelled,
        })
        .await;

        Ok(stack)
    }
}

/// Result of a run: the report plus handles of services left running.
pub struct RunningStack {
    report: RunReport,
    handles: BTreeMap<String, ServiceHandle>,
    order: Vec<String>,
    launcher: Arc<dyn Launcher>,
    stop_timeout: Duration,
    events: Option<mpsc::Sender<RunEvent>>,
}

impl RunningStack {
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn into_report(self) -> RunReport {
        self.report
    }

    pub fn handle(&self, service: &str) -> Option<&ServiceHandle> {
        self.handles.get(service)
    }

    /// Stop every ready service in reverse topological order.
    pub async fn shutdown(mut self) -> RunReport {
        self.stop_ready_services().await;
        self.report.finished_at = Utc::now();
        self.report
    }

    async fn stop_ready_services(&mut self) {
        let ready: Vec<String> = self
            .order
            .iter()
            .rev()
            .filter(|name| self.report.state_of(name) == Some(ServiceState::Ready))
            .cloned()
            .collect();

        for name in ready {
            if let Some(handle) = self.handles.remove(&name) {
                match tokio::time::timeout(self.stop_timeout, self.launcher.stop(&handle)).await {
                    Ok(Ok(())) => info!(service = %name, "service stopped"),
                    Ok(Err(e)) => warn!(service = %name, error = %e, "failed to stop service"),
                    Err(_) => warn!(service = %name, "timed out stopping service"),
                }
            }
            if let Some(outcome) = self.report.services.get_mut(&name) {
                outcome.state = ServiceState::Stopped;
            }
            if let Some(tx) = &self.events {
                let _ = tx
                    .send(RunEvent::StateChanged {
                        service: name.clone(),
                        from: ServiceState::Ready,
                        to: ServiceState::Stopped,
                    })
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::launchers::{MockBehavior, MockLauncher};
    use crate::adapters::probes::ScriptedTransport;
    use crate::domain::models::{Endpoint, EnvValue, HealthProbe};

    fn probed(name: &str, port: u16) -> ServiceDescriptor {
        let mut svc = ServiceDescriptor::image(name, "img");
        svc.endpoints.push(Endpoint::tcp("tcp", port, None));
        svc.health_probe = Some(HealthProbe::tcp(port).with_timing(5, 50, 3));
        svc
    }

    fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig {
            launch_timeout_ms: 2_000,
            startup_timeout_ms: 2_000,
            dependency_timeout_ms: 5_000,
            stop_timeout_ms: 1_000,
            probe_host: "127.0.0.1".into(),
        }
    }

    fn orchestrator(
        launcher: Arc<MockLauncher>,
        transport: Arc<ScriptedTransport>,
    ) -> Orchestrator {
        let gate = ReadinessGate::new(transport, "127.0.0.1");
        Orchestrator::new(launcher, gate, fast_config())
    }

    #[tokio::test]
    async fn test_failure_cascades_to_dependents() {
        let a = probed("a", 1001);
        let mut b = probed("b", 1002);
        b.depends_on.insert("a".into());
        let mut c = probed("c", 1003);
        c.depends_on.insert("b".into());
        let graph = DependencyGraph::build(vec![a, b, c]).unwrap();

        let launcher = Arc::new(MockLauncher::new());
        let transport = Arc::new(ScriptedTransport::new());
        transport.script_tcp("127.0.0.1", 1001, vec![true]);
        transport.script_tcp("127.0.0.1", 1002, vec![false]);
        transport.script_tcp("127.0.0.1", 1003, vec![true]);

        let report = orchestrator(launcher.clone(), transport.clone())
            .run(&graph, &CancellationToken::new())
            .await
            .unwrap()
            .into_report();

        assert_eq!(report.state_of("a"), Some(ServiceState::Ready));
        assert_eq!(report.state_of("b"), Some(ServiceState::Failed));
        assert_eq!(report.state_of("c"), Some(ServiceState::Failed));
        assert!(matches!(
            report.error_of("b"),
            Some(OrchestrationError::Timeout { attempts: 3, .. })
        ));
        let c_err = report.error_of("c").unwrap();
        assert!(matches!(c_err.root_cause(), OrchestrationError::Timeout { .. }));
        assert_eq!(launcher.started().await, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(transport.attempts_for("tcp://127.0.0.1:1003"), 0);
        assert!(!report.is_successful());
    }

    #[tokio::test]
    async fn test_unresolved_reference_aborts_before_launch() {
        let mut app = ServiceDescriptor::image("app", "img");
        app.environment
            .insert("DB_PASSWORD".into(), EnvValue::parameter("mysql-password"));
        let graph = DependencyGraph::build(vec![app]).unwrap();
        let launcher = Arc::new(MockLauncher::new());

        let err = orchestrator(launcher.clone(), Arc::new(ScriptedTransport::always_ready()))
            .run(&graph, &CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, OrchestrationError::UnresolvedReference { .. }));
        assert!(launcher.started().await.is_empty());
    }

    #[tokio::test]
    async fn test_service_without_probe_must_be_running() {
        let graph =
            DependencyGraph::build(vec![ServiceDescriptor::image("job", "busybox")]).unwrap();
        let launcher = Arc::new(MockLauncher::new());
        launcher.set_behavior("job", MockBehavior::exited()).await;

        let report = orchestrator(launcher, Arc::new(ScriptedTransport::new()))
            .run(&graph, &CancellationToken::new())
            .await
            .unwrap()
            .into_report();
        assert!(matches!(
            report.error_of("job"),
            Some(OrchestrationError::Launch { .. })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_stops_in_reverse_order() {
        let a = ServiceDescriptor::image("a", "img");
        let mut b = ServiceDescriptor::image("b", "img");
        b.depends_on.insert("a".into());
        let graph = DependencyGraph::build(vec![a, b]).unwrap();
        let launcher = Arc::new(MockLauncher::new());

        let stack = orchestrator(launcher.clone(), Arc::new(ScriptedTransport::new()))
            .run(&graph, &CancellationToken::new())
            .await
            .unwrap();
        assert!(stack.report().is_successful());
        assert!(stack.handle("a").is_some());

        let report = stack.shutdown().await;
        assert_eq!(report.services_in(ServiceState::Stopped), vec!["a", "b"]);
        assert_eq!(launcher.stopped().await, vec!["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn test_events_are_streamed() {
        let graph = DependencyGraph::build(vec![ServiceDescriptor::image("a", "img")]).unwrap();
        let (tx, mut rx) = mpsc::channel(64);
        let orchestrator = orchestrator(
            Arc::new(MockLauncher::new()),
            Arc::new(ScriptedTransport::new()),
        )
        .with_events(tx);

        orchestrator
            .run(&graph, &CancellationToken::new())
            .await
            .unwrap();
        drop(orchestrator);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(RunEvent::Started { services: 1, .. })));
        assert!(events.contains(&RunEvent::StateChanged {
            service: "a".into(),
            from: ServiceState::Starting,
            to: ServiceState::Ready,
        }));
        assert!(matches!(
            events.last(),
            Some(RunEvent::Finished {
                successful: true,
                cancelled: false
            })
        ));
    }
}
