//! devhost - local development stack orchestrator
//!
//! Declares a stack of containers and local processes, starts them in
//! dependency order, and gates every dependent on the readiness of what it
//! waits for.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): service and run models, errors, port traits
//! - **Service Layer** (`services`): dependency graph, readiness gate, orchestrator
//! - **Adapters** (`adapters`): docker/process launchers, probe transports, diagnostic clients
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use devhost::adapters::launchers::MockLauncher;
//! use devhost::adapters::probes::ScriptedTransport;
//! use devhost::domain::models::OrchestratorConfig;
//! use devhost::services::{
//!     sample_stack, DependencyGraph, EnvironmentResolver, Orchestrator, ReadinessGate,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let stack = sample_stack()?;
//!     let graph = DependencyGraph::build(stack.services.iter().cloned())?;
//!     let gate = ReadinessGate::new(Arc::new(ScriptedTransport::always_ready()), "127.0.0.1");
//!     let launcher = Arc::new(MockLauncher::new());
//!     let orchestrator = Orchestrator::new(launcher, gate, OrchestratorConfig::default())
//!         .with_resolver(EnvironmentResolver::for_stack(&stack));
//!
//!     let running = orchestrator.run(&graph, &CancellationToken::new()).await?;
//!     assert!(running.report().is_successful());
//!     running.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{OrchestrationError, OrchestrationResult};
pub use domain::models::{
    Config, HealthProbe, LaunchSpec, RunReport, ServiceDescriptor, ServiceState, StackDefinition,
};
pub use domain::ports::{Launcher, ProbeTransport};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{DependencyGraph, Orchestrator, ReadinessGate, RunningStack};
