//! Orchestration services.
//!
//! - `dependency_graph`: validation and startup ordering
//! - `environment`: parameter and endpoint resolution
//! - `readiness_gate`: health probe polling
//! - `orchestrator`: concurrent bring-up and teardown
//! - `stack_builder` / `stack_file`: declaring stacks in code or YAML
//! - `diagnostics`: connectivity checks against a running stack

pub mod dependency_graph;
pub mod diagnostics;
pub mod environment;
pub mod orchestrator;
pub mod readiness_gate;
pub mod stack_builder;
pub mod stack_file;

pub use dependency_graph::DependencyGraph;
pub use diagnostics::DiagnosticService;
pub use environment::{EnvironmentResolver, ParameterValues};
pub use orchestrator::{Orchestrator, RunEvent, RunningStack};
pub use readiness_gate::{ProbeTarget, Readiness, ReadinessGate, ResolvedProbe};
pub use stack_builder::{sample_stack, ServiceBuilder, StackBuilder};
