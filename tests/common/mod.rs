//! Common test utilities for integration tests
//!
//! Shared fixtures for orchestrator and stack-file tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use devhost::adapters::launchers::MockLauncher;
use devhost::adapters::probes::ScriptedTransport;
use devhost::domain::models::{Endpoint, HealthProbe, OrchestratorConfig, ServiceDescriptor};
use devhost::services::{Orchestrator, ReadinessGate};
use tempfile::TempDir;

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Write `contents` to a stack file inside a fresh temp directory.
pub fn stack_file(contents: &str) -> (TempDir, PathBuf) {
    let dir = temp_dir();
    let path = dir.path().join("devhost.yaml");
    std::fs::write(&path, contents).expect("Failed to write stack file");
    (dir, path)
}

/// Setup test logging
#[allow(dead_code)]
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Image service with a TCP probe on `port`, probed every 5ms, 3 attempts.
pub fn probed(name: &str, port: u16) -> ServiceDescriptor {
    let mut svc = ServiceDescriptor::image(name, "img");
    svc.endpoints.push(Endpoint::tcp("tcp", port, None));
    svc.health_probe = Some(HealthProbe::tcp(port).with_timing(5, 50, 3));
    svc
}

/// Image service that waits for every service in `deps`.
pub fn waiting_on(mut svc: ServiceDescriptor, deps: &[&str]) -> ServiceDescriptor {
    svc.depends_on.extend(deps.iter().map(ToString::to_string));
    svc
}

pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        launch_timeout_ms: 2_000,
        startup_timeout_ms: 2_000,
        dependency_timeout_ms: 5_000,
        stop_timeout_ms: 1_000,
        probe_host: "127.0.0.1".into(),
    }
}

pub fn orchestrator(
    launcher: Arc<MockLauncher>,
    transport: Arc<ScriptedTransport>,
) -> Orchestrator {
    let gate = ReadinessGate::new(transport, "127.0.0.1");
    Orchestrator::new(launcher, gate, fast_config())
}
