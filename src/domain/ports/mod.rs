//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - Launcher: starting, stopping and inspecting services
//! - ProbeTransport: raw HTTP/TCP primitives for readiness probes
//! - DatabaseConnector / ObjectStore / SecretStore: diagnostic backends
//!
//! These traits define the contracts that allow the orchestration core to be
//! independent of any container runtime or cloud SDK.

pub mod diagnostics;
pub mod launcher;
pub mod probe_transport;

pub use diagnostics::{DatabaseConnector, DiagnosticError, ObjectStore, SecretStore};
pub use launcher::{HandleKind, LaunchFailure, Launcher, ServiceHandle};
pub use probe_transport::{ProbeTransport, TransportError};
