//! Adapters implementing the domain ports.
//!
//! - `launchers`: docker CLI, local processes, and an in-memory mock
//! - `probes`: socket-backed and scripted probe transports
//! - `diagnostics`: MySQL, S3 and secrets-manager backends

pub mod diagnostics;
pub mod launchers;
pub mod probes;
