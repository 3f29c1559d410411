//! Domain layer for devhost
//!
//! Service, stack and run models, the error taxonomy, and the port traits
//! implemented by adapters.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{OrchestrationError, OrchestrationResult};
