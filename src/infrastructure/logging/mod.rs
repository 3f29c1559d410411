//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty formatting
//! - Rolling log files
//! - Secret redaction

pub mod config;
pub mod logger;
pub mod redaction;

pub use config::{LogConfig, LogFormat, RotationPolicy};
pub use logger::LoggerImpl;
pub use redaction::SecretRedactor;
