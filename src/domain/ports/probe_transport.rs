//! Probe transport port - raw HTTP GET and TCP connect primitives.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("attempt timed out after {0}ms")]
    TimedOut(u64),

    #[error("request failed: {0}")]
    Request(String),

    #[error("refusing unsecured transport to {0}; set transport.allow_unsecured_transport to permit it")]
    InsecureTransport(String),
}

impl TransportError {
    /// Errors that no amount of retrying will fix.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::InsecureTransport(_))
    }
}

/// Transport used by the readiness gate for each probe attempt.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    /// Issue a GET and return the response status code.
    async fn http_get(&self, url: &str, timeout: Duration) -> Result<u16, TransportError>;

    /// Open (and immediately close) a TCP connection.
    async fn tcp_connect(&self, host: &str, port: u16, timeout: Duration)
        -> Result<(), TransportError>;
}
