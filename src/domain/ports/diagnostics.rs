//! Diagnostic backends - the services a running stack is checked against.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiagnosticError {
    #[error("{0}")]
    Connection(String),

    #[error("invalid client configuration: {0}")]
    Configuration(String),

    #[error("unexpected response: {0}")]
    Response(String),
}

/// Relational database reachability.
#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    /// Open one connection and close it again.
    async fn connect(&self) -> Result<(), DiagnosticError>;
}

/// S3-compatible object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn initialize(&self) -> Result<(), DiagnosticError>;

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, DiagnosticError>;

    async fn create_bucket(&self, bucket: &str) -> Result<(), DiagnosticError>;

    /// Block until a freshly created bucket is visible, with a bounded wait.
    async fn wait_until_bucket_exists(&self, bucket: &str) -> Result<(), DiagnosticError>;
}

/// Secrets-manager style secret store.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn initialize(&self) -> Result<(), DiagnosticError>;
}
