//! Secrets-manager client setup.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use crate::domain::models::DiagnosticsConfig;
use crate::domain::ports::{DiagnosticError, SecretStore};

/// Secrets-manager endpoint of the AWS emulator.
///
/// Initialization validates the endpoint and builds the HTTP client; no
/// request is sent.
pub struct SecretsManagerClient {
    endpoint: String,
    region: String,
    timeout: Duration,
}

impl SecretsManagerClient {
    pub fn new(config: &DiagnosticsConfig) -> Self {
        Self {
            endpoint: config.aws_endpoint.clone(),
            region: config.aws_region.clone(),
            timeout: Duration::from_millis(config.check_timeout_ms),
        }
    }
}

#[async_trait]
impl SecretStore for SecretsManagerClient {
    async fn initialize(&self) -> Result<(), DiagnosticError> {
        Url::parse(&self.endpoint)
            .map_err(|e| DiagnosticError::Configuration(format!("{}: {e}", self.endpoint)))?;
        if self.region.is_empty() {
            return Err(DiagnosticError::Configuration("region is empty".to_string()));
        }
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map(|_| ())
            .map_err(|e| DiagnosticError::Configuration(e.to_string()))
    }
}
