//! MySQL reachability check.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::Connection;

use crate::domain::models::DiagnosticsConfig;
use crate::domain::ports::{DatabaseConnector, DiagnosticError};

pub struct MySqlConnector {
    options: MySqlConnectOptions,
    timeout: Duration,
}

impl MySqlConnector {
    pub fn new(config: &DiagnosticsConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.db_host)
            .port(config.db_port)
            .database(&config.db_name)
            .username(&config.db_user)
            .password(&config.db_password)
            .charset("utf8mb4");

        Self {
            options,
            timeout: Duration::from_millis(config.check_timeout_ms),
        }
    }
}

#[async_trait]
impl DatabaseConnector for MySqlConnector {
    async fn connect(&self) -> Result<(), DiagnosticError> {
        let connect = MySqlConnection::connect_with(&self.options);
        let connection = tokio::time::timeout(self.timeout, connect)
            .await
            .map_err(|_| {
                DiagnosticError::Connection(format!(
                    "timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })?
            .map_err(|e| DiagnosticError::Connection(e.to_string()))?;

        connection
            .close()
            .await
            .map_err(|e| DiagnosticError::Connection(e.to_string()))
    }
}
