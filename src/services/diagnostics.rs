//! Connectivity diagnostics for a running stack.
//!
//! Each backend check collects its own entries; a failing check never
//! prevents the others from running.

use std::sync::Arc;

use chrono::Local;
use tracing::{debug, warn};

use crate::adapters::diagnostics::{MySqlConnector, S3HttpStore, SecretsManagerClient};
use crate::domain::models::{CheckEntry, DiagnosticReport, DiagnosticsConfig};
use crate::domain::ports::{DatabaseConnector, DiagnosticError, ObjectStore, SecretStore};

pub struct DiagnosticService {
    database: Arc<dyn DatabaseConnector>,
    object_store: Arc<dyn ObjectStore>,
    secret_store: Arc<dyn SecretStore>,
    bucket: String,
}

impl DiagnosticService {
    pub fn new(
        database: Arc<dyn DatabaseConnector>,
        object_store: Arc<dyn ObjectStore>,
        secret_store: Arc<dyn SecretStore>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            database,
            object_store,
            secret_store,
            bucket: bucket.into(),
        }
    }

    /// Wire the MySQL, S3 and secrets-manager adapters.
    pub fn from_config(config: &DiagnosticsConfig) -> Result<Self, DiagnosticError> {
        Ok(Self::new(
            Arc::new(MySqlConnector::new(config)),
            Arc::new(S3HttpStore::new(config)?),
            Arc::new(SecretsManagerClient::new(config)),
            config.bucket.clone(),
        ))
    }

    /// Run all checks concurrently.
    pub async fn run(&self) -> DiagnosticReport {
        let (database, object_storage, secret_store) = tokio::join!(
            self.check_database(),
            self.check_object_storage(),
            self.check_secret_store()
        );
        DiagnosticReport {
            database,
            object_storage,
            secret_store,
            system: system_entries(),
        }
    }

    async fn check_database(&self) -> Vec<CheckEntry> {
        match self.database.connect().await {
            Ok(()) => vec![CheckEntry::success("Database connection successful")],
            Err(e) => {
                warn!(error = %e, "database check failed");
                vec![CheckEntry::error(format!("Database connection failed: {e}"))]
            }
        }
    }

    async fn check_object_storage(&self) -> Vec<CheckEntry> {
        let mut entries = Vec::new();
        if let Err(e) = self.object_storage_steps(&mut entries).await {
            warn!(error = %e, "object storage check failed");
            entries.push(CheckEntry::error(format!("S3 Error: {e}")));
        }
        entries
    }

    async fn object_storage_steps(
        &self,
        entries: &mut Vec<CheckEntry>,
    ) -> Result<(), DiagnosticError> {
        let bucket = self.bucket.as_str();
        self.object_store.initialize().await?;
        entries.push(CheckEntry::success("S3 Client initialized successfully"));

        if self.object_store.bucket_exists(bucket).await? {
            entries.push(CheckEntry::info(format!("S3 Bucket '{bucket}' already exists")));
        } else {
            entries.push(CheckEntry::warning(format!(
                "S3 Bucket '{bucket}' does not exist, creating..."
            )));
            self.object_store.create_bucket(bucket).await?;
            self.object_store.wait_until_bucket_exists(bucket).await?;
            debug!(bucket, "bucket created");
            entries.push(CheckEntry::success(format!(
                "S3 Bucket '{bucket}' created successfully"
            )));
        }

        entries.push(CheckEntry::success("S3 test completed successfully"));
        Ok(())
    }

    async fn check_secret_store(&self) -> Vec<CheckEntry> {
        match self.secret_store.initialize().await {
            Ok(()) => vec![CheckEntry::success(
                "Secrets Manager Client initialized successfully",
            )],
            Err(e) => vec![CheckEntry::error(format!("Secrets Manager Error: {e}"))],
        }
    }
}

fn system_entries() -> Vec<CheckEntry> {
    vec![
        CheckEntry::success("devhost is running"),
        CheckEntry::info(format!("Version: {}", env!("CARGO_PKG_VERSION"))),
        CheckEntry::info(format!(
            "Server Time: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S %Z")
        )),
    ]
}
