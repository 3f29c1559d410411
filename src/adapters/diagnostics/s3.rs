//! Path-style S3 client over plain HTTP.
//!
//! Only the bucket operations the diagnostic pass needs. Requests are
//! unsigned, which the local emulator accepts.

use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoff;
use reqwest::{StatusCode, Url};
use tracing::debug;

use crate::domain::models::DiagnosticsConfig;
use crate::domain::ports::{DiagnosticError, ObjectStore};

pub struct S3HttpStore {
    client: reqwest::Client,
    endpoint: String,
    region: String,
    wait_limit: Duration,
}

impl S3HttpStore {
    pub fn new(config: &DiagnosticsConfig) -> Result<Self, DiagnosticError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.check_timeout_ms))
            .build()
            .map_err(|e| DiagnosticError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.aws_endpoint.trim_end_matches('/').to_string(),
            region: config.aws_region.clone(),
            wait_limit: Duration::from_millis(config.check_timeout_ms),
        })
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!("{}/{bucket}", self.endpoint)
    }
}

#[async_trait]
impl ObjectStore for S3HttpStore {
    async fn initialize(&self) -> Result<(), DiagnosticError> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| DiagnosticError::Configuration(format!("{}: {e}", self.endpoint)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DiagnosticError::Configuration(format!(
                "unsupported endpoint scheme '{}'",
                url.scheme()
            )));
        }
        if self.region.is_empty() {
            return Err(DiagnosticError::Configuration("region is empty".to_string()));
        }
        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, DiagnosticError> {
        let response = self
            .client
            .head(self.bucket_url(bucket))
            .send()
            .await
            .map_err(|e| DiagnosticError::Connection(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(DiagnosticError::Response(format!(
                "HEAD bucket {bucket} returned {status}"
            ))),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), DiagnosticError> {
        let response = self
            .client
            .put(self.bucket_url(bucket))
            .send()
            .await
            .map_err(|e| DiagnosticError::Connection(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(DiagnosticError::Response(format!(
                "CreateBucket {bucket} returned {status}: {body}"
            )))
        }
    }

    async fn wait_until_bucket_exists(&self, bucket: &str) -> Result<(), DiagnosticError> {
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(2),
            max_elapsed_time: Some(self.wait_limit),
            ..ExponentialBackoff::default()
        };

        backoff::future::retry(policy, || async {
            match self.bucket_exists(bucket).await {
                Ok(true) => Ok(()),
                Ok(false) => {
                    debug!(bucket, "bucket not visible yet");
                    Err(backoff::Error::transient(DiagnosticError::Response(format!(
                        "bucket {bucket} did not appear"
                    ))))
                }
                Err(e @ DiagnosticError::Connection(_)) => Err(backoff::Error::transient(e)),
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }
}
