//! Diagnostic backend adapters.

pub mod mysql;
pub mod s3;
pub mod secrets;

pub use mysql::MySqlConnector;
pub use s3::S3HttpStore;
pub use secrets::SecretsManagerClient;
