use serde::{Deserialize, Serialize};

/// Main configuration structure for devhost
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Stack file used when `--file` is not given
    #[serde(default = "default_stack_file")]
    pub stack_file: String,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Orchestration bounds
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Probe transport security
    #[serde(default)]
    pub transport: TransportConfig,

    /// Container / process runtime
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

fn default_stack_file() -> String {
    "devhost.yaml".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stack_file: default_stack_file(),
            logging: LoggingConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            transport: TransportConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Bounds applied to every blocking step of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OrchestratorConfig {
    /// Bound on a single `Launcher::start` call
    #[serde(default = "default_launch_timeout_ms")]
    pub launch_timeout_ms: u64,

    /// Bound on the readiness wait of one service
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,

    /// Bound on waiting for all dependencies of one service
    #[serde(default = "default_dependency_timeout_ms")]
    pub dependency_timeout_ms: u64,

    /// Bound on stopping one service
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    /// Host used to reach published ports
    #[serde(default = "default_probe_host")]
    pub probe_host: String,
}

const fn default_launch_timeout_ms() -> u64 {
    600_000
}

const fn default_startup_timeout_ms() -> u64 {
    120_000
}

const fn default_dependency_timeout_ms() -> u64 {
    900_000
}

const fn default_stop_timeout_ms() -> u64 {
    10_000
}

fn default_probe_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            launch_timeout_ms: default_launch_timeout_ms(),
            startup_timeout_ms: default_startup_timeout_ms(),
            dependency_timeout_ms: default_dependency_timeout_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
            probe_host: default_probe_host(),
        }
    }
}

/// Transport security for probes and diagnostic clients
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransportConfig {
    /// Permit plain HTTP to non-loopback hosts and invalid TLS certificates
    #[serde(default)]
    pub allow_unsecured_transport: bool,
}

/// Runtime used to launch services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RuntimeConfig {
    /// Docker-compatible CLI binary
    #[serde(default = "default_docker_binary")]
    pub docker_binary: String,

    /// Network shared by stack containers; defaults to `devhost-<stack>`
    #[serde(default)]
    pub network: Option<String>,
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            docker_binary: default_docker_binary(),
            network: None,
        }
    }
}

/// Connection settings for `diagnose`.
///
/// Read from the unprefixed variables a service container receives
/// (`DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD`,
/// `AWS_ENDPOINT`), falling back to in-network defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DiagnosticsConfig {
    #[serde(default = "default_db_host")]
    pub db_host: String,

    #[serde(default = "default_db_port")]
    pub db_port: u16,

    #[serde(default = "default_db_name")]
    pub db_name: String,

    #[serde(default = "default_db_user")]
    pub db_user: String,

    #[serde(default = "default_db_password")]
    pub db_password: String,

    #[serde(default = "default_aws_endpoint")]
    pub aws_endpoint: String,

    #[serde(default = "default_aws_region")]
    pub aws_region: String,

    /// Bucket checked and created by the object storage check
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Bound on each backend check
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,
}

fn default_db_host() -> String {
    "mysql".to_string()
}

const fn default_db_port() -> u16 {
    3306
}

fn default_db_name() -> String {
    "mysqldb".to_string()
}

fn default_db_user() -> String {
    "root".to_string()
}

fn default_db_password() -> String {
    "password".to_string()
}

fn default_aws_endpoint() -> String {
    "http://localstack:4566".to_string()
}

fn default_aws_region() -> String {
    "us-east-1".to_string()
}

fn default_bucket() -> String {
    "storage".to_string()
}

const fn default_check_timeout_ms() -> u64 {
    10_000
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            db_host: default_db_host(),
            db_port: default_db_port(),
            db_name: default_db_name(),
            db_user: default_db_user(),
            db_password: default_db_password(),
            aws_endpoint: default_aws_endpoint(),
            aws_region: default_aws_region(),
            bucket: default_bucket(),
            check_timeout_ms: default_check_timeout_ms(),
        }
    }
}
