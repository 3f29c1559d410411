use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::{Config, DiagnosticsConfig};

/// Configuration error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Invalid {name}: {value}. Must be at least 1")]
    InvalidTimeout { name: &'static str, value: u64 },

    #[error("Stack file path cannot be empty")]
    EmptyStackFile,

    #[error("Probe host cannot be empty")]
    EmptyProbeHost,

    #[error("Docker binary cannot be empty")]
    EmptyDockerBinary,

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Variables a stack container receives that `diagnose` reads unprefixed.
const DIAGNOSTIC_VARIABLES: [&str; 6] = [
    "DB_HOST",
    "DB_PORT",
    "DB_NAME",
    "DB_USER",
    "DB_PASSWORD",
    "AWS_ENDPOINT",
];

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .devhost/config.yaml (project config, created by init)
    /// 3. .devhost/local.yaml (local overrides, optional)
    /// 4. Environment variables (DEVHOST_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment()
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("DEVHOST_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Connection settings for `diagnose`
    ///
    /// Precedence (lowest to highest): defaults, the unprefixed service
    /// variables (`DB_HOST`, ...), then `DEVHOST_DIAGNOSTICS_*`.
    pub fn load_diagnostics() -> Result<DiagnosticsConfig> {
        Figment::new()
            .merge(Serialized::defaults(DiagnosticsConfig::default()))
            .merge(Env::raw().only(&DIAGNOSTIC_VARIABLES))
            .merge(Env::prefixed("DEVHOST_DIAGNOSTICS_"))
            .extract()
            .context("Failed to extract diagnostics configuration")
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".devhost/config.yaml"))
            .merge(Yaml::file(".devhost/local.yaml"))
            .merge(Env::prefixed("DEVHOST_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.stack_file.trim().is_empty() {
            return Err(ConfigError::EmptyStackFile);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        let orchestrator = &config.orchestrator;
        for (name, value) in [
            ("launch_timeout_ms", orchestrator.launch_timeout_ms),
            ("startup_timeout_ms", orchestrator.startup_timeout_ms),
            ("dependency_timeout_ms", orchestrator.dependency_timeout_ms),
            ("stop_timeout_ms", orchestrator.stop_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidTimeout { name, value });
            }
        }

        if orchestrator.probe_host.trim().is_empty() {
            return Err(ConfigError::EmptyProbeHost);
        }

        if config.runtime.docker_binary.trim().is_empty() {
            return Err(ConfigError::EmptyDockerBinary);
        }

        if let Some(network) = &config.runtime.network {
            if network.is_empty() || network.contains(char::is_whitespace) {
                return Err(ConfigError::ValidationFailed(format!(
                    "network name '{network}' must be non-empty without whitespace"
                )));
            }
        }

        Ok(())
    }
}
