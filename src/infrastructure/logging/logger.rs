use std::sync::Arc;

use anyhow::Result;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use super::config::{LogConfig, LogFormat, RotationPolicy};
use super::redaction::{RedactingMakeWriter, SecretRedactor};

/// Logger implementation using tracing
///
/// Console output goes to stderr so `--json` command output on stdout
/// stays machine readable.
pub struct LoggerImpl {
    redactor: Arc<SecretRedactor>,
    _guard: Option<WorkerGuard>,
}

impl LoggerImpl {
    /// Initialize the global subscriber
    ///
    /// `RUST_LOG` overrides the configured level.
    pub fn init(config: &LogConfig) -> Result<Self> {
        let default_level = parse_log_level(&config.level)?;
        let filter = || {
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy()
        };

        let redactor = Arc::new(SecretRedactor::new()?);
        let writer = RedactingMakeWriter::stderr(redactor.clone());

        let console_layer = match config.format {
            LogFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_current_span(true)
                .with_target(true)
                .with_filter(filter())
                .boxed(),
            LogFormat::Pretty => tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(false)
                .with_filter(filter())
                .boxed(),
        };

        let (file_layer, guard) = match config.log_dir {
            Some(ref log_dir) => {
                let file_appender = match config.rotation {
                    RotationPolicy::Daily => rolling::daily(log_dir, "devhost.log"),
                    RotationPolicy::Hourly => rolling::hourly(log_dir, "devhost.log"),
                    RotationPolicy::Never => rolling::never(log_dir, "devhost.log"),
                };
                let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
                let file_writer = RedactingMakeWriter::new(redactor.clone(), non_blocking_file);

                // File layer - always JSON for structured logging
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(file_writer)
                    .with_ansi(false)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_filter(filter());
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        tracing::debug!(
            level = %config.level,
            format = ?config.format,
            file_output = config.log_dir.is_some(),
            "logger initialized"
        );

        Ok(Self {
            redactor,
            _guard: guard,
        })
    }

    /// Redactor applied to console and file output; register generated secrets here.
    pub fn redactor(&self) -> Arc<SecretRedactor> {
        self.redactor.clone()
    }
}

/// Parse log level string to Level
fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!("Invalid log level: {level}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("trace"), Ok(Level::TRACE)));
        assert!(matches!(parse_log_level("WARN"), Ok(Level::WARN)));
        assert!(parse_log_level("verbose").is_err());
    }

    #[test]
    fn test_logger_init_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            level: "info".to_string(),
            format: LogFormat::Json,
            log_dir: Some(dir.path().to_path_buf()),
            rotation: RotationPolicy::Never,
        };

        // Only one global subscriber per test binary.
        let logger = LoggerImpl::init(&config).unwrap();
        logger.redactor().register_secret("s3cr3tGeneratedPw");
        assert!(logger._guard.is_some());

        tracing::info!(
            args = ?["run", "-e", "MYSQL_ROOT_PASSWORD=s3cr3tGeneratedPw"],
            "running container runtime command"
        );
        // Dropping the guard flushes the background file writer.
        drop(logger);

        let written = std::fs::read_to_string(dir.path().join("devhost.log")).unwrap();
        assert!(written.contains("running container runtime command"));
        assert!(!written.contains("s3cr3tGeneratedPw"));
    }
}
