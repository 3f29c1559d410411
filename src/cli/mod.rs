//! Command-line interface for devhost.

pub mod commands;
pub mod output;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use console::style;

use crate::domain::models::Config;
use crate::infrastructure::logging::SecretRedactor;

pub use types::{Cli, Commands};

/// State shared by every command.
pub struct CliContext {
    pub config: Config,
    /// Stack file selected by `--file`, or the configured default.
    pub stack_file: PathBuf,
    pub json: bool,
    pub redactor: Arc<SecretRedactor>,
}

impl CliContext {
    pub fn new(
        config: Config,
        file: Option<PathBuf>,
        json: bool,
        redactor: Arc<SecretRedactor>,
    ) -> Self {
        let stack_file = file.unwrap_or_else(|| PathBuf::from(&config.stack_file));
        Self {
            config,
            stack_file,
            json,
            redactor,
        }
    }
}

/// Print `err` with its context chain and exit with status 1.
pub fn handle_error(err: anyhow::Error, json: bool) -> ! {
    let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
    if json {
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": causes,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err}", style("error:").red().bold());
        for cause in causes {
            eprintln!("  {} {cause}", style("caused by:").dim());
        }
    }
    std::process::exit(1)
}
