//! Implementation of the `devhost diagnose` command.

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, CommandOutput};
use crate::cli::CliContext;
use crate::domain::models::DiagnosticReport;
use crate::infrastructure::config::ConfigLoader;
use crate::services::DiagnosticService;

#[derive(Args, Debug)]
pub struct DiagnoseArgs {
    /// Bucket to check, overriding DEVHOST_DIAGNOSTICS_BUCKET
    #[arg(long, short)]
    pub bucket: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DiagnoseOutput {
    pub status: u16,
    #[serde(flatten)]
    pub report: DiagnosticReport,
}

impl CommandOutput for DiagnoseOutput {
    fn to_human(&self) -> String {
        format!(
            "{}\nStatus: {}",
            TableFormatter::new().format_diagnostics(&self.report),
            self.status
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: DiagnoseArgs, ctx: &CliContext) -> Result<()> {
    let mut settings = ConfigLoader::load_diagnostics()?;
    if let Some(bucket) = args.bucket {
        settings.bucket = bucket;
    }
    ctx.redactor.register_secret(&settings.db_password);

    let service =
        DiagnosticService::from_config(&settings).context("Failed to set up diagnostic clients")?;
    let report = service.run().await;
    let status = report.http_status();

    output(&DiagnoseOutput { status, report }, ctx.json);

    if status >= 500 {
        bail!("Database check failed (status {status})");
    }
    Ok(())
}
