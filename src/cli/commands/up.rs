//! Implementation of the `devhost up` command.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::launchers::{CompositeLauncher, DockerLauncher, MockLauncher, ProcessLauncher};
use crate::adapters::probes::{HttpProbeTransport, ScriptedTransport};
use crate::cli::output::progress::track_run;
use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, CommandOutput};
use crate::cli::CliContext;
use crate::domain::models::{Config, RunReport};
use crate::domain::ports::{Launcher, ProbeTransport};
use crate::infrastructure::logging::SecretRedactor;
use crate::services::stack_file::load_graph;
use crate::services::{EnvironmentResolver, Orchestrator, ReadinessGate};

#[derive(Args, Debug)]
pub struct UpArgs {
    /// Simulate the run with in-memory launchers and probes
    #[arg(long)]
    pub dry_run: bool,

    /// Leave the stack running and exit once every service is ready
    #[arg(long, short)]
    pub detach: bool,
}

#[derive(Serialize)]
pub struct UpOutput {
    #[serde(skip)]
    report: RunReport,
    #[serde(skip)]
    redactor: Arc<SecretRedactor>,
    pub detached: bool,
}

impl CommandOutput for UpOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            TableFormatter::new().format_report(&self.report, &self.redactor),
            format!(
                "Run {} finished in {}ms",
                self.report.run_id,
                self.report.duration_ms()
            ),
        ];
        if self.detached {
            lines.push("Stack left running.".to_string());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        let mut json = self.report.to_json();
        json["detached"] = serde_json::Value::Bool(self.detached);
        let rendered = json.to_string();
        serde_json::from_str(&self.redactor.redact(&rendered)).unwrap_or(json)
    }
}

pub async fn execute(args: UpArgs, ctx: &CliContext) -> Result<()> {
    let (stack, graph) = load_graph(&ctx.stack_file)?;
    let resolver = EnvironmentResolver::for_stack(&stack);
    for secret in resolver.parameters().secret_values() {
        ctx.redactor.register_secret(secret);
    }

    let (launcher, transport) = if args.dry_run {
        info!("dry run: using simulated launcher and probes");
        simulated()
    } else {
        runtime(&stack.name, &ctx.config)?
    };

    let gate = ReadinessGate::new(transport, ctx.config.orchestrator.probe_host.clone());
    let (tx, rx) = mpsc::channel(64);
    let orchestrator = Orchestrator::new(launcher, gate, ctx.config.orchestrator.clone())
        .with_resolver(resolver)
        .with_stack_name(stack.name.clone())
        .with_events(tx);

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn(cancel_on_interrupt(cancel.clone()));
    let progress = tokio::spawn(track_run(rx, !ctx.json));

    let result = orchestrator.run(&graph, &cancel).await;
    drop(orchestrator);
    let running = match result {
        Ok(running) => {
            let _ = progress.await;
            running
        }
        Err(e) => {
            progress.abort();
            interrupt.abort();
            return Err(e).context("Stack could not be started");
        }
    };

    let successful = running.report().is_successful();
    let detached = successful && args.detach && !args.dry_run;

    let report = if detached {
        running.into_report()
    } else if successful && !args.dry_run {
        if !ctx.json {
            eprintln!("Stack is running. Press Ctrl-C to stop.");
        }
        cancel.cancelled().await;
        running.shutdown().await
    } else {
        running.shutdown().await
    };
    interrupt.abort();

    let failed: Vec<String> = report.failed_services().iter().map(ToString::to_string).collect();
    let cancelled = report.cancelled;
    output(
        &UpOutput {
            report,
            redactor: ctx.redactor.clone(),
            detached,
        },
        ctx.json,
    );

    if !failed.is_empty() {
        bail!("{} service(s) failed: {}", failed.len(), failed.join(", "));
    }
    if cancelled {
        bail!("Run cancelled before the stack was ready");
    }
    Ok(())
}

fn simulated() -> (Arc<dyn Launcher>, Arc<dyn ProbeTransport>) {
    (
        Arc::new(MockLauncher::new()),
        Arc::new(ScriptedTransport::always_ready()),
    )
}

fn runtime(stack: &str, config: &Config) -> Result<(Arc<dyn Launcher>, Arc<dyn ProbeTransport>)> {
    let containers = Arc::new(DockerLauncher::new(stack, &config.runtime));
    let processes = Arc::new(ProcessLauncher::new(Duration::from_millis(
        config.orchestrator.stop_timeout_ms,
    )));
    let transport =
        HttpProbeTransport::new(&config.transport).context("Failed to build HTTP probe client")?;
    Ok((
        Arc::new(CompositeLauncher::new(containers, processes)),
        Arc::new(transport),
    ))
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("interrupt received, stopping stack");
            cancel.cancel();
        }
        Err(e) => warn!(error = %e, "failed to listen for interrupt"),
    }
}
