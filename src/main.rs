//! devhost CLI entry point.

use anyhow::Context;
use clap::Parser;

use devhost::cli::{handle_error, Cli, CliContext, Commands};
use devhost::infrastructure::config::ConfigLoader;
use devhost::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;
    if let Err(err) = run(cli).await {
        handle_error(err, json);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match cli.config {
        Some(ref path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load().context("Failed to load configuration")?,
    };

    let logger = LoggerImpl::init(&LogConfig::from(&config.logging))?;
    let ctx = CliContext::new(config, cli.file, cli.json, logger.redactor());

    match cli.command {
        Commands::Init(args) => devhost::cli::commands::init::execute(args, &ctx).await,
        Commands::Validate(args) => devhost::cli::commands::validate::execute(args, &ctx).await,
        Commands::Plan(args) => devhost::cli::commands::plan::execute(args, &ctx).await,
        Commands::Up(args) => devhost::cli::commands::up::execute(args, &ctx).await,
        Commands::Diagnose(args) => devhost::cli::commands::diagnose::execute(args, &ctx).await,
    }
}
