//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::commands::diagnose::DiagnoseArgs;
use crate::cli::commands::init::InitArgs;
use crate::cli::commands::plan::PlanArgs;
use crate::cli::commands::up::UpArgs;
use crate::cli::commands::validate::ValidateArgs;

#[derive(Parser, Debug)]
#[command(name = "devhost")]
#[command(about = "devhost - local development stack orchestrator", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .devhost/config.yaml and .devhost/local.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Stack file (defaults to the configured stack_file)
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter configuration and stack file
    Init(InitArgs),

    /// Check a stack file for duplicate names, unknown references and cycles
    Validate(ValidateArgs),

    /// Show the start order and resolved environment of every service
    Plan(PlanArgs),

    /// Bring the stack up and wait for every service to become ready
    Up(UpArgs),

    /// Check database, object storage and secret store connectivity
    Diagnose(DiagnoseArgs),
}
