//! Implementation of the `devhost validate` command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::cli::CliContext;
use crate::services::stack_file::load_graph;

#[derive(Args, Debug)]
pub struct ValidateArgs {}

#[derive(Debug, Serialize)]
pub struct ValidateOutput {
    pub stack: String,
    pub services: usize,
    pub start_order: Vec<String>,
    pub waves: Vec<Vec<String>>,
}

impl CommandOutput for ValidateOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Stack '{}' is valid ({} services)",
            self.stack, self.services
        )];
        for (i, wave) in self.waves.iter().enumerate() {
            lines.push(format!("  wave {}: {}", i + 1, wave.join(", ")));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(_args: ValidateArgs, ctx: &CliContext) -> Result<()> {
    let (stack, graph) = load_graph(&ctx.stack_file)?;
    let output_data = ValidateOutput {
        stack: stack.name,
        services: graph.len(),
        start_order: graph.topological_order().to_vec(),
        waves: graph.waves(),
    };
    output(&output_data, ctx.json);
    Ok(())
}
