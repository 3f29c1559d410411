//! Implementation of the `devhost plan` command.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::Cell;
use serde::Serialize;

use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, truncate, CommandOutput};
use crate::cli::CliContext;
use crate::domain::models::{LaunchSpec, ServiceDescriptor};
use crate::infrastructure::logging::SecretRedactor;
use crate::services::stack_file::load_graph;
use crate::services::{EnvironmentResolver, ResolvedProbe};

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Show resolved environment variables
    #[arg(long, short = 'e')]
    pub env: bool,
}

#[derive(Debug, Serialize)]
pub struct PlannedService {
    pub name: String,
    pub wave: usize,
    pub launch: String,
    pub depends_on: Vec<String>,
    pub endpoints: Vec<String>,
    pub probe: String,
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct PlanOutput {
    pub stack: String,
    pub services: Vec<PlannedService>,
    #[serde(skip)]
    show_env: bool,
}

impl CommandOutput for PlanOutput {
    fn to_human(&self) -> String {
        let formatter = TableFormatter::new();
        let mut table = formatter.table(&[
            "Wave",
            "Service",
            "Launch",
            "Depends On",
            "Endpoints",
            "Probe",
        ]);
        for service in &self.services {
            table.add_row(vec![
                Cell::new(service.wave),
                Cell::new(&service.name),
                Cell::new(truncate(&service.launch, 40)),
                Cell::new(service.depends_on.join(", ")),
                Cell::new(service.endpoints.join("\n")),
                Cell::new(&service.probe),
            ]);
        }

        let mut lines = vec![format!("Stack '{}'", self.stack), table.to_string()];
        if self.show_env {
            for service in self.services.iter().filter(|s| !s.environment.is_empty()) {
                lines.push(format!("\n{}:", service.name));
                for (key, value) in &service.environment {
                    lines.push(format!("  {key}={value}"));
                }
            }
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: PlanArgs, ctx: &CliContext) -> Result<()> {
    let (stack, graph) = load_graph(&ctx.stack_file)?;
    let resolver = EnvironmentResolver::for_stack(&stack);
    for secret in resolver.parameters().secret_values() {
        ctx.redactor.register_secret(secret);
    }
    let environments = resolver
        .resolve_all(&graph)
        .with_context(|| format!("Failed to resolve environment for stack {}", stack.name))?;

    let probe_host = ctx.config.orchestrator.probe_host.as_str();
    let mut services = Vec::with_capacity(graph.len());
    for (wave, names) in graph.waves().into_iter().enumerate() {
        for name in names {
            let Some(descriptor) = graph.descriptor(&name) else {
                continue;
            };
            let environment = environments.get(&name).cloned().unwrap_or_default();
            services.push(plan_service(
                descriptor,
                wave + 1,
                &environment,
                probe_host,
                &ctx.redactor,
            ));
        }
    }

    let output_data = PlanOutput {
        stack: stack.name,
        services,
        show_env: args.env,
    };
    output(&output_data, ctx.json);
    Ok(())
}

fn plan_service(
    descriptor: &ServiceDescriptor,
    wave: usize,
    environment: &BTreeMap<String, String>,
    probe_host: &str,
    redactor: &SecretRedactor,
) -> PlannedService {
    let probe = match ResolvedProbe::resolve(descriptor, None, probe_host) {
        Ok(Some(probe)) => probe.target.to_string(),
        Ok(None) => "-".to_string(),
        Err(e) => format!("invalid: {e}"),
    };

    PlannedService {
        name: descriptor.name.clone(),
        wave,
        launch: describe_launch(&descriptor.launch),
        depends_on: descriptor
            .dependencies()
            .into_iter()
            .map(str::to_string)
            .collect(),
        endpoints: descriptor
            .endpoints
            .iter()
            .map(|e| match e.host_port {
                Some(host) => format!("{} {}:{}", e.name, host, e.target_port),
                None => format!("{} {}", e.name, e.target_port),
            })
            .collect(),
        probe,
        environment: redactor.redact_environment(environment),
    }
}

fn describe_launch(launch: &LaunchSpec) -> String {
    match launch {
        LaunchSpec::Image { image } => format!("image {image}"),
        LaunchSpec::Build { context, .. } => format!("build {}", context.display()),
        LaunchSpec::Command { program, args, .. } => {
            let mut parts = vec![program.as_str()];
            parts.extend(args.iter().map(String::as_str));
            format!("command {}", parts.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{sample_stack, DependencyGraph};

    #[test]
    fn test_plan_redacts_generated_password() {
        let stack = sample_stack().unwrap();
        let graph = DependencyGraph::build(stack.services.iter().cloned()).unwrap();
        let resolver = EnvironmentResolver::for_stack(&stack);
        let redactor = SecretRedactor::new().unwrap();
        for secret in resolver.parameters().secret_values() {
            redactor.register_secret(secret);
        }
        let environments = resolver.resolve_all(&graph).unwrap();

        let planned = plan_service(
            graph.descriptor("phpapp").unwrap(),
            3,
            &environments["phpapp"],
            "127.0.0.1",
            &redactor,
        );
        assert_eq!(planned.environment["DB_PASSWORD"], "[REDACTED]");
        assert_eq!(planned.environment["DB_HOST"], "mysql");
        assert_eq!(planned.depends_on, vec!["localstack", "mysql"]);
        assert_eq!(planned.launch, "build ./phpapp");
    }

    #[test]
    fn test_describe_command_launch() {
        let launch = LaunchSpec::Command {
            program: "php".into(),
            args: vec!["-S".into(), "0.0.0.0:8080".into()],
            working_dir: None,
        };
        assert_eq!(describe_launch(&launch), "command php -S 0.0.0.0:8080");
    }
}
