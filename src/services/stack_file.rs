//! YAML stack files.

use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::models::StackDefinition;
use crate::services::dependency_graph::DependencyGraph;

pub fn parse_stack(yaml: &str) -> Result<StackDefinition, serde_yaml::Error> {
    serde_yaml::from_str(yaml)
}

pub fn render_stack(stack: &StackDefinition) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(stack)
}

/// Read and parse a stack file.
pub fn load_stack(path: &Path) -> Result<StackDefinition> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read stack file {}", path.display()))?;
    parse_stack(&contents).with_context(|| format!("Failed to parse stack file {}", path.display()))
}

/// Read a stack file and build its validated dependency graph.
pub fn load_graph(path: &Path) -> Result<(StackDefinition, DependencyGraph)> {
    let stack = load_stack(path)?;
    let graph = DependencyGraph::build(stack.services.iter().cloned())
        .with_context(|| format!("Invalid stack {}", stack.name))?;
    Ok((stack, graph))
}

pub fn write_stack(path: &Path, stack: &StackDefinition) -> Result<()> {
    let yaml = render_stack(stack).context("Failed to serialize stack")?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(path, yaml).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{EnvValue, LaunchSpec, ProbeKind};

    const STACK: &str = r#"
name: demo
parameters:
  db-password:
    generate: true
    secret: true
services:
  - name: db
    launch:
      kind: image
      image: mysql:8.4
    environment:
      MYSQL_ROOT_PASSWORD:
        parameter: db-password
    endpoints:
      - name: tcp
        target_port: 3306
        scheme: tcp
    health_probe:
      kind: tcp
      port: 3306
    lifetime: persistent
  - name: web
    launch:
      kind: build
      context: ./web
    environment:
      DB_HOST: db
      DB_PORT: "3306"
      DB_URL:
        endpoint:
          service: db
          endpoint: tcp
    depends_on: [db]
"#;

    #[test]
    fn test_parse_stack() {
        let stack = parse_stack(STACK).unwrap();
        assert_eq!(stack.name, "demo");
        assert_eq!(stack.parameters["db-password"].length, 22);

        let db = stack.service("db").unwrap();
        assert_eq!(
            db.environment["MYSQL_ROOT_PASSWORD"],
            EnvValue::parameter("db-password")
        );
        let probe = db.health_probe.as_ref().unwrap();
        assert_eq!(probe.kind, ProbeKind::Tcp);
        assert_eq!(probe.interval_ms, 1000);
        assert_eq!(probe.max_attempts, 30);

        let web = stack.service("web").unwrap();
        assert!(matches!(web.launch, LaunchSpec::Build { .. }));
        assert_eq!(web.environment["DB_PORT"], EnvValue::literal("3306"));
        assert_eq!(web.environment["DB_URL"], EnvValue::endpoint("db", "tcp"));
    }

    #[test]
    fn test_render_then_parse_keeps_graph() {
        let stack = crate::services::stack_builder::sample_stack().unwrap();
        let reparsed = parse_stack(&render_stack(&stack).unwrap()).unwrap();
        assert_eq!(reparsed, stack);
    }

    #[test]
    fn test_load_graph_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devhost.yaml");
        std::fs::write(
            &path,
            "name: x\nservices:\n  - name: a\n    launch: {kind: image, image: i}\n    depends_on: [b]\n",
        )
        .unwrap();

        let err = load_graph(&path).unwrap_err();
        assert!(format!("{err:#}").contains("undeclared service 'b'"));
    }
}
