//! Implementation of the `devhost init` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tokio::fs;

use crate::cli::output::{output, CommandOutput};
use crate::cli::CliContext;
use crate::domain::models::Config;
use crate::services::sample_stack;
use crate::services::stack_file::write_stack;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite existing files
    #[arg(long, short = 'F')]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub files_written: Vec<String>,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if !self.files_written.is_empty() {
            lines.push("\nWrote:".to_string());
            for file in &self.files_written {
                lines.push(format!("  - {file}"));
            }
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: InitArgs, ctx: &CliContext) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };

    let config_path = target_path.join(".devhost").join("config.yaml");
    let stack_path = target_path.join(&ctx.config.stack_file);

    if (config_path.exists() || stack_path.exists()) && !args.force {
        let output_data = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to overwrite.".to_string(),
            initialized_path: target_path,
            files_written: vec![],
        };
        output(&output_data, ctx.json);
        return Ok(());
    }

    fs::create_dir_all(target_path.join(".devhost/logs"))
        .await
        .context("Failed to create .devhost directory")?;

    let config_yaml =
        serde_yaml::to_string(&Config::default()).context("Failed to serialize default config")?;
    fs::write(&config_path, config_yaml)
        .await
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    let stack = sample_stack().context("Failed to build the sample stack")?;
    write_stack(&stack_path, &stack)?;

    let output_data = InitOutput {
        success: true,
        message: if args.force {
            "Project reinitialized successfully.".to_string()
        } else {
            "Project initialized successfully.".to_string()
        },
        files_written: vec![
            relative(&config_path, &target_path),
            relative(&stack_path, &target_path),
        ],
        initialized_path: target_path,
    };
    output(&output_data, ctx.json);
    Ok(())
}

fn relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::ConfigLoader;
    use crate::infrastructure::logging::SecretRedactor;
    use crate::services::stack_file::load_graph;
    use std::sync::Arc;

    fn context() -> CliContext {
        CliContext::new(
            Config::default(),
            None,
            true,
            Arc::new(SecretRedactor::new().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_init_writes_loadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let args = InitArgs {
            force: false,
            path: dir.path().to_path_buf(),
        };
        execute(args, &context()).await.unwrap();

        let config = ConfigLoader::load_from_file(dir.path().join(".devhost/config.yaml")).unwrap();
        assert_eq!(config.stack_file, "devhost.yaml");

        let (stack, graph) = load_graph(&dir.path().join("devhost.yaml")).unwrap();
        assert_eq!(stack.name, "apphost");
        assert!(graph.contains("phpapp"));
    }

    #[tokio::test]
    async fn test_init_keeps_existing_files_without_force() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("devhost.yaml"), "name: mine\n").unwrap();
        let args = InitArgs {
            force: false,
            path: dir.path().to_path_buf(),
        };
        execute(args, &context()).await.unwrap();

        let contents = std::fs::read_to_string(dir.path().join("devhost.yaml")).unwrap();
        assert_eq!(contents, "name: mine\n");
        assert!(!dir.path().join(".devhost/config.yaml").exists());
    }
}
