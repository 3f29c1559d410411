//! Docker CLI launcher.
//!
//! Shells out to a docker-compatible binary. All stack containers join one
//! network and are reachable from each other under their service name.

use std::collections::BTreeMap;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::models::{LaunchSpec, RuntimeConfig, ServiceDescriptor};
use crate::domain::ports::{HandleKind, LaunchFailure, Launcher, ServiceHandle};

const LABEL_STACK: &str = "devhost.stack";
const LABEL_SERVICE: &str = "devhost.service";

pub struct DockerLauncher {
    binary: String,
    stack: String,
    network: String,
    network_ready: Mutex<bool>,
}

impl DockerLauncher {
    pub fn new(stack: impl Into<String>, config: &RuntimeConfig) -> Self {
        let stack = stack.into();
        let network = config
            .network
            .clone()
            .unwrap_or_else(|| format!("devhost-{stack}"));
        Self {
            binary: config.docker_binary.clone(),
            stack,
            network,
            network_ready: Mutex::new(false),
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    fn container_name(&self, service: &str) -> String {
        format!("{}-{service}", self.stack)
    }

    /// Run the CLI and return trimmed stdout.
    async fn docker(&self, args: &[String]) -> Result<String, LaunchFailure> {
        // Arguments carry `-e KEY=value` pairs; only the verb is logged.
        let verb = args.first().map_or("", String::as_str);
        debug!(binary = %self.binary, verb, "running container runtime command");
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(LaunchFailure::Runtime(format!("{} {verb}: {stderr}", self.binary)))
        }
    }

    async fn ensure_network(&self) -> Result<(), LaunchFailure> {
        let mut ready = self.network_ready.lock().await;
        if *ready {
            return Ok(());
        }
        if self
            .docker(&strings(&["network", "inspect", &self.network]))
            .await
            .is_err()
        {
            info!(network = %self.network, "creating stack network");
            self.docker(&strings(&[
                "network",
                "create",
                "--label",
                &format!("{LABEL_STACK}={}", self.stack),
                &self.network,
            ]))
            .await?;
        }
        *ready = true;
        Ok(())
    }

    async fn container_running(&self, id: &str) -> Result<bool, LaunchFailure> {
        match self
            .docker(&strings(&["inspect", "-f", "{{.State.Running}}", id]))
            .await
        {
            Ok(out) => Ok(out == "true"),
            // No such container.
            Err(LaunchFailure::Runtime(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn image_for(&self, descriptor: &ServiceDescriptor) -> Result<String, LaunchFailure> {
        match &descriptor.launch {
            LaunchSpec::Image { image } => Ok(image.clone()),
            LaunchSpec::Build {
                context,
                dockerfile,
            } => {
                let tag = format!("devhost/{}", descriptor.name);
                let context = context.to_string_lossy().to_string();
                let mut args = strings(&["build", "-t", &tag]);
                if let Some(file) = dockerfile {
                    args.push("-f".to_string());
                    args.push(format!("{}/{file}", context.trim_end_matches('/')));
                }
                args.push(context);
                info!(service = %descriptor.name, %tag, "building image");
                self.docker(&args).await?;
                Ok(tag)
            }
            LaunchSpec::Command { .. } => Err(LaunchFailure::Unsupported {
                launcher: "docker",
                kind: "command",
            }),
        }
    }

    async fn published_ports(
        &self,
        id: &str,
        descriptor: &ServiceDescriptor,
    ) -> Result<BTreeMap<u16, u16>, LaunchFailure> {
        let mut ports = BTreeMap::new();
        for endpoint in &descriptor.endpoints {
            let out = self
                .docker(&strings(&["port", id, &endpoint.target_port.to_string()]))
                .await?;
            if let Some(host_port) = parse_port_output(&out) {
                ports.insert(endpoint.target_port, host_port);
            }
        }
        Ok(ports)
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| (*s).to_string()).collect()
}

/// `docker run` arguments for a descriptor, minus the image.
pub(crate) fn run_args(
    name: &str,
    network: &str,
    stack: &str,
    descriptor: &ServiceDescriptor,
    environment: &BTreeMap<String, String>,
) -> Vec<String> {
    let mut args = strings(&[
        "run",
        "-d",
        "--name",
        name,
        "--network",
        network,
        "--network-alias",
        &descriptor.name,
        "--label",
        &format!("{LABEL_STACK}={stack}"),
        "--label",
        &format!("{LABEL_SERVICE}={}", descriptor.name),
    ]);
    for (key, value) in environment {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }
    for endpoint in &descriptor.endpoints {
        args.push("-p".to_string());
        args.push(match endpoint.host_port {
            Some(host) => format!("{host}:{}", endpoint.target_port),
            None => endpoint.target_port.to_string(),
        });
    }
    for volume in &descriptor.volumes {
        args.push("-v".to_string());
        args.push(format!("{}:{}", volume.name, volume.target));
    }
    args
}

/// First host port in `docker port` output such as `0.0.0.0:49153`.
pub(crate) fn parse_port_output(output: &str) -> Option<u16> {
    output
        .lines()
        .filter_map(|line| line.rsplit_once(':'))
        .find_map(|(_, port)| port.trim().parse().ok())
}

#[async_trait]
impl Launcher for DockerLauncher {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn start(
        &self,
        descriptor: &ServiceDescriptor,
        environment: &BTreeMap<String, String>,
    ) -> Result<ServiceHandle, LaunchFailure> {
        self.ensure_network().await?;
        let name = self.container_name(&descriptor.name);
        let persistent = descriptor.lifetime.is_persistent();

        if persistent && self.container_running(&name).await? {
            info!(service = %descriptor.name, container = %name, "reusing persistent container");
            let mut handle = ServiceHandle::new(&descriptor.name, &name, HandleKind::Container);
            handle.reused = true;
            handle.persistent = true;
            handle.published_ports = self.published_ports(&name, descriptor).await?;
            return Ok(handle);
        }

        // Stale container from an earlier run, running or not.
        if let Err(e) = self.docker(&strings(&["rm", "-f", &name])).await {
            debug!(container = %name, error = %e, "no stale container to remove");
        }

        let image = self.image_for(descriptor).await?;
        let mut args = run_args(&name, &self.network, &self.stack, descriptor, environment);
        args.push(image);

        let id = self.docker(&args).await?;
        info!(service = %descriptor.name, container = %name, id = %id, "container started");

        let mut handle = ServiceHandle::new(&descriptor.name, id, HandleKind::Container);
        handle.persistent = persistent;
        handle.published_ports = self.published_ports(&handle.id, descriptor).await?;
        Ok(handle)
    }

    async fn stop(&self, handle: &ServiceHandle) -> Result<(), LaunchFailure> {
        if handle.kind != HandleKind::Container {
            return Err(LaunchFailure::UnknownHandle(handle.id.clone()));
        }
        if handle.persistent {
            info!(service = %handle.service, "leaving persistent container running");
            return Ok(());
        }
        match self.docker(&strings(&["rm", "-f", &handle.id])).await {
            Ok(_) => {
                info!(service = %handle.service, "container removed");
                Ok(())
            }
            Err(e) => {
                warn!(service = %handle.service, error = %e, "failed to remove container");
                Err(e)
            }
        }
    }

    async fn is_running(&self, handle: &ServiceHandle) -> Result<bool, LaunchFailure> {
        self.container_running(&handle.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Endpoint, VolumeMount};

    #[test]
    fn test_parse_port_output() {
        assert_eq!(parse_port_output("0.0.0.0:49153\n[::]:49153"), Some(49153));
        assert_eq!(parse_port_output("[::]:8080"), Some(8080));
        assert_eq!(parse_port_output(""), None);
    }

    #[test]
    fn test_run_args_include_network_env_ports_and_volumes() {
        let mut svc = ServiceDescriptor::image("mysql", "mysql:8");
        svc.endpoints.push(Endpoint::tcp("tcp", 3306, None));
        svc.endpoints.push(Endpoint::http("admin", 80, Some(8081)));
        svc.volumes.push(VolumeMount {
            name: "mysql-data".into(),
            target: "/var/lib/mysql".into(),
        });
        let env = BTreeMap::from([("MYSQL_DATABASE".to_string(), "mysqldb".to_string())]);

        let args = run_args("app-mysql", "devhost-app", "app", &svc, &env);
        let joined = args.join(" ");
        assert!(joined
            .starts_with("run -d --name app-mysql --network devhost-app --network-alias mysql"));
        assert!(joined.contains("-e MYSQL_DATABASE=mysqldb"));
        assert!(joined.contains("-p 3306"));
        assert!(joined.contains("-p 8081:80"));
        assert!(joined.contains("-v mysql-data:/var/lib/mysql"));
        assert!(joined.contains("--label devhost.service=mysql"));
    }

    #[test]
    fn test_network_defaults_to_stack_name() {
        let launcher = DockerLauncher::new("apphost", &RuntimeConfig::default());
        assert_eq!(launcher.network(), "devhost-apphost");
        assert_eq!(launcher.container_name("mysql"), "apphost-mysql");
    }

    #[tokio::test]
    async fn test_command_spec_is_unsupported() {
        let launcher = DockerLauncher::new("apphost", &RuntimeConfig::default());
        let svc = ServiceDescriptor::new(
            "worker",
            LaunchSpec::Command {
                program: "sleep".into(),
                args: vec!["1".into()],
                working_dir: None,
            },
        );
        assert!(matches!(
            launcher.image_for(&svc).await,
            Err(LaunchFailure::Unsupported { kind: "command", .. })
        ));
    }
}
