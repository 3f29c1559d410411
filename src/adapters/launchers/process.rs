//! Local process launcher.

use std::collections::{BTreeMap, HashMap};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::models::{LaunchSpec, ServiceDescriptor};
use crate::domain::ports::{HandleKind, LaunchFailure, Launcher, ServiceHandle};

/// Spawns `command` services as child processes.
///
/// Stopping sends SIGTERM, waits up to the stop timeout, then kills.
pub struct ProcessLauncher {
    children: Mutex<HashMap<String, Child>>,
    stop_timeout: Duration,
}

impl ProcessLauncher {
    pub fn new(stop_timeout: Duration) -> Self {
        Self {
            children: Mutex::new(HashMap::new()),
            stop_timeout,
        }
    }

    fn terminate(pid: u32) -> Result<(), LaunchFailure> {
        let raw = i32::try_from(pid)
            .map_err(|_| LaunchFailure::Runtime(format!("pid {pid} out of range")))?;
        signal::kill(Pid::from_raw(raw), Signal::SIGTERM)
            .map_err(|e| LaunchFailure::Runtime(format!("SIGTERM to {pid} failed: {e}")))
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn start(
        &self,
        descriptor: &ServiceDescriptor,
        environment: &BTreeMap<String, String>,
    ) -> Result<ServiceHandle, LaunchFailure> {
        let LaunchSpec::Command {
            program,
            args,
            working_dir,
        } = &descriptor.launch
        else {
            return Err(LaunchFailure::Unsupported {
                launcher: "process",
                kind: descriptor.launch.kind(),
            });
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .envs(environment)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            command.current_dir(dir);
        }

        let child = command.spawn()?;
        let pid = child
            .id()
            .ok_or_else(|| LaunchFailure::Runtime(format!("{program} exited during spawn")))?;
        info!(service = %descriptor.name, pid, %program, "process started");

        let mut handle = ServiceHandle::new(&descriptor.name, pid.to_string(), HandleKind::Process);
        for endpoint in &descriptor.endpoints {
            handle.published_ports.insert(
                endpoint.target_port,
                endpoint.host_port.unwrap_or(endpoint.target_port),
            );
        }

        self.children
            .lock()
            .await
            .insert(descriptor.name.clone(), child);
        Ok(handle)
    }

    async fn stop(&self, handle: &ServiceHandle) -> Result<(), LaunchFailure> {
        let Some(mut child) = self.children.lock().await.remove(&handle.service) else {
            return Err(LaunchFailure::UnknownHandle(handle.id.clone()));
        };

        let Some(pid) = child.id() else {
            // Already reaped.
            return Ok(());
        };

        if let Err(e) = Self::terminate(pid) {
            warn!(service = %handle.service, error = %e, "failed to signal process");
        }

        match tokio::time::timeout(self.stop_timeout, child.wait()).await {
            Ok(Ok(status)) => {
                info!(service = %handle.service, %status, "process stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                warn!(service = %handle.service, "process did not exit in time, killing");
                child.kill().await?;
                Ok(())
            }
        }
    }

    async fn is_running(&self, handle: &ServiceHandle) -> Result<bool, LaunchFailure> {
        let mut children = self.children.lock().await;
        match children.get_mut(&handle.service) {
            Some(child) => Ok(child.try_wait()?.is_none()),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sleeper(name: &str, seconds: &str) -> ServiceDescriptor {
        ServiceDescriptor::new(
            name,
            LaunchSpec::Command {
                program: "sleep".into(),
                args: vec![seconds.into()],
                working_dir: None,
            },
        )
    }

    #[tokio::test]
    async fn test_start_and_stop_process() {
        let launcher = ProcessLauncher::new(Duration::from_secs(2));
        let handle = launcher
            .start(&sleeper("sleeper", "30"), &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(handle.kind, HandleKind::Process);
        assert!(launcher.is_running(&handle).await.unwrap());

        launcher.stop(&handle).await.unwrap();
        assert!(!launcher.is_running(&handle).await.unwrap());
    }

    #[tokio::test]
    async fn test_image_spec_is_unsupported() {
        let launcher = ProcessLauncher::new(Duration::from_secs(1));
        let err = launcher
            .start(&ServiceDescriptor::image("db", "mysql"), &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchFailure::Unsupported { kind: "image", .. }));
    }

    #[tokio::test]
    async fn test_stop_unknown_handle() {
        let launcher = ProcessLauncher::new(Duration::from_secs(1));
        let handle = ServiceHandle::new("ghost", "1", HandleKind::Process);
        assert!(matches!(
            launcher.stop(&handle).await,
            Err(LaunchFailure::UnknownHandle(_))
        ));
    }
}
