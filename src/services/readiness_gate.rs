//! Readiness gate.
//!
//! Polls a service's health probe with a fixed interval until it succeeds,
//! the attempt budget or the deadline is exhausted, or the run is cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::errors::{OrchestrationError, OrchestrationResult};
use crate::domain::models::{HealthProbe, ProbeKind, ServiceDescriptor};
use crate::domain::ports::{ProbeTransport, ServiceHandle, TransportError};

/// Where a probe attempt goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeTarget {
    Http { url: String },
    Tcp { host: String, port: u16 },
}

impl std::fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http { url } => write!(f, "GET {url}"),
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
        }
    }
}

/// A validated probe with a concrete target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProbe {
    pub target: ProbeTarget,
    pub interval: Duration,
    pub attempt_timeout: Duration,
    pub max_attempts: u32,
}

impl ResolvedProbe {
    /// Validate a descriptor's probe and pick its target.
    ///
    /// Returns `Ok(None)` when the service has no active probe.
    pub fn resolve(
        descriptor: &ServiceDescriptor,
        handle: Option<&ServiceHandle>,
        host: &str,
    ) -> OrchestrationResult<Option<Self>> {
        let Some(probe) = descriptor.health_probe.as_ref() else {
            return Ok(None);
        };
        if probe.kind == ProbeKind::None {
            return Ok(None);
        }

        let invalid = |reason: String| OrchestrationError::Probe {
            service: descriptor.name.clone(),
            reason,
        };

        let (interval, attempt_timeout, max_attempts) = validate_timing(probe).map_err(invalid)?;
        let (scheme, host_port) = select_port(descriptor, probe, handle).map_err(invalid)?;

        let target = match probe.kind {
            ProbeKind::Http => {
                let path = probe.path.as_deref().unwrap_or("/");
                if !path.starts_with('/') {
                    return Err(invalid(format!("path '{path}' must start with '/'")));
                }
                let scheme = if scheme == "https" { "https" } else { "http" };
                ProbeTarget::Http {
                    url: format!("{scheme}://{host}:{host_port}{path}"),
                }
            }
            ProbeKind::Tcp => ProbeTarget::Tcp {
                host: host.to_string(),
                port: host_port,
            },
            ProbeKind::None => return Ok(None),
        };

        Ok(Some(Self {
            target,
            interval,
            attempt_timeout,
            max_attempts,
        }))
    }
}

fn validate_timing(probe: &HealthProbe) -> Result<(Duration, Duration, u32), String> {
    let interval = u64::try_from(probe.interval_ms)
        .map_err(|_| format!("interval_ms must not be negative (got {})", probe.interval_ms))?;
    if probe.timeout_ms <= 0 {
        return Err(format!("timeout_ms must be positive (got {})", probe.timeout_ms));
    }
    let max_attempts = u32::try_from(probe.max_attempts)
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| format!("max_attempts must be at least 1 (got {})", probe.max_attempts))?;

    Ok((
        Duration::from_millis(interval),
        Duration::from_millis(probe.timeout_ms.unsigned_abs()),
        max_attempts,
    ))
}

/// Returns the endpoint scheme and the host-side port to probe.
fn select_port<'a>(
    descriptor: &'a ServiceDescriptor,
    probe: &HealthProbe,
    handle: Option<&ServiceHandle>,
) -> Result<(&'a str, u16), String> {
    let endpoint = if let Some(port) = probe.port {
        if port == 0 {
            return Err("port must not be 0".to_string());
        }
        descriptor.endpoints.iter().find(|e| e.target_port == port)
    } else if let Some(name) = probe.endpoint.as_deref() {
        Some(
            descriptor
                .endpoint(name)
                .ok_or_else(|| format!("unknown endpoint '{name}'"))?,
        )
    } else {
        let preferred = match probe.kind {
            ProbeKind::Http => descriptor
                .endpoints
                .iter()
                .find(|e| e.scheme == "http" || e.scheme == "https"),
            _ => None,
        };
        Some(
            preferred
                .or_else(|| descriptor.endpoints.first())
                .ok_or_else(|| "no port or endpoint to probe".to_string())?,
        )
    };

    let target_port = probe
        .port
        .or_else(|| endpoint.map(|e| e.target_port))
        .ok_or_else(|| "no port or endpoint to probe".to_string())?;
    let host_port = handle
        .and_then(|h| h.host_port_for(target_port))
        .or_else(|| endpoint.and_then(|e| e.host_port))
        .unwrap_or(target_port);
    let scheme = endpoint.map_or("http", |e| e.scheme.as_str());

    Ok((scheme, host_port))
}

/// Successful readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Polls health probes through a [`ProbeTransport`].
#[derive(Clone)]
pub struct ReadinessGate {
    transport: Arc<dyn ProbeTransport>,
    probe_host: String,
}

impl ReadinessGate {
    pub fn new(transport: Arc<dyn ProbeTransport>, probe_host: impl Into<String>) -> Self {
        Self {
            transport,
            probe_host: probe_host.into(),
        }
    }

    pub fn probe_host(&self) -> &str {
        &self.probe_host
    }

    /// Wait for a started service to become ready.
    ///
    /// A service without an active probe is ready as soon as it is started.
    pub async fn await_service(
        &self,
        descriptor: &ServiceDescriptor,
        handle: &ServiceHandle,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> OrchestrationResult<Readiness> {
        match ResolvedProbe::resolve(descriptor, Some(handle), &self.probe_host)? {
            Some(probe) => {
                self.await_probe(&descriptor.name, &probe, deadline, cancel)
                    .await
            }
            None => Ok(Readiness {
                attempts: 0,
                elapsed: Duration::ZERO,
            }),
        }
    }

    /// Poll a resolved probe until success, exhaustion, or cancellation.
    pub async fn await_probe(
        &self,
        service: &str,
        probe: &ResolvedProbe,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> OrchestrationResult<Readiness> {
        let started = Instant::now();
        let mut attempts = 0u32;

        while attempts < probe.max_attempts {
            if cancel.is_cancelled() {
                return Err(OrchestrationError::Cancelled(service.to_string()));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            attempts += 1;
            let attempt_timeout = probe.attempt_timeout.min(remaining);
            let outcome = tokio::select! {
                () = cancel.cancelled() => {
                    return Err(OrchestrationError::Cancelled(service.to_string()));
                }
                outcome = self.attempt(&probe.target, attempt_timeout) => outcome,
            };

            match outcome {
                Ok(()) => {
                    info!(service, attempts, target = %probe.target, "service is ready");
                    return Ok(Readiness {
                        attempts,
                        elapsed: started.elapsed(),
                    });
                }
                Err(err) if err.is_permanent() => {
                    warn!(service, error = %err, "probe can never succeed");
                    return Err(OrchestrationError::Probe {
                        service: service.to_string(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    debug!(
                        service,
                        attempt = attempts,
                        target = %probe.target,
                        error = %err,
                        "probe attempt failed"
                    );
                }
            }

            if attempts == probe.max_attempts {
                break;
            }

            let pause = probe
                .interval
                .min(deadline.saturating_duration_since(Instant::now()));
            tokio::select! {
                () = cancel.cancelled() => {
                    return Err(OrchestrationError::Cancelled(service.to_string()));
                }
                () = tokio::time::sleep(pause) => {}
            }
        }

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        warn!(service, attempts, elapsed_ms, "service did not become ready");
        Err(OrchestrationError::Timeout {
            service: service.to_string(),
            attempts,
            elapsed_ms,
        })
    }

    async fn attempt(&self, target: &ProbeTarget, timeout: Duration) -> Result<(), TransportError> {
        match target {
            ProbeTarget::Http { url } => {
                let status = self.transport.http_get(url, timeout).await?;
                if (200..=399).contains(&status) {
                    Ok(())
                } else {
                    Err(TransportError::Request(format!("status {status}")))
                }
            }
            ProbeTarget::Tcp { host, port } => {
                self.transport.tcp_connect(host, *port, timeout).await
            }
        }
    }
}
