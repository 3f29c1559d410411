//! Service descriptor domain model.
//!
//! A service is one deployable unit of a local stack: a container started
//! from an image, a container built from a Dockerfile context, or a plain
//! local process. Descriptors are declared once and never mutated while a
//! run is in progress.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How a service is brought up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LaunchSpec {
    /// Run a pre-built image.
    Image { image: String },
    /// Build an image from a context directory, then run it.
    Build {
        context: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dockerfile: Option<String>,
    },
    /// Spawn a local process.
    Command {
        program: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_dir: Option<PathBuf>,
    },
}

impl LaunchSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Image { .. } => "image",
            Self::Build { .. } => "build",
            Self::Command { .. } => "command",
        }
    }

    /// Whether the launch needs a container runtime.
    pub fn is_container(&self) -> bool {
        !matches!(self, Self::Command { .. })
    }
}

/// Reference to another service's endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRef {
    pub service: String,
    pub endpoint: String,
}

/// Value assigned to an environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    /// Plain string value.
    Literal(String),
    /// Value of a stack parameter, e.g. a generated password.
    Parameter { parameter: String },
    /// URL of another service's endpoint as seen from inside the stack network.
    Endpoint { endpoint: EndpointRef },
}

impl EnvValue {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    pub fn parameter(name: impl Into<String>) -> Self {
        Self::Parameter {
            parameter: name.into(),
        }
    }

    pub fn endpoint(service: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::Endpoint {
            endpoint: EndpointRef {
                service: service.into(),
                endpoint: endpoint.into(),
            },
        }
    }
}

impl From<&str> for EnvValue {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl From<String> for EnvValue {
    fn from(value: String) -> Self {
        Self::Literal(value)
    }
}

/// A network endpoint exposed by a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    /// Port the service listens on inside its container or process.
    pub target_port: u16,
    /// Port published on the host. `None` lets the runtime pick one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

fn default_scheme() -> String {
    "http".to_string()
}

impl Endpoint {
    pub fn http(name: impl Into<String>, target_port: u16, host_port: Option<u16>) -> Self {
        Self {
            name: name.into(),
            target_port,
            host_port,
            scheme: default_scheme(),
        }
    }

    pub fn tcp(name: impl Into<String>, target_port: u16, host_port: Option<u16>) -> Self {
        Self {
            name: name.into(),
            target_port,
            host_port,
            scheme: "tcp".to_string(),
        }
    }
}

/// Kind of health check used to decide readiness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Http,
    Tcp,
    #[default]
    None,
}

/// Health probe configuration.
///
/// Timing values are signed so that a malformed configuration survives
/// deserialization and is reported as a probe error by the readiness gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthProbe {
    #[serde(default)]
    pub kind: ProbeKind,

    /// Request path for HTTP probes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Target port to probe. Takes precedence over `endpoint`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Name of the endpoint to probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Delay between attempts.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: i64,

    /// Bound on a single attempt.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: i64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: i64,
}

const fn default_interval_ms() -> i64 {
    1000
}

const fn default_timeout_ms() -> i64 {
    2000
}

const fn default_max_attempts() -> i64 {
    30
}

impl HealthProbe {
    pub fn http(path: impl Into<String>) -> Self {
        Self {
            kind: ProbeKind::Http,
            path: Some(path.into()),
            ..Self::none()
        }
    }

    pub fn tcp(port: u16) -> Self {
        Self {
            kind: ProbeKind::Tcp,
            port: Some(port),
            ..Self::none()
        }
    }

    pub fn none() -> Self {
        Self {
            kind: ProbeKind::None,
            path: None,
            port: None,
            endpoint: None,
            interval_ms: default_interval_ms(),
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
        }
    }

    #[must_use]
    pub fn on_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn with_timing(mut self, interval_ms: i64, timeout_ms: i64, max_attempts: i64) -> Self {
        self.interval_ms = interval_ms;
        self.timeout_ms = timeout_ms;
        self.max_attempts = max_attempts;
        self
    }
}

/// Whether a container outlives the run that created it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerLifetime {
    /// Removed when the run stops.
    #[default]
    Session,
    /// Kept across runs and reused when already running.
    Persistent,
}

impl ContainerLifetime {
    pub fn is_persistent(self) -> bool {
        self == Self::Persistent
    }
}

/// Named volume mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub name: String,
    pub target: String,
}

/// Immutable declaration of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,

    pub launch: LaunchSpec,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, EnvValue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<Endpoint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_probe: Option<HealthProbe>,

    /// Services that must be ready before this one starts.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<String>,

    /// Services whose connection details this one consumes.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub references: BTreeSet<String>,

    #[serde(default)]
    pub lifetime: ContainerLifetime,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeMount>,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, launch: LaunchSpec) -> Self {
        Self {
            name: name.into(),
            launch,
            environment: BTreeMap::new(),
            endpoints: Vec::new(),
            health_probe: None,
            depends_on: BTreeSet::new(),
            references: BTreeSet::new(),
            lifetime: ContainerLifetime::default(),
            volumes: Vec::new(),
        }
    }

    pub fn image(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self::new(name, LaunchSpec::Image { image: image.into() })
    }

    /// All services this one must wait for: wait-for and reference relations.
    pub fn dependencies(&self) -> BTreeSet<&str> {
        self.depends_on
            .iter()
            .chain(self.references.iter())
            .map(String::as_str)
            .collect()
    }

    /// Services named by endpoint references in the environment.
    pub fn endpoint_references(&self) -> impl Iterator<Item = &EndpointRef> {
        self.environment.values().filter_map(|value| match value {
            EnvValue::Endpoint { endpoint } => Some(endpoint),
            _ => None,
        })
    }

    pub fn endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.name == name)
    }

    /// Whether a readiness probe will actually be polled.
    pub fn has_active_probe(&self) -> bool {
        self.health_probe
            .as_ref()
            .is_some_and(|p| p.kind != ProbeKind::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependencies_merge_wait_for_and_references() {
        let mut svc = ServiceDescriptor::image("phpapp", "php:8");
        svc.depends_on.insert("localstack".into());
        svc.references.insert("mysql".into());
        svc.depends_on.insert("mysql".into());

        let deps: Vec<&str> = svc.dependencies().into_iter().collect();
        assert_eq!(deps, vec!["localstack", "mysql"]);
    }

    #[test]
    fn test_env_value_yaml_forms() {
        let yaml = r"
DB_HOST: mysql
DB_PASSWORD:
  parameter: mysql-password
AWS_ENDPOINT:
  endpoint:
    service: localstack
    endpoint: http
";
        let env: BTreeMap<String, EnvValue> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(env["DB_HOST"], EnvValue::literal("mysql"));
        assert_eq!(env["DB_PASSWORD"], EnvValue::parameter("mysql-password"));
        assert_eq!(env["AWS_ENDPOINT"], EnvValue::endpoint("localstack", "http"));
    }

    #[test]
    fn test_probe_defaults_apply() {
        let probe: HealthProbe = serde_yaml::from_str("kind: http\npath: /health\n").unwrap();
        assert_eq!(probe.kind, ProbeKind::Http);
        assert_eq!(probe.interval_ms, 1000);
        assert_eq!(probe.timeout_ms, 2000);
        assert_eq!(probe.max_attempts, 30);
    }

    #[test]
    fn test_launch_spec_tagging() {
        let spec: LaunchSpec =
            serde_yaml::from_str("kind: build\ncontext: ./phpapp\n").unwrap();
        assert_eq!(
            spec,
            LaunchSpec::Build {
                context: PathBuf::from("./phpapp"),
                dockerfile: None
            }
        );
        assert!(spec.is_container());
        assert_eq!(spec.kind(), "build");
    }

    #[test]
    fn test_none_probe_is_not_active() {
        let mut svc = ServiceDescriptor::image("a", "busybox");
        assert!(!svc.has_active_probe());
        svc.health_probe = Some(HealthProbe::none());
        assert!(!svc.has_active_probe());
        svc.health_probe = Some(HealthProbe::tcp(3306));
        assert!(svc.has_active_probe());
    }
}
