pub mod config;
pub mod diagnostics;
pub mod run;
pub mod service;
pub mod stack;

pub use config::{
    Config, DiagnosticsConfig, LoggingConfig, OrchestratorConfig, RuntimeConfig, TransportConfig,
};
pub use diagnostics::{CheckEntry, CheckStatus, DiagnosticReport};
pub use run::{RunReport, ServiceOutcome, ServiceState};
pub use service::{
    ContainerLifetime, Endpoint, EndpointRef, EnvValue, HealthProbe, LaunchSpec, ProbeKind,
    ServiceDescriptor, VolumeMount,
};
pub use stack::{ParameterSpec, StackDefinition};
