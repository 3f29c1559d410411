//! Environment resolution.
//!
//! Turns declared `EnvValue`s into concrete strings before anything starts.
//! Parameters are resolved once per run so every consumer of a generated
//! secret sees the same value.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::domain::errors::{OrchestrationError, OrchestrationResult};
use crate::domain::models::{EnvValue, ParameterSpec, ServiceDescriptor, StackDefinition};
use crate::services::dependency_graph::DependencyGraph;

/// Resolved parameter values for one run.
#[derive(Debug, Clone, Default)]
pub struct ParameterValues {
    values: BTreeMap<String, String>,
    secrets: BTreeSet<String>,
}

impl ParameterValues {
    /// Resolve parameter declarations. Parameters without a value that are
    /// not generated stay unresolved and fail only when referenced.
    pub fn resolve(parameters: &BTreeMap<String, ParameterSpec>) -> Self {
        let mut resolved = Self::default();
        for (name, spec) in parameters {
            let value = match (&spec.value, spec.generate) {
                (Some(value), _) => value.clone(),
                (None, true) => generate_secret(spec.length),
                (None, false) => continue,
            };
            if spec.secret {
                resolved.secrets.insert(value.clone());
            }
            resolved.values.insert(name.clone(), value);
        }
        resolved
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Concrete values of secret parameters, for redaction.
    pub fn secret_values(&self) -> impl Iterator<Item = &str> {
        self.secrets.iter().map(String::as_str)
    }
}

/// Random alphanumeric secret of the requested length.
fn generate_secret(length: usize) -> String {
    let mut secret = String::with_capacity(length);
    while secret.len() < length {
        secret.push_str(&Uuid::new_v4().simple().to_string());
    }
    secret.truncate(length);
    secret
}

/// Resolves every service environment of a stack.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentResolver {
    parameters: ParameterValues,
}

impl EnvironmentResolver {
    pub fn new(parameters: ParameterValues) -> Self {
        Self { parameters }
    }

    pub fn for_stack(stack: &StackDefinition) -> Self {
        Self::new(ParameterValues::resolve(&stack.parameters))
    }

    pub fn parameters(&self) -> &ParameterValues {
        &self.parameters
    }

    /// Resolve one service's environment.
    pub fn resolve(
        &self,
        descriptor: &ServiceDescriptor,
        graph: &DependencyGraph,
    ) -> OrchestrationResult<BTreeMap<String, String>> {
        descriptor
            .environment
            .iter()
            .map(|(key, value)| {
                self.resolve_value(&descriptor.name, key, value, graph)
                    .map(|resolved| (key.clone(), resolved))
            })
            .collect()
    }

    /// Resolve all environments, failing on the first unresolvable value.
    pub fn resolve_all(
        &self,
        graph: &DependencyGraph,
    ) -> OrchestrationResult<BTreeMap<String, BTreeMap<String, String>>> {
        graph
            .descriptors()
            .map(|d| self.resolve(d, graph).map(|env| (d.name.clone(), env)))
            .collect()
    }

    fn resolve_value(
        &self,
        service: &str,
        variable: &str,
        value: &EnvValue,
        graph: &DependencyGraph,
    ) -> OrchestrationResult<String> {
        let unresolved = |reason: String| OrchestrationError::UnresolvedReference {
            service: service.to_string(),
            variable: variable.to_string(),
            reason,
        };

        match value {
            EnvValue::Literal(value) => Ok(value.clone()),
            EnvValue::Parameter { parameter } => self
                .parameters
                .get(parameter)
                .map(str::to_string)
                .ok_or_else(|| unresolved(format!("parameter '{parameter}' has no value"))),
            EnvValue::Endpoint { endpoint } => {
                let target = graph
                    .descriptor(&endpoint.service)
                    .ok_or_else(|| unresolved(format!("unknown service '{}'", endpoint.service)))?;
                let declared = target.endpoint(&endpoint.endpoint).ok_or_else(|| {
                    unresolved(format!(
                        "service '{}' has no endpoint '{}'",
                        endpoint.service, endpoint.endpoint
                    ))
                })?;
                Ok(format!(
                    "{}://{}:{}",
                    declared.scheme, target.name, declared.target_port
                ))
            }
        }
    }
}
