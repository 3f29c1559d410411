//! Stack definition domain model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::service::ServiceDescriptor;

/// Declaration of a stack parameter.
///
/// A parameter either carries a fixed `value` or is generated once per run
/// (e.g. a database root password shared by the database and its clients).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default)]
    pub generate: bool,

    #[serde(default = "default_generated_length")]
    pub length: usize,

    /// Secret values are redacted in plans and logs.
    #[serde(default)]
    pub secret: bool,
}

const fn default_generated_length() -> usize {
    22
}

impl ParameterSpec {
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            length: default_generated_length(),
            ..Self::default()
        }
    }

    pub fn generated_secret() -> Self {
        Self {
            value: None,
            generate: true,
            length: default_generated_length(),
            secret: true,
        }
    }
}

/// A named set of services plus the parameters they share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParameterSpec>,

    #[serde(default)]
    pub services: Vec<ServiceDescriptor>,
}

impl StackDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
            services: Vec::new(),
        }
    }

    pub fn service(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Names of parameters whose values must never be printed.
    pub fn secret_parameters(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter(|(_, spec)| spec.secret)
            .map(|(name, _)| name.as_str())
    }
}
