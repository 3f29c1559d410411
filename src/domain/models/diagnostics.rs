//! Diagnostic report domain model.
//!
//! Connectivity checks against an already running stack produce ordered
//! status entries grouped by section.

use serde::{Deserialize, Serialize};

/// Severity of a single diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Success,
    Info,
    Warning,
    Error,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckEntry {
    pub status: CheckStatus,
    pub message: String,
}

impl CheckEntry {
    pub fn new(status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(CheckStatus::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(CheckStatus::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(CheckStatus::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(CheckStatus::Error, message)
    }
}

/// Aggregated result of one diagnostic pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub database: Vec<CheckEntry>,
    pub object_storage: Vec<CheckEntry>,
    pub secret_store: Vec<CheckEntry>,
    pub system: Vec<CheckEntry>,
}

impl DiagnosticReport {
    /// Status code an HTTP front-end would answer with.
    ///
    /// Only a database failure is fatal; the other sections report inline.
    pub fn http_status(&self) -> u16 {
        if has_error(&self.database) {
            500
        } else {
            200
        }
    }

    pub fn has_errors(&self) -> bool {
        self.sections().iter().any(|(_, entries)| has_error(entries))
    }

    pub fn sections(&self) -> [(&'static str, &[CheckEntry]); 4] {
        [
            ("database", self.database.as_slice()),
            ("object_storage", self.object_storage.as_slice()),
            ("secret_store", self.secret_store.as_slice()),
            ("system", self.system.as_slice()),
        ]
    }
}

fn has_error(entries: &[CheckEntry]) -> bool {
    entries.iter().any(|e| e.status == CheckStatus::Error)
}
