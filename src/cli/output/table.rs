//! Table output formatting for CLI commands
//!
//! Run reports and diagnostic results rendered with comfy-table.

use std::env;

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

use crate::domain::models::{CheckStatus, DiagnosticReport, RunReport, ServiceState};
use crate::infrastructure::logging::SecretRedactor;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Empty table with a bold header row.
    pub fn table(&self, headers: &[&str]) -> Table {
        let mut table = Table::new();
        table
            .load_preset(if self.use_colors {
                presets::UTF8_FULL_CONDENSED
            } else {
                presets::ASCII_FULL_CONDENSED
            })
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(
                headers
                    .iter()
                    .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                    .collect::<Vec<_>>(),
            );
        table
    }

    /// One row per service, in report order.
    pub fn format_report(&self, report: &RunReport, redactor: &SecretRedactor) -> String {
        let mut table = self.table(&["Service", "State", "Attempts", "Ready At", "Error"]);
        for (name, outcome) in &report.services {
            let error = redactor.redact(&outcome.cause_chain().join(": "));
            table.add_row(vec![
                Cell::new(name),
                self.state_cell(outcome.state),
                Cell::new(outcome.probe_attempts),
                Cell::new(
                    outcome
                        .ready_at
                        .map(|t| t.format("%H:%M:%S%.3f").to_string())
                        .unwrap_or_default(),
                ),
                Cell::new(error),
            ]);
        }
        table.to_string()
    }

    /// One table per section.
    pub fn format_diagnostics(&self, report: &DiagnosticReport) -> String {
        let mut table = self.table(&["Section", "Status", "Message"]);
        for (section, entries) in report.sections() {
            for entry in entries {
                let status = if self.use_colors {
                    Cell::new(entry.status.as_str()).fg(check_color(entry.status))
                } else {
                    Cell::new(entry.status.as_str())
                };
                table.add_row(vec![Cell::new(section), status, Cell::new(&entry.message)]);
            }
        }
        table.to_string()
    }

    fn state_cell(&self, state: ServiceState) -> Cell {
        if self.use_colors {
            Cell::new(state).fg(state_color(state))
        } else {
            Cell::new(state)
        }
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn state_color(state: ServiceState) -> Color {
    match state {
        ServiceState::Ready => Color::Green,
        ServiceState::Failed => Color::Red,
        ServiceState::Stopped => Color::DarkGrey,
        ServiceState::Pending | ServiceState::WaitingForDependencies | ServiceState::Starting => {
            Color::Yellow
        }
    }
}

const fn check_color(status: CheckStatus) -> Color {
    match status {
        CheckStatus::Success => Color::Green,
        CheckStatus::Info => Color::Cyan,
        CheckStatus::Warning => Color::Yellow,
        CheckStatus::Error => Color::Red,
    }
}

/// Honors `NO_COLOR` and non-terminal stdout.
fn supports_color() -> bool {
    env::var_os("NO_COLOR").is_none() && console::Term::stdout().features().colors_supported()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::OrchestrationError;
    use crate::domain::models::ServiceOutcome;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    #[test]
    fn test_report_table_redacts_errors() {
        let redactor = SecretRedactor::new().unwrap();
        redactor.register_secret("Pw0rd123");
        let mut failed = ServiceOutcome::pending();
        failed.state = ServiceState::Failed;
        failed.error = Some(OrchestrationError::Launch {
            service: "mysql".into(),
            reason: "rejected Pw0rd123".into(),
        });

        let report = RunReport {
            run_id: Uuid::new_v4(),
            stack: "apphost".into(),
            services: BTreeMap::from([("mysql".to_string(), failed)]),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            cancelled: false,
        };
        let rendered = TableFormatter::with_colors(false).format_report(&report, &redactor);
        assert!(rendered.contains("mysql"));
        assert!(rendered.contains("failed"));
        assert!(!rendered.contains("Pw0rd123"));
    }
}
