//! Spinner for `up`, driven by orchestrator events.

use std::collections::BTreeMap;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::domain::models::ServiceState;
use crate::services::RunEvent;

const SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {spinner:.green} {msg}";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Create a spinner for indeterminate operations
pub fn create_spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(SPINNER_CHARS),
    );
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Consume run events until the run finishes.
///
/// With `visible` unset the events are drained without drawing, so the
/// orchestrator never blocks on a full channel.
pub async fn track_run(mut events: mpsc::Receiver<RunEvent>, visible: bool) {
    let spinner = if visible {
        create_spinner("starting stack")
    } else {
        ProgressBar::hidden()
    };
    let mut states: BTreeMap<String, ServiceState> = BTreeMap::new();

    while let Some(event) = events.recv().await {
        match event {
            RunEvent::Started { services, .. } => {
                spinner.set_message(format!("starting {services} services"));
            }
            RunEvent::StateChanged { service, to, .. } => {
                if to == ServiceState::Ready {
                    spinner.println(format!("  {} {service}", style("ready").green()));
                }
                states.insert(service, to);
                spinner.set_message(summarize(&states));
            }
            RunEvent::ServiceFailed { service, error } => {
                spinner.println(format!("  {} {service}: {error}", style("failed").red()));
            }
            RunEvent::Finished {
                successful,
                cancelled,
            } => {
                let message = if cancelled {
                    style("run cancelled").yellow().to_string()
                } else if successful {
                    style("all services ready").green().to_string()
                } else {
                    style("stack did not come up").red().to_string()
                };
                spinner.finish_with_message(message);
                return;
            }
        }
    }
    spinner.finish_and_clear();
}

fn summarize(states: &BTreeMap<String, ServiceState>) -> String {
    let in_flight: Vec<&str> = states
        .iter()
        .filter(|(_, state)| state.is_in_flight())
        .map(|(name, _)| name.as_str())
        .collect();
    let ready = states.values().filter(|s| **s == ServiceState::Ready).count();
    if in_flight.is_empty() {
        format!("{ready} ready")
    } else {
        format!("{ready} ready, waiting on {}", in_flight.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_lists_in_flight_services() {
        let states = BTreeMap::from([
            ("mysql".to_string(), ServiceState::Ready),
            ("phpapp".to_string(), ServiceState::WaitingForDependencies),
            ("localstack".to_string(), ServiceState::Starting),
        ]);
        assert_eq!(summarize(&states), "1 ready, waiting on localstack, phpapp");
    }

    #[tokio::test]
    async fn test_track_run_stops_at_finish() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(RunEvent::Finished {
            successful: true,
            cancelled: false,
        })
        .await
        .unwrap();
        // Sender still alive: returning proves the loop ends on Finished.
        track_run(rx, false).await;
        drop(tx);
    }
}
