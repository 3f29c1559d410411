//! Scripted probe transport for testing and dry runs.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ports::{ProbeTransport, TransportError};

#[derive(Debug, Clone)]
enum Script {
    Http(Vec<u16>),
    Tcp(Vec<bool>),
}

#[derive(Debug, Default)]
struct State {
    scripts: HashMap<String, Script>,
    attempts: HashMap<String, usize>,
}

/// Transport answering from per-target scripts.
///
/// Each attempt consumes the next scripted outcome; the last outcome repeats
/// once the script runs out. Unscripted targets fail to connect unless the
/// transport was built with [`ScriptedTransport::always_ready`].
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    state: Mutex<State>,
    ready_by_default: bool,
    latency: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every unscripted target answers immediately with success.
    pub fn always_ready() -> Self {
        Self {
            ready_by_default: true,
            ..Self::default()
        }
    }

    /// Delay applied to every attempt.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn script_http(&self, url: &str, statuses: Vec<u16>) {
        self.lock()
            .scripts
            .insert(format!("GET {url}"), Script::Http(statuses));
    }

    pub fn script_tcp(&self, host: &str, port: u16, outcomes: Vec<bool>) {
        self.lock()
            .scripts
            .insert(format!("tcp://{host}:{port}"), Script::Tcp(outcomes));
    }

    /// Attempts made against a target, keyed as `GET <url>` or `tcp://host:port`.
    pub fn attempts_for(&self, key: &str) -> usize {
        self.lock().attempts.get(key).copied().unwrap_or(0)
    }

    pub fn total_attempts(&self) -> usize {
        self.lock().attempts.values().sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Record an attempt and return the scripted outcome, if any.
    fn next(&self, key: &str) -> Option<Script> {
        let mut state = self.lock();
        let attempt = {
            let count = state.attempts.entry(key.to_string()).or_insert(0);
            *count += 1;
            *count - 1
        };
        state.scripts.get(key).map(|script| match script {
            Script::Http(statuses) => Script::Http(pick(statuses, attempt).into_iter().collect()),
            Script::Tcp(outcomes) => Script::Tcp(pick(outcomes, attempt).into_iter().collect()),
        })
    }
}

fn pick<T: Copy>(outcomes: &[T], attempt: usize) -> Option<T> {
    outcomes.get(attempt).or_else(|| outcomes.last()).copied()
}

#[async_trait]
impl ProbeTransport for ScriptedTransport {
    async fn http_get(&self, url: &str, _timeout: Duration) -> Result<u16, TransportError> {
        let outcome = self.next(&format!("GET {url}"));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match outcome {
            Some(Script::Http(statuses)) => statuses
                .first()
                .copied()
                .ok_or_else(|| TransportError::Connect("empty script".to_string())),
            _ if self.ready_by_default => Ok(200),
            _ => Err(TransportError::Connect(format!("{url}: connection refused"))),
        }
    }

    async fn tcp_connect(
        &self,
        host: &str,
        port: u16,
        _timeout: Duration,
    ) -> Result<(), TransportError> {
        let outcome = self.next(&format!("tcp://{host}:{port}"));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let connected = match outcome {
            Some(Script::Tcp(outcomes)) => outcomes.first().copied().unwrap_or(false),
            _ => self.ready_by_default,
        };
        if connected {
            Ok(())
        } else {
            Err(TransportError::Connect(format!("{host}:{port}: connection refused")))
        }
    }
}
