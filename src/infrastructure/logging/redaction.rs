//! Secret redaction for logs and printed plans.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::{Arc, PoisonError, RwLock};

use regex::Regex;
use tracing_subscriber::fmt::MakeWriter;

const REDACTED: &str = "[REDACTED]";

/// Masks secret values in free text and environment maps.
///
/// Two sources of secrets: `KEY=value` / `key: value` pairs whose key looks
/// sensitive, and literal values registered at runtime (generated
/// parameters).
pub struct SecretRedactor {
    sensitive_key: Regex,
    assignment: Regex,
    values: RwLock<Vec<String>>,
}

impl SecretRedactor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            sensitive_key: Regex::new(r"(?i)(password|passwd|secret|token|api_?key|private_?key)")?,
            assignment: Regex::new(
                r#"(?i)\b([a-z0-9_.-]*(?:password|passwd|secret|token|api_?key|private_?key)[a-z0-9_.-]*)(["']?\s*[=:]\s*["']?)([^\s"',}]+)"#,
            )?,
            values: RwLock::new(Vec::new()),
        })
    }

    /// Redact `value` wherever it appears from now on.
    pub fn register_secret(&self, value: &str) {
        if value.is_empty() {
            return;
        }
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
            // Longest first so overlapping secrets are fully masked.
            values.sort_by_key(|v| std::cmp::Reverse(v.len()));
        }
    }

    pub fn is_sensitive_key(&self, key: &str) -> bool {
        self.sensitive_key.is_match(key)
    }

    pub fn redact(&self, text: &str) -> String {
        let mut redacted = self
            .assignment
            .replace_all(text, format!("${{1}}${{2}}{REDACTED}").as_str())
            .into_owned();
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        for value in values.iter() {
            if redacted.contains(value.as_str()) {
                redacted = redacted.replace(value.as_str(), REDACTED);
            }
        }
        redacted
    }

    /// Copy of `environment` with sensitive entries masked.
    pub fn redact_environment(
        &self,
        environment: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        environment
            .iter()
            .map(|(key, value)| {
                let shown = if self.is_sensitive_key(key) {
                    REDACTED.to_string()
                } else {
                    self.redact(value)
                };
                (key.clone(), shown)
            })
            .collect()
    }
}

/// `MakeWriter` that redacts every formatted event before handing it to `inner`.
#[derive(Clone)]
pub struct RedactingMakeWriter<M = fn() -> io::Stderr> {
    redactor: Arc<SecretRedactor>,
    inner: M,
}

impl RedactingMakeWriter {
    /// Redacting writer for stderr.
    pub fn stderr(redactor: Arc<SecretRedactor>) -> Self {
        Self::new(redactor, io::stderr)
    }
}

impl<M> RedactingMakeWriter<M> {
    pub fn new(redactor: Arc<SecretRedactor>, inner: M) -> Self {
        Self { redactor, inner }
    }
}

impl<'a, M> MakeWriter<'a> for RedactingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = RedactingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            redactor: self.redactor.clone(),
            inner: self.inner.make_writer(),
        }
    }
}

pub struct RedactingWriter<W> {
    redactor: Arc<SecretRedactor>,
    inner: W,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        self.inner
            .write_all(self.redactor.redact(&text).as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_sensitive_assignments() {
        let redactor = SecretRedactor::new().unwrap();
        assert_eq!(
            redactor.redact("MYSQL_ROOT_PASSWORD=hunter2 DB_HOST=mysql"),
            "MYSQL_ROOT_PASSWORD=[REDACTED] DB_HOST=mysql"
        );
        assert_eq!(
            redactor.redact(r#"{"api_key": "abc123"}"#),
            r#"{"api_key": "[REDACTED]"}"#
        );
    }

    #[test]
    fn test_redacts_registered_values() {
        let redactor = SecretRedactor::new().unwrap();
        redactor.register_secret("Zq8vN2pLk4");
        assert_eq!(
            redactor.redact("connecting with Zq8vN2pLk4 as root"),
            "connecting with [REDACTED] as root"
        );
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_redacting_writer_masks_structured_fields() {
        let redactor = Arc::new(SecretRedactor::new().unwrap());
        redactor.register_secret("s3cr3tGeneratedPw");
        let buffer = SharedBuffer::default();
        let sink = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(RedactingMakeWriter::new(redactor, move || sink.clone()))
            .finish();

        let args = vec![
            "run".to_string(),
            "-e".to_string(),
            "MYSQL_ROOT_PASSWORD=s3cr3tGeneratedPw".to_string(),
        ];
        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(?args, "running container runtime command");
        });

        let written = buffer.contents();
        assert!(written.contains("running container runtime command"));
        assert!(written.contains(REDACTED));
        assert!(!written.contains("s3cr3tGeneratedPw"));
    }

    #[test]
    fn test_redact_environment() {
        let redactor = SecretRedactor::new().unwrap();
        let env = BTreeMap::from([
            ("DB_PASSWORD".to_string(), "generated".to_string()),
            ("DB_HOST".to_string(), "mysql".to_string()),
        ]);
        let shown = redactor.redact_environment(&env);
        assert_eq!(shown["DB_PASSWORD"], "[REDACTED]");
        assert_eq!(shown["DB_HOST"], "mysql");
    }
}
