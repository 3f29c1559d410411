//! reqwest / tokio backed probe transport.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Url;
use tokio::net::TcpStream;

use crate::domain::models::TransportConfig;
use crate::domain::ports::{ProbeTransport, TransportError};

/// Probe transport talking to real sockets.
///
/// Redirects are not followed: a 3xx answer already proves the service is up.
pub struct HttpProbeTransport {
    client: reqwest::Client,
    allow_unsecured_transport: bool,
}

impl HttpProbeTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .danger_accept_invalid_certs(config.allow_unsecured_transport)
            .build()?;

        Ok(Self {
            client,
            allow_unsecured_transport: config.allow_unsecured_transport,
        })
    }

    fn check_transport(&self, url: &Url) -> Result<(), TransportError> {
        if self.allow_unsecured_transport || url.scheme() != "http" {
            return Ok(());
        }
        let host = url.host_str().unwrap_or_default();
        if is_loopback(host) {
            Ok(())
        } else {
            Err(TransportError::InsecureTransport(host.to_string()))
        }
    }
}

pub(crate) fn is_loopback(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .is_ok_and(|ip| ip.is_loopback())
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl ProbeTransport for HttpProbeTransport {
    async fn http_get(&self, url: &str, timeout: Duration) -> Result<u16, TransportError> {
        let parsed = Url::parse(url)
            .map_err(|e| TransportError::Request(format!("invalid url {url}: {e}")))?;
        self.check_transport(&parsed)?;

        let response = self
            .client
            .get(parsed)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::TimedOut(millis(timeout))
                } else if e.is_connect() {
                    TransportError::Connect(e.to_string())
                } else {
                    TransportError::Request(e.to_string())
                }
            })?;

        Ok(response.status().as_u16())
    }

    async fn tcp_connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(TransportError::Connect(e.to_string())),
            Err(_) => Err(TransportError::TimedOut(millis(timeout))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_detection() {
        assert!(is_loopback("localhost"));
        assert!(is_loopback("127.0.0.1"));
        assert!(is_loopback("[::1]"));
        assert!(!is_loopback("localstack"));
        assert!(!is_loopback("10.0.0.5"));
    }

    #[tokio::test]
    async fn test_plain_http_to_remote_host_is_refused() {
        let transport = HttpProbeTransport::new(&TransportConfig::default()).unwrap();
        let err = transport
            .http_get("http://localstack:4566/_localstack/health", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::InsecureTransport("localstack".into()));
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_tcp_connect_to_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let transport = HttpProbeTransport::new(&TransportConfig::default()).unwrap();

        transport
            .tcp_connect("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap();

        drop(listener);
        assert!(transport
            .tcp_connect("127.0.0.1", port, Duration::from_secs(1))
            .await
            .is_err());
    }
}
