//! Readiness gate against real HTTP and TCP endpoints.

use std::sync::Arc;
use std::time::Duration;

use devhost::adapters::probes::HttpProbeTransport;
use devhost::domain::models::TransportConfig;
use devhost::services::{ProbeTarget, ReadinessGate, ResolvedProbe};
use devhost::OrchestrationError;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn gate(allow_unsecured_transport: bool) -> ReadinessGate {
    let transport = HttpProbeTransport::new(&TransportConfig {
        allow_unsecured_transport,
    })
    .unwrap();
    ReadinessGate::new(Arc::new(transport), "127.0.0.1")
}

fn probe(target: ProbeTarget, max_attempts: u32) -> ResolvedProbe {
    ResolvedProbe {
        target,
        interval: Duration::from_millis(10),
        attempt_timeout: Duration::from_millis(500),
        max_attempts,
    }
}

fn deadline() -> Instant {
    Instant::now() + Duration::from_secs(5)
}

#[tokio::test]
async fn test_http_probe_ready_on_success() {
    let mut server = mockito::Server::new_async().await;
    let health = server
        .mock("GET", "/_localstack/health")
        .with_status(200)
        .with_body(r#"{"services":{"s3":"running"}}"#)
        .create_async()
        .await;

    let target = ProbeTarget::Http {
        url: format!("{}/_localstack/health", server.url()),
    };
    let readiness = gate(false)
        .await_probe("localstack", &probe(target, 5), deadline(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(readiness.attempts, 1);
    health.assert_async().await;
}

#[tokio::test]
async fn test_http_probe_redirect_is_not_followed() {
    let mut server = mockito::Server::new_async().await;
    let login = server
        .mock("GET", "/")
        .with_status(302)
        .with_header("location", "/index.php")
        .create_async()
        .await;
    let target_page = server.mock("GET", "/index.php").expect(0).create_async().await;

    let target = ProbeTarget::Http {
        url: format!("{}/", server.url()),
    };
    gate(false)
        .await_probe("phpmyadmin", &probe(target, 3), deadline(), &CancellationToken::new())
        .await
        .unwrap();

    login.assert_async().await;
    target_page.assert_async().await;
}

#[tokio::test]
async fn test_http_probe_times_out_on_server_errors() {
    let mut server = mockito::Server::new_async().await;
    let health = server
        .mock("GET", "/health")
        .with_status(503)
        .expect(4)
        .create_async()
        .await;

    let target = ProbeTarget::Http {
        url: format!("{}/health", server.url()),
    };
    let err = gate(false)
        .await_probe("app", &probe(target, 4), deadline(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestrationError::Timeout { attempts: 4, .. }));
    health.assert_async().await;
}

#[tokio::test]
async fn test_plain_http_to_remote_host_is_refused() {
    let target = ProbeTarget::Http {
        url: "http://db.internal.example:8080/health".to_string(),
    };
    let err = gate(false)
        .await_probe("remote", &probe(target, 10), deadline(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestrationError::Probe { .. }));
}

#[tokio::test]
async fn test_tcp_probe_against_listener() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });

    let target = ProbeTarget::Tcp {
        host: "127.0.0.1".to_string(),
        port,
    };
    let readiness = gate(false)
        .await_probe("mysql", &probe(target, 3), deadline(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(readiness.attempts, 1);
}

#[tokio::test]
async fn test_tcp_probe_on_closed_port_times_out() {
    // Bind then drop to get a port nothing listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let target = ProbeTarget::Tcp {
        host: "127.0.0.1".to_string(),
        port,
    };
    let err = gate(false)
        .await_probe("mysql", &probe(target, 3), deadline(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestrationError::Timeout { attempts: 3, .. }));
}
