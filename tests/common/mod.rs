//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use integration_gateway::config::{finalize_config, AppConfig, RetryConfig};
use integration_gateway::lifecycle::Shutdown;
use integration_gateway::transport::HttpTransport;
use integration_gateway::HttpServer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Read the request head and return the request target (path and query).
async fn read_request_target(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    let head = String::from_utf8_lossy(&head);
    head.lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string()
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

/// Start a simple mock backend that returns a fixed response.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| async move { (200, response.to_string()) }).await
}

/// Start a programmable mock backend. The closure receives the request
/// target and returns status and body; it may sleep to simulate a stall.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let target = read_request_target(&mut socket).await;
                let (status, body) = f(target).await;
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    status_text(status),
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Default configuration with the three services pointed at local backends.
pub fn gateway_config(practice: SocketAddr, records: SocketAddr, scheduling: SocketAddr) -> AppConfig {
    let mut config = AppConfig::default();
    config.services = [
        ("practice-management-svc", practice),
        ("medical-records-svc", records),
        ("scheduling-svc", scheduling),
    ]
    .iter()
    .map(|(name, addr)| (name.to_string(), format!("http://{}", addr)))
    .collect::<HashMap<_, _>>();
    config.retries = RetryConfig {
        base_delay_ms: 5,
        max_delay_ms: 20,
    };
    config
}

/// Start the gateway on an ephemeral port.
pub async fn start_gateway(config: AppConfig, shutdown: &Shutdown) -> SocketAddr {
    let config = finalize_config(config).unwrap();
    let server = HttpServer::from_config(&config, Arc::new(HttpTransport::new())).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(server.run(listener, shutdown.signalled()));
    // Let the accept loop start.
    tokio::time::sleep(Duration::from_millis(50)).await;
    addr
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
