//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use edge_gateway::config::schema::{GatewayConfig, RouteConfig, ServiceConfig};
use edge_gateway::{HttpServer, Shutdown};

#[allow(dead_code)]
pub fn service(name: &str, base_url: &str) -> ServiceConfig {
    ServiceConfig {
        name: name.to_string(),
        base_url: base_url.to_string(),
        timeout_ms: 2_000,
        health_path: "/health".to_string(),
        weight: 1,
        replicas: vec![],
    }
}

#[allow(dead_code)]
pub fn route(prefix: &str, service: &str) -> RouteConfig {
    RouteConfig {
        prefix: prefix.to_string(),
        service: service.to_string(),
    }
}

/// Start a gateway on the given address and give it a moment to bind.
#[allow(dead_code)]
pub async fn start_gateway(config: GatewayConfig, addr: SocketAddr) -> Arc<Shutdown> {
    let shutdown = Arc::new(Shutdown::new());
    let server = HttpServer::new(config);
    let listener = TcpListener::bind(addr).await.unwrap();

    let task_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, task_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown
}

/// Start a simple mock backend that returns a fixed response.
#[allow(dead_code)]
pub async fn start_mock_backend(addr: SocketAddr, response: &'static str) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Start a programmable mock backend with async support.
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Start a backend that captures each raw request head for inspection.
#[allow(dead_code)]
pub async fn start_capturing_backend(addr: SocketAddr, captured: mpsc::UnboundedSender<String>) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let captured = captured.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 8192];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let _ = captured.send(String::from_utf8_lossy(&buf[..n]).to_string());

                        let body = "captured";
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Start a WebSocket backend that echoes every text frame back verbatim.
#[allow(dead_code)]
pub async fn start_echo_ws_backend(addr: SocketAddr) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    tokio::spawn(async move {
                        let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                            return;
                        };
                        while let Some(Ok(msg)) = ws.next().await {
                            if msg.is_text() {
                                if ws.send(msg).await.is_err() {
                                    break;
                                }
                            } else if msg.is_close() {
                                break;
                            }
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });
}
