//! Shared utilities for integration testing.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use request_trace::logging::{Logger, LoggerOptions, MemorySink};
use request_trace::{HttpServer, TraceConfig};

/// Headers (lowercased names) of every request a mock backend received.
pub type Recorded = Arc<Mutex<Vec<HashMap<String, String>>>>;

/// Start a mock backend that records request headers and returns `body`.
pub async fn start_recording_backend(body: &'static str) -> (SocketAddr, Recorded) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded: Recorded = Arc::default();
    let seen = recorded.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let seen = seen.clone();
                    tokio::spawn(async move {
                        let mut buf = Vec::new();
                        let mut chunk = [0u8; 1024];
                        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            match socket.read(&mut chunk).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                            }
                        }

                        let head = String::from_utf8_lossy(&buf).into_owned();
                        let headers = head
                            .lines()
                            .skip(1)
                            .filter_map(|line| line.split_once(':'))
                            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
                            .collect();
                        seen.lock().unwrap().push(headers);

                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, recorded)
}

/// Serve the trace service on an ephemeral port, logging into memory.
#[allow(dead_code)]
pub async fn start_service(config: TraceConfig) -> (SocketAddr, MemorySink) {
    let sink = MemorySink::new();
    let logger = Arc::new(Logger::new(
        "integration",
        LoggerOptions::default().sink(sink.clone()),
    ));
    let router = HttpServer::with_logger(config, logger).unwrap().router();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    (addr, sink)
}
