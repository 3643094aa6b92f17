//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use rate_limit_guard::config::GuardConfig;

/// What the mock backend answers to one request.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub retry_after: Option<String>,
    pub delay: Duration,
}

impl MockReply {
    pub fn ok() -> Self {
        Self::status(200)
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            retry_after: None,
            delay: Duration::ZERO,
        }
    }

    pub fn with_retry_after(mut self, value: &str) -> Self {
        self.retry_after = Some(value.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A running mock backend.
pub struct MockBackend {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Requests fully received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a programmable backend on an ephemeral port.
///
/// `reply` gets the zero-based index of each request.
pub async fn start_backend<F>(reply: F) -> MockBackend
where
    F: Fn(usize) -> MockReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let reply = Arc::new(reply);

    let counter = hits.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let reply = reply.clone();
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        handle(socket, reply.as_ref(), &counter).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockBackend { addr, hits }
}

async fn handle<F>(mut socket: TcpStream, reply: &F, hits: &AtomicUsize)
where
    F: Fn(usize) -> MockReply,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let index = hits.fetch_add(1, Ordering::SeqCst);
    let reply = reply(index);
    tokio::time::sleep(reply.delay).await;

    let reason = match reply.status {
        200 => "OK",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    };
    let body = "ok";
    let mut response = format!("HTTP/1.1 {} {}\r\n", reply.status, reason);
    if let Some(value) = &reply.retry_after {
        response.push_str(&format!("Retry-After: {}\r\n", value));
    }
    response.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    ));

    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Small limits so tests reach thresholds quickly.
pub fn small_config(block: u32) -> GuardConfig {
    let mut config = GuardConfig::default();
    config.window.duration_ms = 500;
    config.window.max_requests = block * 2;
    config.window.warning_threshold = block - 1;
    config.window.block_threshold = block;
    config.circuit.cooldown_ms = 300;
    config.admission.inter_request_delay_ms = 10;
    config.client.request_timeout_secs = 10;
    config
}
