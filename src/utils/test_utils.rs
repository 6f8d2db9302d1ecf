use std::net::SocketAddr;

use memchr::memmem;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};

use crate::core::protocol::{BackendConfig, ProtocolKind};

/// Joins payloads into an event-stream body, one `data: ` frame each.
pub fn sse_body(payloads: &[&str]) -> String {
    payloads
        .iter()
        .map(|payload| format!("data: {payload}\n\n"))
        .collect()
}

pub fn openai_delta(text: &str) -> String {
    serde_json::json!({"choices": [{"delta": {"content": text}}]}).to_string()
}

pub fn test_backend(base_url: impl Into<String>, protocol: ProtocolKind) -> BackendConfig {
    BackendConfig {
        base_url: base_url.into(),
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
        protocol,
    }
}

/// An event-stream server that writes its frames and then never closes the
/// connection, for exercising cancellation and idle timeouts.
pub struct HeldOpenServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl HeldOpenServer {
    pub async fn start(frames: Vec<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("local addr should resolve");

        let task = tokio::spawn(async move {
            let mut connections = JoinSet::new();
            while let Ok((stream, _)) = listener.accept().await {
                connections.spawn(serve_held_open(stream, frames.clone()));
            }
        });

        Self { addr, task }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for HeldOpenServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_held_open(mut stream: TcpStream, frames: Vec<String>) {
    if read_request(&mut stream).await.is_err() {
        return;
    }
    let head = concat!(
        "HTTP/1.1 200 OK\r\n",
        "content-type: text/event-stream\r\n",
        "cache-control: no-cache\r\n",
        "connection: close\r\n\r\n",
    );
    if stream.write_all(head.as_bytes()).await.is_err() {
        return;
    }
    for frame in frames {
        let event = format!("data: {frame}\n\n");
        if stream.write_all(event.as_bytes()).await.is_err() {
            return;
        }
        let _ = stream.flush().await;
    }
    std::future::pending::<()>().await;
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut request = Vec::new();
    let mut chunk = [0_u8; 4096];

    let header_end = loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        request.extend_from_slice(&chunk[..read]);
        if let Some(pos) = memmem::find(&request, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&request[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while request.len() < header_end + content_length {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        request.extend_from_slice(&chunk[..read]);
    }
    Ok(request.split_off(header_end))
}
