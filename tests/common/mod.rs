// ABOUTME: Shared test doubles: a stub HTTP server and a scripted Discord gateway transport
// ABOUTME: Lets channel, reactor and gateway tests run without network access
#![allow(dead_code)]

use async_trait::async_trait;
use igor::gateway::{Connector, FrameSink, FrameSource, GatewayError, WireMessage};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

// =============================================================================
// Stub HTTP server
// =============================================================================

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Answers every request with the same status and body, recording what it saw.
pub struct StubServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    pub async fn start(status: u16, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        let body = body.to_string();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let recorded = Arc::clone(&recorded);
                let body = body.clone();
                tokio::spawn(async move {
                    if let Some(request) = read_request(stream, status, &body).await {
                        recorded.lock().unwrap().push(request);
                    }
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(mut stream: TcpStream, status: u16, body: &str) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut request_body = buf[header_end..].to_vec();
    while request_body.len() < content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        request_body.extend_from_slice(&chunk[..n]);
    }

    let request = RecordedRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&request_body).to_string(),
    };

    let reason = if status < 400 { "OK" } else { "Error" };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;

    Some(request)
}

// =============================================================================
// Scripted gateway transport
// =============================================================================

pub const GATEWAY_URL: &str = "wss://gateway.example";
pub const RESUME_URL: &str = "wss://resume.example";

struct MockSink {
    sent: Arc<Mutex<Vec<Value>>>,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send_text(&mut self, text: String) -> Result<(), GatewayError> {
        let value: Value = serde_json::from_str(&text).unwrap();
        self.sent.lock().unwrap().push(value);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), GatewayError> {
        Ok(())
    }
}

struct MockSource {
    frames: mpsc::UnboundedReceiver<WireMessage>,
}

#[async_trait]
impl FrameSource for MockSource {
    async fn next_frame(&mut self) -> Option<Result<WireMessage, GatewayError>> {
        self.frames.recv().await.map(Ok)
    }
}

/// Test side of one scripted connection: push frames in, read what was sent.
pub struct Script {
    frames: mpsc::UnboundedSender<WireMessage>,
    sent: Arc<Mutex<Vec<Value>>>,
}

impl Script {
    pub fn push(&self, frame: WireMessage) {
        let _ = self.frames.send(frame);
    }

    pub fn push_all(&self, frames: impl IntoIterator<Item = WireMessage>) {
        for frame in frames {
            self.push(frame);
        }
    }

    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().unwrap().clone()
    }

    /// Sent frames other than heartbeats.
    pub fn sent_without_heartbeats(&self) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter(|frame| frame["op"] != 1)
            .collect()
    }
}

type Connection = (Box<dyn FrameSink>, Box<dyn FrameSource>);

pub struct MockConnector {
    fetches: AtomicUsize,
    failing_fetches: AtomicUsize,
    connected_urls: Mutex<Vec<String>>,
    pending: Mutex<VecDeque<Connection>>,
}

impl MockConnector {
    /// Connector that will hand out `count` scripted connections in order.
    pub fn scripted(count: usize) -> (Arc<Self>, Vec<Script>) {
        let mut pending: VecDeque<Connection> = VecDeque::new();
        let mut scripts = Vec::new();

        for _ in 0..count {
            let (tx, rx) = mpsc::unbounded_channel();
            let sent = Arc::new(Mutex::new(Vec::new()));
            pending.push_back((
                Box::new(MockSink {
                    sent: Arc::clone(&sent),
                }),
                Box::new(MockSource { frames: rx }),
            ));
            scripts.push(Script { frames: tx, sent });
        }

        let connector = Arc::new(Self {
            fetches: AtomicUsize::new(0),
            failing_fetches: AtomicUsize::new(0),
            connected_urls: Mutex::new(Vec::new()),
            pending: Mutex::new(pending),
        });
        (connector, scripts)
    }

    /// Make the next `n` gateway URL lookups fail.
    pub fn fail_fetches(&self, n: usize) {
        self.failing_fetches.store(n, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn connected_urls(&self) -> Vec<String> {
        self.connected_urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn fetch_gateway_url(&self) -> Result<String, GatewayError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_fetches.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_fetches.store(failing - 1, Ordering::SeqCst);
            return Err(GatewayError::Transport("gateway lookup refused".to_string()));
        }
        Ok(GATEWAY_URL.to_string())
    }

    async fn connect(&self, url: &str) -> Result<Connection, GatewayError> {
        self.connected_urls.lock().unwrap().push(url.to_string());
        self.pending
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| GatewayError::Transport("no more scripted connections".to_string()))
    }
}

// =============================================================================
// Gateway frames
// =============================================================================

fn text(value: Value) -> WireMessage {
    WireMessage::Text(value.to_string())
}

pub fn hello(interval_ms: u64) -> WireMessage {
    text(json!({"op": 10, "d": {"heartbeat_interval": interval_ms}}))
}

pub fn ready(seq: u64) -> WireMessage {
    text(json!({
        "op": 0,
        "t": "READY",
        "s": seq,
        "d": {"session_id": "sess-1", "resume_gateway_url": RESUME_URL}
    }))
}

pub fn resumed(seq: u64) -> WireMessage {
    text(json!({"op": 0, "t": "RESUMED", "s": seq, "d": null}))
}

pub fn message_create(seq: u64, content: &str, author_is_bot: bool) -> WireMessage {
    text(json!({
        "op": 0,
        "t": "MESSAGE_CREATE",
        "s": seq,
        "d": {
            "id": format!("m{}", seq),
            "channel_id": "555",
            "guild_id": "777",
            "content": content,
            "author": {"id": "42", "username": "frank", "bot": author_is_bot}
        }
    }))
}

pub fn ack() -> WireMessage {
    text(json!({"op": 11}))
}

pub fn heartbeat_request() -> WireMessage {
    text(json!({"op": 1, "d": null}))
}

pub fn reconnect() -> WireMessage {
    text(json!({"op": 7, "d": null}))
}

pub fn invalid_session() -> WireMessage {
    text(json!({"op": 9, "d": false}))
}

// =============================================================================
// Waiting
// =============================================================================

/// Poll `check` until it holds, failing the test after two seconds.
pub async fn wait_until(what: &str, check: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
