// ABOUTME: Discord gateway connection state machine: identify, heartbeat, resume and reconnect
// ABOUTME: Transport-agnostic; MESSAGE_CREATE payloads are pushed onto an unbounded queue

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use igor_core::metrics;

use super::protocol::{self, opcode, GatewayFrame};
use super::session::{ConnectionState, GatewaySession};
use super::GatewayError;

/// Frame as seen by the state machine: a text payload or a close with its code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    Text(String),
    Close(Option<u16>),
}

#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), GatewayError>;
    async fn close(&mut self) -> Result<(), GatewayError>;
}

#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` once the stream has ended. Must be cancel-safe.
    async fn next_frame(&mut self) -> Option<Result<WireMessage, GatewayError>>;
}

pub type FramePair = (Box<dyn FrameSink>, Box<dyn FrameSource>);

/// Opens gateway streams. The real implementation is `TungsteniteConnector`.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Gateway URL from `GET /gateway/bot`, without query parameters.
    async fn fetch_gateway_url(&self) -> Result<String, GatewayError>;

    async fn connect(&self, url: &str) -> Result<FramePair, GatewayError>;
}

#[derive(Clone)]
pub struct GatewayConfig {
    pub token: String,
    pub intents: u64,
    /// Wait between failed connection attempts.
    pub retry_delay: Duration,
}

impl GatewayConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            intents: protocol::DEFAULT_INTENTS,
            retry_delay: Duration::from_secs(5),
        }
    }
}

// Custom Debug impl to redact the bot token
impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("token", &"[REDACTED]")
            .field("intents", &self.intents)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

enum Handshake {
    Identify,
    Resume { session_id: String },
}

/// Why one connection cycle ended without an error.
enum CycleEnd {
    Cancelled,
    Reconnect,
    InvalidSession,
}

pub struct GatewayConnection {
    connector: Arc<dyn Connector>,
    config: GatewayConfig,
    session: GatewaySession,
    state: watch::Sender<ConnectionState>,
    dispatches: mpsc::UnboundedSender<Value>,
    cancel: CancellationToken,
    /// Whether the current cycle got as far as READY/RESUMED.
    reached_connected: bool,
}

impl GatewayConnection {
    pub fn new(
        connector: Arc<dyn Connector>,
        config: GatewayConfig,
        dispatches: mpsc::UnboundedSender<Value>,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            config,
            session: GatewaySession::default(),
            state,
            dispatches,
            cancel,
            reached_connected: false,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn session(&self) -> &GatewaySession {
        &self.session
    }

    /// Record that the connection is down after `run` was dropped mid-flight.
    pub fn mark_disconnected(&self) {
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            tracing::debug!(from = %current, to = %next, "Gateway state change");
            *current = next;
            true
        });
    }

    /// Connect and keep the session alive until cancelled.
    ///
    /// Returns `Ok` on cancellation and `Err` only for failures that retrying
    /// cannot fix. Everything else (dropped streams, protocol errors, missed
    /// heartbeat ACKs) leads to a resume or a fresh identify.
    pub async fn run(&mut self) -> Result<(), GatewayError> {
        let result = self.run_cycles().await;
        self.set_state(ConnectionState::Disconnected);
        result
    }

    async fn run_cycles(&mut self) -> Result<(), GatewayError> {
        while !self.cancel.is_cancelled() {
            let resuming = self.session.can_resume();
            self.reached_connected = false;

            let outcome = if resuming {
                self.resume_cycle().await
            } else {
                self.fresh_cycle().await
            };

            let mut wait = !self.reached_connected;
            match outcome {
                Ok(CycleEnd::Cancelled) | Err(GatewayError::Cancelled) => return Ok(()),
                Err(e @ GatewayError::FatalClose { .. }) => {
                    tracing::error!(error = %e, "Discord gateway rejected the connection");
                    return Err(e);
                }
                Ok(CycleEnd::Reconnect) => {
                    tracing::info!("Gateway connection ended, reconnecting");
                }
                Ok(CycleEnd::InvalidSession) => {
                    tracing::info!("Gateway session invalidated, identifying fresh");
                    self.session.invalidate();
                    wait = true;
                }
                Err(e) => {
                    tracing::warn!(error = %e, resuming, "Gateway connection failed");
                }
            }

            if resuming && !self.reached_connected && self.session.can_resume() {
                tracing::info!("Resume did not complete, falling back to a fresh identify");
                self.session.invalidate();
            }

            self.set_state(ConnectionState::Reconnecting);
            metrics::record_gateway_reconnect(if self.session.can_resume() {
                "resume"
            } else {
                "fresh"
            });

            if wait && !self.sleep_retry().await {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Returns false if cancelled while waiting.
    async fn sleep_retry(&self) -> bool {
        tracing::debug!(delay = ?self.config.retry_delay, "Waiting before next gateway attempt");
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.retry_delay) => true,
        }
    }

    async fn fresh_cycle(&mut self) -> Result<CycleEnd, GatewayError> {
        self.set_state(ConnectionState::Connecting);

        let url = tokio::select! {
            _ = self.cancel.cancelled() => return Err(GatewayError::Cancelled),
            url = self.connector.fetch_gateway_url() => url?,
        };
        let url = protocol::with_gateway_query(&url);

        tracing::info!(url = %url, "Connecting to Discord gateway");
        let (sink, source) = self.open(&url).await?;
        self.drive(sink, source, Handshake::Identify).await
    }

    async fn resume_cycle(&mut self) -> Result<CycleEnd, GatewayError> {
        let (Some(session_id), Some(resume_url)) = (
            self.session.session_id.clone(),
            self.session.resume_gateway_url.clone(),
        ) else {
            return self.fresh_cycle().await;
        };

        self.set_state(ConnectionState::Reconnecting);
        let url = protocol::with_gateway_query(&resume_url);

        tracing::info!(url = %url, "Resuming Discord gateway session");
        let (sink, source) = self.open(&url).await?;
        self.drive(sink, source, Handshake::Resume { session_id }).await
    }

    async fn open(&self, url: &str) -> Result<FramePair, GatewayError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(GatewayError::Cancelled),
            pair = self.connector.connect(url) => pair,
        }
    }

    async fn drive(
        &mut self,
        mut sink: Box<dyn FrameSink>,
        mut source: Box<dyn FrameSource>,
        handshake: Handshake,
    ) -> Result<CycleEnd, GatewayError> {
        let result = self
            .drive_stream(sink.as_mut(), source.as_mut(), handshake)
            .await;
        if let Err(e) = sink.close().await {
            tracing::debug!(error = %e, "Error closing gateway stream");
        }
        result
    }

    async fn drive_stream(
        &mut self,
        sink: &mut dyn FrameSink,
        source: &mut dyn FrameSource,
        handshake: Handshake,
    ) -> Result<CycleEnd, GatewayError> {
        // First frame must be HELLO
        let first = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(CycleEnd::Cancelled),
            next = source.next_frame() => next,
        };
        let hello = match first {
            Some(Ok(WireMessage::Text(text))) => GatewayFrame::parse(&text)?,
            Some(Ok(WireMessage::Close(code))) => return self.on_close(code),
            Some(Err(e)) => return Err(e),
            None => {
                return Err(GatewayError::Transport(
                    "stream ended before HELLO".to_string(),
                ))
            }
        };
        if hello.op != opcode::HELLO {
            return Err(GatewayError::Protocol(format!(
                "expected HELLO, got op {}",
                hello.op
            )));
        }
        let mut interval = hello.heartbeat_interval().ok_or_else(|| {
            GatewayError::Protocol("HELLO without heartbeat_interval".to_string())
        })?;
        self.session.heartbeat_interval = Some(interval);
        self.session.observe_sequence(hello.s);

        self.set_state(ConnectionState::Identifying);
        let greeting = match &handshake {
            Handshake::Identify => GatewayFrame::identify(&self.config.token, self.config.intents),
            Handshake::Resume { session_id } => {
                GatewayFrame::resume(&self.config.token, session_id, self.session.sequence)
            }
        };
        sink.send_text(greeting.to_text()?).await?;

        // First beat is jittered so many clients don't beat in lockstep
        let mut next_beat = Instant::now() + interval.mul_f64(rand::random::<f64>());
        let mut acked = true;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(CycleEnd::Cancelled),
                _ = sleep_until(next_beat) => {
                    if !acked {
                        tracing::warn!("No heartbeat ACK since last heartbeat, connection is zombied");
                        return Ok(CycleEnd::Reconnect);
                    }
                    self.send_heartbeat(sink).await?;
                    acked = false;
                    next_beat = Instant::now() + interval;
                }
                next = source.next_frame() => {
                    let frame = match next {
                        Some(Ok(WireMessage::Text(text))) => GatewayFrame::parse(&text)?,
                        Some(Ok(WireMessage::Close(code))) => return self.on_close(code),
                        Some(Err(e)) => return Err(e),
                        None => {
                            tracing::info!("Gateway stream ended");
                            return Ok(CycleEnd::Reconnect);
                        }
                    };
                    self.session.observe_sequence(frame.s);

                    match frame.op {
                        opcode::DISPATCH => self.on_dispatch(frame),
                        opcode::HEARTBEAT => {
                            if let Some(requested) = frame.heartbeat_interval() {
                                interval = requested;
                                self.session.heartbeat_interval = Some(requested);
                            }
                            self.send_heartbeat(sink).await?;
                        }
                        opcode::HEARTBEAT_ACK => {
                            tracing::trace!("Heartbeat ACK");
                            acked = true;
                        }
                        opcode::RECONNECT => {
                            tracing::info!("Gateway requested reconnect");
                            return Ok(CycleEnd::Reconnect);
                        }
                        opcode::INVALID_SESSION => {
                            tracing::warn!(resumable = ?frame.d.as_bool(), "Gateway reported invalid session");
                            return Ok(CycleEnd::InvalidSession);
                        }
                        other => {
                            tracing::debug!(op = other, "Ignoring gateway opcode");
                        }
                    }
                }
            }
        }
    }

    async fn send_heartbeat(&self, sink: &mut dyn FrameSink) -> Result<(), GatewayError> {
        let frame = GatewayFrame::heartbeat(self.session.sequence);
        tracing::trace!(seq = ?self.session.sequence, "Sending heartbeat");
        sink.send_text(frame.to_text()?).await
    }

    fn on_dispatch(&mut self, frame: GatewayFrame) {
        match frame.t.as_deref() {
            Some("READY") => {
                self.session.session_id = frame
                    .d
                    .get("session_id")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                self.session.resume_gateway_url = frame
                    .d
                    .get("resume_gateway_url")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                tracing::info!(
                    can_resume = self.session.can_resume(),
                    "Discord gateway session ready"
                );
                self.mark_connected();
            }
            Some("RESUMED") => {
                tracing::info!(seq = ?self.session.sequence, "Discord gateway session resumed");
                self.mark_connected();
            }
            Some("MESSAGE_CREATE") => {
                if self.dispatches.send(frame.d).is_err() {
                    tracing::warn!("Message queue closed, dropping MESSAGE_CREATE");
                }
            }
            Some(other) => tracing::trace!(event = other, "Ignoring dispatch"),
            None => tracing::debug!("Dispatch frame without event name"),
        }
    }

    fn mark_connected(&mut self) {
        self.reached_connected = true;
        self.set_state(ConnectionState::Connected);
    }

    fn on_close(&self, code: Option<u16>) -> Result<CycleEnd, GatewayError> {
        let Some(code) = code else {
            tracing::info!("Gateway closed without a code");
            return Ok(CycleEnd::Reconnect);
        };
        if let Some(reason) = protocol::fatal_close_reason(code) {
            return Err(GatewayError::FatalClose { code, reason });
        }
        if protocol::close_invalidates_session(code) {
            return Ok(CycleEnd::InvalidSession);
        }
        tracing::info!(code, "Gateway closed");
        Ok(CycleEnd::Reconnect)
    }
}
