// ABOUTME: Per-connection gateway session data and the externally visible connection state
// ABOUTME: Owned by GatewayConnection; resume data survives reconnects until invalidated

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Identifying,
    Connected,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Identifying => "identifying",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewaySession {
    /// Last `s` seen on any frame.
    pub sequence: Option<u64>,
    pub heartbeat_interval: Option<Duration>,
    /// Set on READY.
    pub session_id: Option<String>,
    pub resume_gateway_url: Option<String>,
}

impl GatewaySession {
    /// Both halves of the resume data are present.
    pub fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.resume_gateway_url.is_some()
    }

    pub fn observe_sequence(&mut self, s: Option<u64>) {
        if let Some(s) = s {
            self.sequence = Some(s);
        }
    }

    /// Forget everything needed to resume; the next connection identifies fresh.
    pub fn invalidate(&mut self) {
        self.session_id = None;
        self.resume_gateway_url = None;
        self.sequence = None;
    }
}
