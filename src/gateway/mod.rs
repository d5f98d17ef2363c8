// ABOUTME: Discord gateway client: a resumable, heartbeated websocket session.
// ABOUTME: The state machine lives in connection.rs; transport.rs binds it to tokio-tungstenite.

pub mod connection;
pub mod protocol;
pub mod session;
pub mod transport;

use thiserror::Error;

use crate::client::RequestError;

pub use connection::{
    Connector, FrameSink, FrameSource, GatewayConfig, GatewayConnection, WireMessage,
};
pub use session::{ConnectionState, GatewaySession};
pub use transport::TungsteniteConnector;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway transport error: {0}")]
    Transport(String),

    #[error("gateway protocol error: {0}")]
    Protocol(String),

    /// The server closed with a code that retrying cannot fix (bad token,
    /// bad intents, ...).
    #[error("gateway closed with code {code} ({reason}); not reconnecting")]
    FatalClose { code: u16, reason: &'static str },

    #[error("gateway URL lookup failed: {0}")]
    Request(#[from] RequestError),

    #[error("gateway connection cancelled")]
    Cancelled,
}

impl From<tokio_tungstenite::tungstenite::Error> for GatewayError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        GatewayError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Protocol(e.to_string())
    }
}
