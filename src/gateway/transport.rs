// ABOUTME: tokio-tungstenite websocket transport and REST gateway lookup for the Discord gateway
// ABOUTME: Maps websocket messages onto the WireMessage frames the state machine consumes

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::connection::{Connector, FramePair, FrameSink, FrameSource, WireMessage};
use super::GatewayError;
use crate::client::{HttpClient, Method};

type WebSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to the real Discord gateway.
#[derive(Clone)]
pub struct TungsteniteConnector {
    http: HttpClient,
    token: String,
    api_base: String,
}

impl TungsteniteConnector {
    pub fn new(http: HttpClient, token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            http,
            token: token.into(),
            api_base: api_base.into(),
        }
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn fetch_gateway_url(&self) -> Result<String, GatewayError> {
        let url = format!("{}/gateway/bot", self.api_base.trim_end_matches('/'));
        let auth = format!("Bot {}", self.token);
        let body = self
            .http
            .request(Method::GET, &url, None, &[("Authorization", auth.as_str())])
            .await?;

        body.get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Protocol("gateway/bot response has no url".to_string()))
    }

    async fn connect(&self, url: &str) -> Result<FramePair, GatewayError> {
        let (ws_stream, _) = connect_async(url).await?;
        let (write, read) = ws_stream.split();
        Ok((Box::new(WsSink(write)), Box::new(WsSource(read))))
    }
}

struct WsSink(SplitSink<WebSocket, Message>);

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), GatewayError> {
        self.0.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), GatewayError> {
        self.0.close().await?;
        Ok(())
    }
}

struct WsSource(SplitStream<WebSocket>);

#[async_trait]
impl FrameSource for WsSource {
    async fn next_frame(&mut self) -> Option<Result<WireMessage, GatewayError>> {
        loop {
            match self.0.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(WireMessage::Text(text.as_str().to_string()))),
                Ok(Message::Close(frame)) => {
                    return Some(Ok(WireMessage::Close(frame.map(|f| u16::from(f.code)))))
                }
                Ok(_) => {} // Ignore pings, pongs, binary
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
