// ABOUTME: Discord channel: gateway session for inbound messages, REST for replies
// ABOUTME: MESSAGE_CREATE payloads are queued by the gateway and drained here in arrival order

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::client::{HttpClient, Method};
use crate::commands::has_wake_word;
use crate::event::{Event, EventType, ExtraValue, Response};
use crate::gateway::protocol::{reads_message_content, API_BASE, DEFAULT_INTENTS};
use crate::gateway::{
    ConnectionState, Connector, GatewayConfig, GatewayConnection, TungsteniteConnector,
};
use crate::hub::Hub;
use crate::traits::{Channel, ConvertEvent};
use crate::utils::chunk_message;

/// Maximum Discord message length (chars)
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Extra key holding the Discord channel id replies go to.
pub const CHANNEL_ID_KEY: &str = "discord_channel_id";

#[derive(Clone, Deserialize)]
pub struct DiscordSettings {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_intents")]
    pub intents: u64,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_intents() -> u64 {
    DEFAULT_INTENTS
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_api_base() -> String {
    API_BASE.to_string()
}

impl DiscordSettings {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            intents: default_intents(),
            retry_delay_secs: default_retry_delay_secs(),
            api_base: default_api_base(),
        }
    }

    fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            token: self.bot_token.clone(),
            intents: self.intents,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
        }
    }
}

// Custom Debug impl to redact bot_token
impl std::fmt::Debug for DiscordSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordSettings")
            .field("bot_token", &"[REDACTED]")
            .field("intents", &self.intents)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordAuthor {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

/// The fields of a MESSAGE_CREATE payload the channel reads.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordMessage {
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub content: String,
    pub author: DiscordAuthor,
}

pub struct DiscordChannel {
    name: String,
    wake_word: String,
    token: String,
    api_base: String,
    http: HttpClient,
    connection: Mutex<GatewayConnection>,
    queue: Mutex<mpsc::UnboundedReceiver<Value>>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl DiscordChannel {
    pub fn new(
        name: impl Into<String>,
        wake_word: impl Into<String>,
        settings: DiscordSettings,
        http: HttpClient,
    ) -> Self {
        let connector = Arc::new(TungsteniteConnector::new(
            http.clone(),
            settings.bot_token.clone(),
            settings.api_base.clone(),
        ));
        Self::with_connector(name, wake_word, settings, http, connector)
    }

    /// Build the channel over a custom gateway transport.
    pub fn with_connector(
        name: impl Into<String>,
        wake_word: impl Into<String>,
        settings: DiscordSettings,
        http: HttpClient,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let name = name.into();
        if !reads_message_content(settings.intents) {
            tracing::warn!(
                channel = %name,
                intents = settings.intents,
                "Discord intents lack MESSAGE_CONTENT; guild messages will arrive without text"
            );
        }

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let connection = GatewayConnection::new(
            connector,
            settings.gateway_config(),
            queue_tx,
            cancel.clone(),
        );
        let state = connection.subscribe();

        Self {
            name,
            wake_word: wake_word.into(),
            token: settings.bot_token,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            http,
            connection: Mutex::new(connection),
            queue: Mutex::new(queue_rx),
            state,
            cancel,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    fn should_dispatch(&self, message: &DiscordMessage) -> bool {
        !message.author.bot && has_wake_word(&message.content, &self.wake_word)
    }

    /// Drain queued MESSAGE_CREATE payloads in order.
    async fn consume(&self, hub: &Hub, queue: &mut mpsc::UnboundedReceiver<Value>) {
        while let Some(payload) = queue.recv().await {
            let message: DiscordMessage = match serde_json::from_value(payload) {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(channel = %self.name, error = %e, "Malformed MESSAGE_CREATE payload");
                    continue;
                }
            };

            if !self.should_dispatch(&message) {
                tracing::trace!(channel = %self.name, "Ignoring Discord message");
                continue;
            }

            let event = self.channel_event_to_igor_event(&message);
            hub.process_event(event).await;
        }
    }
}

impl ConvertEvent for DiscordChannel {
    type Raw = DiscordMessage;

    fn channel_event_to_igor_event(&self, raw: &DiscordMessage) -> Event {
        let mut event = Event::new(EventType::Message, raw.content.trim(), self.name.as_str())
            .with_extra(CHANNEL_ID_KEY, raw.channel_id.as_str())
            .with_extra("discord_author_id", raw.author.id.as_str())
            .with_extra("discord_author", raw.author.username.as_str());
        if let Some(guild_id) = &raw.guild_id {
            event = event.with_extra("discord_guild_id", guild_id.as_str());
        }
        event
    }
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start_listening(&self, hub: Arc<Hub>) -> Result<()> {
        let mut connection = self
            .connection
            .try_lock()
            .map_err(|_| anyhow::anyhow!("Discord channel {} is already listening", self.name))?;
        let mut queue = self.queue.lock().await;

        tokio::select! {
            result = connection.run() => {
                result.with_context(|| format!("Discord gateway for {} stopped", self.name))
            }
            _ = self.consume(&hub, &mut queue) => Ok(()),
        }
    }

    async fn stop_listening(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        self.cancel.cancel();
        if let Ok(connection) = self.connection.try_lock() {
            connection.mark_disconnected();
        }
        tracing::info!(channel = %self.name, "Discord channel stopped");
        Ok(())
    }

    async fn send_response(&self, event: &Event, response: &Response) -> Result<()> {
        let channel_id = event
            .extra(CHANNEL_ID_KEY)
            .and_then(ExtraValue::as_str)
            .ok_or_else(|| anyhow::anyhow!("Event has no Discord channel id"))?;

        let url = format!("{}/channels/{}/messages", self.api_base, channel_id);
        let auth = format!("Bot {}", self.token);

        for chunk in chunk_message(response.content(), MAX_MESSAGE_LENGTH) {
            let body = json!({ "content": chunk });
            self.http
                .request(
                    Method::POST,
                    &url,
                    Some(&body),
                    &[("Authorization", auth.as_str())],
                )
                .await
                .with_context(|| format!("Failed to post message to Discord channel {}", channel_id))?;
        }
        Ok(())
    }
}
