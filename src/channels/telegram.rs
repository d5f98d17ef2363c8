// ABOUTME: Telegram channel: long-polls getUpdates and replies with sendMessage
// ABOUTME: Text with the wake-word and slash commands become events; /start gets a fixed greeting

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{Me, UpdateKind};
use teloxide::{ApiError, RequestError};
use tokio_util::sync::CancellationToken;

use crate::commands::has_wake_word;
use crate::event::{Event, EventType, ExtraValue, Response};
use crate::hub::Hub;
use crate::traits::{Channel, ConvertEvent};
use crate::utils::chunk_message;

/// Maximum Telegram message length (chars)
pub const MAX_MESSAGE_LENGTH: usize = 4096;
pub const START_GREETING: &str = "I'm a bot, please talk to me!";

const POLL_TIMEOUT_SECS: u32 = 30;
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone, Deserialize)]
pub struct TelegramSettings {
    #[serde(default)]
    pub bot_token: String,
    /// Bot API server, e.g. a self-hosted `telegram-bot-api`. Defaults to api.telegram.org.
    #[serde(default)]
    pub api_url: Option<String>,
}

// Custom Debug impl to redact bot_token
impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("bot_token", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// What kind of payload a Telegram message carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelegramContent {
    Text(String),
    Photo { caption: Option<String> },
    Voice { caption: Option<String> },
    Other,
}

/// The parts of a Telegram message the channel cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramMessage {
    pub chat_id: i64,
    pub sender: Option<String>,
    pub content: TelegramContent,
}

impl From<&Message> for TelegramMessage {
    fn from(message: &Message) -> Self {
        let caption = message.caption().map(str::to_string);
        let content = if let Some(text) = message.text() {
            TelegramContent::Text(text.to_string())
        } else if message.photo().is_some() {
            TelegramContent::Photo { caption }
        } else if message.voice().is_some() {
            TelegramContent::Voice { caption }
        } else {
            TelegramContent::Other
        };

        Self {
            chat_id: message.chat.id.0,
            sender: message.from.as_ref().and_then(|u| u.username.clone()),
            content,
        }
    }
}

/// Split "/cmd@bot some args" into ("cmd", "some args").
fn parse_command(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('/')?;
    let (head, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let command = head.split('@').next().unwrap_or(head);
    Some((command, args.trim()))
}

/// What the channel does with one inbound message.
#[derive(Debug, PartialEq, Eq)]
enum Routing {
    Greet,
    Dispatch,
    Ignore,
}

pub struct TelegramChannel {
    name: String,
    wake_word: String,
    bot: Bot,
    retry_delay: Duration,
    cancel: CancellationToken,
}

impl TelegramChannel {
    pub fn new(name: impl Into<String>, wake_word: impl Into<String>, settings: TelegramSettings) -> Self {
        Self {
            name: name.into(),
            wake_word: wake_word.into(),
            bot: Bot::new(settings.bot_token),
            retry_delay: POLL_RETRY_DELAY,
            cancel: CancellationToken::new(),
        }
    }

    /// Talk to a different Bot API server.
    pub fn with_api_url(mut self, url: url::Url) -> Self {
        self.bot = self.bot.set_api_url(url);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Returns false if cancelled while waiting.
    async fn sleep_retry(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.retry_delay) => true,
        }
    }

    /// Call getMe until it succeeds. `None` means the channel was stopped first.
    ///
    /// Transport and server errors are retried; a rejected token is not.
    async fn authenticate(&self) -> Result<Option<Me>> {
        loop {
            let attempt = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(None),
                attempt = self.bot.get_me().send() => attempt,
            };

            match attempt {
                Ok(me) => return Ok(Some(me)),
                Err(RequestError::Api(ApiError::InvalidToken)) => {
                    anyhow::bail!("Telegram rejected the bot token for channel {}", self.name);
                }
                Err(e) => {
                    tracing::warn!(channel = %self.name, error = %e, "Telegram getMe failed, retrying");
                    if !self.sleep_retry().await {
                        return Ok(None);
                    }
                }
            }
        }
    }

    fn route(&self, raw: &TelegramMessage) -> Routing {
        match &raw.content {
            TelegramContent::Text(text) => match parse_command(text) {
                Some(("start", _)) => Routing::Greet,
                Some(_) => Routing::Dispatch,
                None if has_wake_word(text, &self.wake_word) => Routing::Dispatch,
                None => Routing::Ignore,
            },
            TelegramContent::Photo { caption: Some(caption) }
            | TelegramContent::Voice { caption: Some(caption) }
                if has_wake_word(caption, &self.wake_word) =>
            {
                Routing::Dispatch
            }
            _ => Routing::Ignore,
        }
    }

    async fn handle_incoming(&self, hub: &Hub, raw: TelegramMessage) {
        match self.route(&raw) {
            Routing::Greet => {
                if let Err(e) = self.bot.send_message(ChatId(raw.chat_id), START_GREETING).await {
                    tracing::warn!(channel = %self.name, chat_id = raw.chat_id, error = %e, "Failed to send greeting");
                }
            }
            Routing::Dispatch => {
                let event = self.channel_event_to_igor_event(&raw);
                hub.process_event(event).await;
            }
            Routing::Ignore => {
                tracing::trace!(channel = %self.name, chat_id = raw.chat_id, "Ignoring Telegram message");
            }
        }
    }
}

impl ConvertEvent for TelegramChannel {
    type Raw = TelegramMessage;

    fn channel_event_to_igor_event(&self, raw: &TelegramMessage) -> Event {
        let (event_type, content) = match &raw.content {
            TelegramContent::Text(text) => match parse_command(text) {
                Some((_, args)) => (EventType::Command, args.to_string()),
                None => (EventType::Message, text.clone()),
            },
            TelegramContent::Photo { caption } => {
                (EventType::Photo, caption.clone().unwrap_or_default())
            }
            TelegramContent::Voice { caption } => {
                (EventType::Voice, caption.clone().unwrap_or_default())
            }
            TelegramContent::Other => (EventType::OtherMessage, String::new()),
        };

        let mut event =
            Event::new(event_type, content, self.name.as_str()).with_extra("chat_id", raw.chat_id);
        if let Some(sender) = &raw.sender {
            event = event.with_extra("username", sender.as_str());
        }
        event
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start_listening(&self, hub: Arc<Hub>) -> Result<()> {
        let Some(me) = self.authenticate().await? else {
            return Ok(());
        };
        tracing::info!(channel = %self.name, bot_username = %me.username(), "Telegram bot authenticated");

        let mut offset: i32 = 0;
        loop {
            let polled = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                polled = self.bot.get_updates().offset(offset).timeout(POLL_TIMEOUT_SECS).send() => polled,
            };

            let updates = match polled {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!(channel = %self.name, error = %e, "Long polling error, retrying");
                    if !self.sleep_retry().await {
                        return Ok(());
                    }
                    continue;
                }
            };

            for update in &updates {
                offset = update.id.as_offset();

                let UpdateKind::Message(message) = &update.kind else {
                    continue;
                };
                self.handle_incoming(&hub, TelegramMessage::from(message)).await;
            }
        }
    }

    async fn stop_listening(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        self.cancel.cancel();
        tracing::info!(channel = %self.name, "Telegram channel stopped");
        Ok(())
    }

    async fn send_response(&self, event: &Event, response: &Response) -> Result<()> {
        let chat_id = event
            .extra("chat_id")
            .and_then(ExtraValue::as_i64)
            .ok_or_else(|| anyhow::anyhow!("Event has no Telegram chat_id"))?;

        for chunk in chunk_message(response.content(), MAX_MESSAGE_LENGTH) {
            self.bot
                .send_message(ChatId(chat_id), chunk)
                .await
                .context("Failed to send Telegram message")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> TelegramChannel {
        TelegramChannel::new(
            "telegram",
            "igor",
            TelegramSettings {
                bot_token: "123:abc".to_string(),
                api_url: None,
            },
        )
    }

    fn text(chat_id: i64, text: &str) -> TelegramMessage {
        TelegramMessage {
            chat_id,
            sender: Some("frank".to_string()),
            content: TelegramContent::Text(text.to_string()),
        }
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/start"), Some(("start", "")));
        assert_eq!(parse_command("/echo hello  world "), Some(("echo", "hello  world")));
        assert_eq!(parse_command("/fortune@igor_bot"), Some(("fortune", "")));
        assert_eq!(parse_command("igor echo"), None);
    }

    #[test]
    fn test_text_message_conversion() {
        let event = channel().channel_event_to_igor_event(&text(42, "igor echo hi"));
        assert_eq!(event.event_type(), EventType::Message);
        assert_eq!(event.content(), "igor echo hi");
        assert_eq!(event.channel(), "telegram");
        assert_eq!(event.extra("chat_id").and_then(ExtraValue::as_i64), Some(42));
        assert_eq!(event.extra("username").and_then(ExtraValue::as_str), Some("frank"));
    }

    #[test]
    fn test_command_conversion_keeps_arguments() {
        let event = channel().channel_event_to_igor_event(&text(7, "/echo hello there"));
        assert_eq!(event.event_type(), EventType::Command);
        assert_eq!(event.content(), "hello there");
    }

    #[test]
    fn test_media_conversion() {
        let ch = channel();
        let photo = TelegramMessage {
            chat_id: 1,
            sender: None,
            content: TelegramContent::Photo {
                caption: Some("igor look".to_string()),
            },
        };
        let event = ch.channel_event_to_igor_event(&photo);
        assert_eq!(event.event_type(), EventType::Photo);
        assert_eq!(event.content(), "igor look");
        assert!(event.extra("username").is_none());

        let voice = TelegramMessage {
            chat_id: 1,
            sender: None,
            content: TelegramContent::Voice { caption: None },
        };
        assert_eq!(ch.channel_event_to_igor_event(&voice).event_type(), EventType::Voice);

        let other = TelegramMessage {
            chat_id: 1,
            sender: None,
            content: TelegramContent::Other,
        };
        assert_eq!(
            ch.channel_event_to_igor_event(&other).event_type(),
            EventType::OtherMessage
        );
    }

    #[test]
    fn test_routing() {
        let ch = channel();
        assert_eq!(ch.route(&text(1, "/start")), Routing::Greet);
        assert_eq!(ch.route(&text(1, "/fortune")), Routing::Dispatch);
        assert_eq!(ch.route(&text(1, "Igor fortune")), Routing::Dispatch);
        assert_eq!(ch.route(&text(1, "hello everyone")), Routing::Ignore);

        let quiet_photo = TelegramMessage {
            chat_id: 1,
            sender: None,
            content: TelegramContent::Photo { caption: None },
        };
        assert_eq!(ch.route(&quiet_photo), Routing::Ignore);
    }

    #[test]
    fn test_settings_debug_redacts_token() {
        let settings = TelegramSettings {
            bot_token: "secret-token".to_string(),
            api_url: None,
        };
        let debug_str = format!("{:?}", settings);
        assert!(!debug_str.contains("secret-token"));
    }

    #[tokio::test]
    async fn test_stop_listening_twice() {
        let ch = channel();
        ch.stop_listening().await.unwrap();
        ch.stop_listening().await.unwrap();
        assert!(ch.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_send_response_requires_chat_id() {
        let ch = channel();
        let event = Event::new(EventType::Message, "igor echo hi", "telegram");
        let err = ch
            .send_response(&event, &Response::new("hi"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("chat_id"));
    }
}
