// ABOUTME: Normalized event and response types shared by channels, reactors and the hub.
// ABOUTME: Events carry per-channel routing data in a closed key -> tagged value map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of inbound platform input an event was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Message,
    Command,
    Photo,
    Voice,
    OtherMessage,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Message => "message",
            EventType::Command => "command",
            EventType::Photo => "photo",
            EventType::Voice => "voice",
            EventType::OtherMessage => "other_message",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value stored in an event's `extra` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl ExtraValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExtraValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ExtraValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ExtraValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for ExtraValue {
    fn from(value: &str) -> Self {
        ExtraValue::Str(value.to_string())
    }
}

impl From<String> for ExtraValue {
    fn from(value: String) -> Self {
        ExtraValue::Str(value)
    }
}

impl From<i64> for ExtraValue {
    fn from(value: i64) -> Self {
        ExtraValue::Int(value)
    }
}

impl From<bool> for ExtraValue {
    fn from(value: bool) -> Self {
        ExtraValue::Bool(value)
    }
}

impl fmt::Display for ExtraValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtraValue::Str(s) => f.write_str(s),
            ExtraValue::Int(n) => write!(f, "{}", n),
            ExtraValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// One inbound platform message, normalized.
///
/// Fields are read-only after construction; channels build events with
/// [`Event::new`] and [`Event::with_extra`] inside their conversion step.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    event_type: EventType,
    content: String,
    channel: String,
    extra: BTreeMap<String, ExtraValue>,
    received_at: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: EventType, content: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            event_type,
            content: content.into(),
            channel: channel.into(),
            extra: BTreeMap::new(),
            received_at: Utc::now(),
        }
    }

    /// Attach a channel-specific routing value (chat id, channel id, ...).
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<ExtraValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Name of the channel instance the event came from; responses route back here.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn extra(&self, key: &str) -> Option<&ExtraValue> {
        self.extra.get(key)
    }

    pub fn extras(&self) -> &BTreeMap<String, ExtraValue> {
        &self.extra
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Short content preview for log lines.
    pub fn preview(&self) -> &str {
        let end = self
            .content
            .char_indices()
            .nth(50)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len());
        &self.content[..end]
    }
}

/// One outbound reply produced by a reactor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    content: String,
    channel: Option<String>,
}

impl Response {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            channel: None,
        }
    }

    /// Response addressed back to the event's channel.
    pub fn reply_to(event: &Event, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            channel: Some(event.channel().to_string()),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Routing hint; the hub always routes by the originating event's channel.
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}
