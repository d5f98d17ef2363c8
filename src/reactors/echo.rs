// ABOUTME: Echo reactor: repeats whatever follows "<wake-word> echo"
// ABOUTME: Mostly useful for checking that a channel round-trips messages

use anyhow::Result;
use async_trait::async_trait;

use crate::commands::strip_command;
use crate::event::{Event, EventType, Response};
use crate::traits::Reactor;

const COMMAND: &str = "echo";
const NOTHING_SAID: &str = "You didn't say anything";

pub struct EchoReactor {
    wake_word: String,
}

impl EchoReactor {
    pub fn new(wake_word: impl Into<String>) -> Self {
        Self {
            wake_word: wake_word.into(),
        }
    }
}

#[async_trait]
impl Reactor for EchoReactor {
    fn name(&self) -> &str {
        COMMAND
    }

    fn can_handle(&self, event: &Event) -> bool {
        event.event_type() == EventType::Message
            && strip_command(event.content(), &self.wake_word, COMMAND).is_some()
    }

    async fn handle(&self, event: &Event) -> Result<Option<Response>> {
        let text = strip_command(event.content(), &self.wake_word, COMMAND).unwrap_or_default();
        let reply = if text.is_empty() { NOTHING_SAID } else { text };
        Ok(Some(Response::reply_to(event, reply)))
    }
}
