// ABOUTME: Help reactor: lists what the bot can do

use anyhow::Result;
use async_trait::async_trait;

use crate::commands::strip_command;
use crate::event::{Event, EventType, Response};
use crate::traits::Reactor;

const COMMAND: &str = "help";

pub const HELP_TEXT: &str = "I'm a bot. Here are some things you can ask me:

- cat pic: I'll send you a random cat pic
- fortune: I'll send you a random fortune
- echo: Mostly for testing, I'll just repeat what you tell me
- sentiment: I'll tell you whether some text sounds positive, negative or neutral";

pub struct HelpReactor {
    wake_word: String,
}

impl HelpReactor {
    pub fn new(wake_word: impl Into<String>) -> Self {
        Self {
            wake_word: wake_word.into(),
        }
    }
}

#[async_trait]
impl Reactor for HelpReactor {
    fn name(&self) -> &str {
        COMMAND
    }

    fn can_handle(&self, event: &Event) -> bool {
        event.event_type() == EventType::Message
            && strip_command(event.content(), &self.wake_word, COMMAND).is_some()
    }

    async fn handle(&self, event: &Event) -> Result<Option<Response>> {
        Ok(Some(Response::reply_to(event, HELP_TEXT)))
    }
}
