// ABOUTME: Fortune reactor: replies with a random line from a fixed list

use anyhow::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;

use crate::commands::strip_command;
use crate::event::{Event, EventType, Response};
use crate::traits::Reactor;

const COMMAND: &str = "fortune";

pub const FORTUNES: &[&str] = &[
    "I didn’t come this far to only come this far",
    "Anything that you do, any accomplishment that you make, you have to work for",
];

pub struct FortuneReactor {
    wake_word: String,
}

impl FortuneReactor {
    pub fn new(wake_word: impl Into<String>) -> Self {
        Self {
            wake_word: wake_word.into(),
        }
    }
}

#[async_trait]
impl Reactor for FortuneReactor {
    fn name(&self) -> &str {
        COMMAND
    }

    fn can_handle(&self, event: &Event) -> bool {
        event.event_type() == EventType::Message
            && strip_command(event.content(), &self.wake_word, COMMAND).is_some()
    }

    async fn handle(&self, event: &Event) -> Result<Option<Response>> {
        let fortune = FORTUNES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or_default();
        Ok(Some(Response::reply_to(event, fortune)))
    }
}
