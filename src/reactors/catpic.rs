// ABOUTME: Cat picture reactor: fetches a random image URL from The Cat API
// ABOUTME: The API endpoint is configurable per reactor entry

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::client::HttpClient;
use crate::commands::strip_command;
use crate::event::{Event, EventType, Response};
use crate::traits::Reactor;

const COMMAND: &str = "cat pic";
pub const DEFAULT_API_URL: &str = "https://api.thecatapi.com/v1/images/search";

#[derive(Debug, Clone, Deserialize)]
pub struct CatPicSettings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl Default for CatPicSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
        }
    }
}

pub struct CatPicReactor {
    wake_word: String,
    http: HttpClient,
    api_url: String,
}

impl CatPicReactor {
    pub fn new(wake_word: impl Into<String>, http: HttpClient, settings: CatPicSettings) -> Self {
        Self {
            wake_word: wake_word.into(),
            http,
            api_url: settings.api_url,
        }
    }
}

/// Pull the first image URL out of a `/images/search` reply.
fn first_image_url(body: &Value) -> Option<&str> {
    body.as_array()?.first()?.get("url")?.as_str()
}

#[async_trait]
impl Reactor for CatPicReactor {
    fn name(&self) -> &str {
        "catpic"
    }

    fn can_handle(&self, event: &Event) -> bool {
        event.event_type() == EventType::Message
            && strip_command(event.content(), &self.wake_word, COMMAND).is_some()
    }

    async fn handle(&self, event: &Event) -> Result<Option<Response>> {
        let body = self
            .http
            .get_json(&self.api_url)
            .await
            .context("Failed to fetch cat picture")?;

        let url = first_image_url(&body)
            .ok_or_else(|| anyhow::anyhow!("Cat API reply had no image url"))?;

        tracing::info!(url = %url, "Fetched cat picture");
        Ok(Some(Response::reply_to(event, url)))
    }
}
