// ABOUTME: Startup context handed to every channel and reactor constructor
// ABOUTME: Holds the loaded config and the shared HTTP client; built once in main

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::client::HttpClient;
use crate::config::Config;

#[derive(Clone, Debug)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub http: HttpClient,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let http = HttpClient::new().context("Failed to build HTTP client")?;
        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    pub fn wake_word(&self) -> &str {
        &self.config.wake_word
    }
}
