// ABOUTME: Static registries mapping config `type` tags to channel and reactor constructors
// ABOUTME: Builds the hub from config; a bad entry is reported and skipped, never fatal

use anyhow::Result;
use std::sync::Arc;

use crate::channels::{ConsoleChannel, DiscordChannel};
use crate::config::{ChannelEntry, ReactorEntry};
use crate::context::AppContext;
use crate::hub::Hub;
use crate::reactors::catpic::CatPicSettings;
use crate::reactors::{CatPicReactor, EchoReactor, FortuneReactor, HelpReactor, SentimentReactor};
use crate::traits::{Channel, Reactor};

type ChannelConstructor = fn(&AppContext, &str, &ChannelEntry) -> Result<Arc<dyn Channel>>;
type ReactorConstructor = fn(&AppContext, &ReactorEntry) -> Result<Arc<dyn Reactor>>;

const CHANNEL_TYPES: &[(&str, ChannelConstructor)] = &[
    ("console", build_console),
    ("telegram", build_telegram),
    ("discord", build_discord),
];

const REACTOR_TYPES: &[(&str, ReactorConstructor)] = &[
    ("echo", build_echo),
    ("fortune", build_fortune),
    ("help", build_help),
    ("catpic", build_catpic),
    ("sentiment", build_sentiment),
];

pub fn channel_types() -> Vec<&'static str> {
    CHANNEL_TYPES.iter().map(|(tag, _)| *tag).collect()
}

pub fn reactor_types() -> Vec<&'static str> {
    REACTOR_TYPES.iter().map(|(tag, _)| *tag).collect()
}

fn build_console(ctx: &AppContext, name: &str, _entry: &ChannelEntry) -> Result<Arc<dyn Channel>> {
    Ok(Arc::new(ConsoleChannel::stdio(name, ctx.wake_word())))
}

#[cfg(feature = "telegram")]
fn build_telegram(ctx: &AppContext, name: &str, entry: &ChannelEntry) -> Result<Arc<dyn Channel>> {
    use crate::channels::telegram::{TelegramChannel, TelegramSettings};
    use anyhow::Context;

    let settings: TelegramSettings = entry.settings()?;
    if settings.bot_token.trim().is_empty() {
        anyhow::bail!(
            "Telegram channel '{}' has no bot_token (set it in config or TELEGRAM_BOT_TOKEN)",
            name
        );
    }
    let api_url = settings
        .api_url
        .as_deref()
        .map(url::Url::parse)
        .transpose()
        .with_context(|| format!("Telegram channel '{}' has an invalid api_url", name))?;

    let mut channel = TelegramChannel::new(name, ctx.wake_word(), settings);
    if let Some(api_url) = api_url {
        channel = channel.with_api_url(api_url);
    }
    Ok(Arc::new(channel))
}

#[cfg(not(feature = "telegram"))]
fn build_telegram(_ctx: &AppContext, _name: &str, _entry: &ChannelEntry) -> Result<Arc<dyn Channel>> {
    anyhow::bail!("Telegram support not compiled. Build with --features telegram")
}

fn build_discord(ctx: &AppContext, name: &str, entry: &ChannelEntry) -> Result<Arc<dyn Channel>> {
    use crate::channels::discord::DiscordSettings;

    let settings: DiscordSettings = entry.settings()?;
    if settings.bot_token.trim().is_empty() {
        anyhow::bail!(
            "Discord channel '{}' has no bot_token (set it in config or DISCORD_BOT_TOKEN)",
            name
        );
    }
    Ok(Arc::new(DiscordChannel::new(
        name,
        ctx.wake_word(),
        settings,
        ctx.http.clone(),
    )))
}

fn build_echo(ctx: &AppContext, _entry: &ReactorEntry) -> Result<Arc<dyn Reactor>> {
    Ok(Arc::new(EchoReactor::new(ctx.wake_word())))
}

fn build_fortune(ctx: &AppContext, _entry: &ReactorEntry) -> Result<Arc<dyn Reactor>> {
    Ok(Arc::new(FortuneReactor::new(ctx.wake_word())))
}

fn build_help(ctx: &AppContext, _entry: &ReactorEntry) -> Result<Arc<dyn Reactor>> {
    Ok(Arc::new(HelpReactor::new(ctx.wake_word())))
}

fn build_catpic(ctx: &AppContext, entry: &ReactorEntry) -> Result<Arc<dyn Reactor>> {
    let settings: CatPicSettings = entry.settings()?;
    Ok(Arc::new(CatPicReactor::new(
        ctx.wake_word(),
        ctx.http.clone(),
        settings,
    )))
}

fn build_sentiment(ctx: &AppContext, _entry: &ReactorEntry) -> Result<Arc<dyn Reactor>> {
    Ok(Arc::new(SentimentReactor::new(ctx.wake_word())))
}

/// Create one channel from its config entry.
pub fn create_channel(ctx: &AppContext, name: &str, entry: &ChannelEntry) -> Result<Arc<dyn Channel>> {
    let Some((_, constructor)) = CHANNEL_TYPES.iter().find(|(tag, _)| *tag == entry.kind) else {
        anyhow::bail!(
            "Unknown channel type '{}' for channel '{}' (known: {})",
            entry.kind,
            name,
            channel_types().join(", ")
        );
    };
    constructor(ctx, name, entry)
}

/// Create one reactor from its config entry.
pub fn create_reactor(ctx: &AppContext, entry: &ReactorEntry) -> Result<Arc<dyn Reactor>> {
    let Some((_, constructor)) = REACTOR_TYPES.iter().find(|(tag, _)| *tag == entry.kind) else {
        anyhow::bail!(
            "Unknown reactor type '{}' (known: {})",
            entry.kind,
            reactor_types().join(", ")
        );
    };
    constructor(ctx, entry)
}

/// What `build_hub` managed to create, and what it skipped.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub channels: Vec<String>,
    pub reactors: Vec<String>,
    pub errors: Vec<String>,
}

impl BuildReport {
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.reactors.is_empty()
    }
}

/// Build a hub from every channel and reactor entry in the config.
///
/// Entries that fail to build are logged and listed in the report; the rest
/// are registered. Reactors keep their config order.
pub fn build_hub(ctx: &AppContext) -> (Hub, BuildReport) {
    let mut builder = Hub::builder();
    let mut report = BuildReport::default();

    for (name, entry) in &ctx.config.channels {
        match create_channel(ctx, name, entry) {
            Ok(channel) => {
                tracing::info!(channel = %name, kind = %entry.kind, "Channel configured");
                builder = builder.channel(channel);
                report.channels.push(name.clone());
            }
            Err(e) => {
                tracing::error!(channel = %name, kind = %entry.kind, error = %e, "Skipping channel");
                report.errors.push(format!("channel '{}': {:#}", name, e));
            }
        }
    }

    for entry in &ctx.config.reactors {
        match create_reactor(ctx, entry) {
            Ok(reactor) => {
                tracing::info!(reactor = %entry.display_name(), "Reactor configured");
                builder = builder.reactor(reactor);
                report.reactors.push(entry.display_name().to_string());
            }
            Err(e) => {
                tracing::error!(reactor = %entry.display_name(), error = %e, "Skipping reactor");
                report
                    .errors
                    .push(format!("reactor '{}': {:#}", entry.display_name(), e));
            }
        }
    }

    (builder.build(), report)
}
