// ABOUTME: Tracing subscriber setup: readable stderr logs in development, JSON files in production
// ABOUTME: IGOR_ENV=production switches to daily-rolling JSON logs under the data directory

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::paths;

/// Default to info, but keep websocket and HTTP internals quiet
const DEFAULT_FILTER: &str = "info,tungstenite=warn,tokio_tungstenite=warn,hyper=warn,reqwest=warn";

const LOG_FILE_PREFIX: &str = "igor.log";

pub fn is_production() -> bool {
    std::env::var("IGOR_ENV")
        .map(|v| v.eq_ignore_ascii_case("production"))
        .unwrap_or(false)
}

/// Install the global subscriber.
///
/// In production the returned guard must be kept alive for the life of the
/// process; dropping it flushes and stops the background log writer.
pub fn init() -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if is_production() {
        let dir = paths::log_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

        let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(writer))
            .try_init()
            .context("Failed to install tracing subscriber")?;
        Ok(Some(guard))
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .context("Failed to install tracing subscriber")?;
        Ok(None)
    }
}
