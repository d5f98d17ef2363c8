// ABOUTME: Main entry point: loads config, builds channels and reactors, runs the hub
// ABOUTME: Ctrl-C or a console "q" triggers a graceful shutdown

use anyhow::Result;
use clap::Parser;
use igor::{config::Config, context::AppContext, factory, logging};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "igor", version, about = "Multi-platform chat bot")]
struct Cli {
    /// Path to config.toml (skips IGOR_CONFIG_PATH and the default search)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Load config, build channels and reactors, print a summary and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let log_guard = logging::init()?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting igor");

    let config = Config::load(cli.config.as_deref())?;
    tracing::info!(
        wake_word = %config.wake_word,
        channels = config.channels.len(),
        reactors = config.reactors.len(),
        "Configuration loaded"
    );

    let ctx = AppContext::new(config)?;
    let (hub, report) = factory::build_hub(&ctx);

    if cli.check {
        println!("wake word: {}", ctx.wake_word());
        println!("channels:  {}", report.channels.join(", "));
        println!("reactors:  {}", report.reactors.join(", "));
        for error in &report.errors {
            println!("error:     {}", error);
        }
        if report.is_empty() {
            anyhow::bail!("Nothing could be built from the configuration");
        }
        return Ok(());
    }

    if report.channels.is_empty() {
        anyhow::bail!("No channels could be started; check the configuration");
    }

    let hub = Arc::new(hub);

    let signal_hub = Arc::clone(&hub);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl-C");
                signal_hub.signal_shutdown();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    hub.start().await;
    tracing::info!("Igor shut down");

    // The stdin reader thread cannot be cancelled and would keep the runtime alive
    drop(log_guard);
    std::process::exit(0);
}
