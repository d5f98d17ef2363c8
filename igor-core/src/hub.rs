// ABOUTME: Central hub that owns the channel and reactor registries.
// ABOUTME: Runs one listening task per channel, dispatches events, routes responses, handles shutdown.

use futures_util::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::event::{Event, Response};
use crate::metrics;
use crate::traits::{Channel, Reactor};

/// How long `start` waits for channel tasks to wind down after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Result of running one event through the reactor list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A reactor produced a response; `delivered` is false when routing or the
    /// channel send failed.
    Responded { reactor: String, delivered: bool },
    /// A reactor claimed the event but produced no output.
    Consumed { reactor: String },
    /// The claiming reactor returned an error or panicked.
    Failed { reactor: String },
    /// No reactor claimed the event.
    Unhandled,
}

impl DispatchOutcome {
    /// Name of the reactor that claimed the event, if any.
    pub fn reactor(&self) -> Option<&str> {
        match self {
            DispatchOutcome::Responded { reactor, .. }
            | DispatchOutcome::Consumed { reactor }
            | DispatchOutcome::Failed { reactor } => Some(reactor),
            DispatchOutcome::Unhandled => None,
        }
    }
}

/// Builder that collects channels and reactors before the hub starts.
///
/// Registries are fixed once [`HubBuilder::build`] returns, so dispatch never
/// needs a lock.
#[derive(Default)]
pub struct HubBuilder {
    channels: HashMap<String, Arc<dyn Channel>>,
    reactors: Vec<Arc<dyn Reactor>>,
}

impl HubBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel under its `name()`. A later channel with the same
    /// name replaces the earlier one.
    pub fn channel(mut self, channel: Arc<dyn Channel>) -> Self {
        let name = channel.name().to_string();
        if self.channels.insert(name.clone(), channel).is_some() {
            tracing::warn!(channel = %name, "Duplicate channel name, replacing earlier registration");
        }
        self
    }

    /// Append a reactor. Registration order is dispatch priority.
    pub fn reactor(mut self, reactor: Arc<dyn Reactor>) -> Self {
        self.reactors.push(reactor);
        self
    }

    pub fn build(self) -> Hub {
        Hub {
            channels: self.channels,
            reactors: self.reactors,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Dispatcher and lifecycle manager for all channels.
pub struct Hub {
    channels: HashMap<String, Arc<dyn Channel>>,
    reactors: Vec<Arc<dyn Reactor>>,
    shutdown: CancellationToken,
}

impl Hub {
    pub fn builder() -> HubBuilder {
        HubBuilder::new()
    }

    /// Look up a channel by instance name.
    pub fn channel(&self, name: &str) -> Option<&Arc<dyn Channel>> {
        self.channels.get(name)
    }

    /// Registered channel names, sorted.
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.keys().cloned().collect();
        names.sort();
        names
    }

    /// Reactor names in dispatch order.
    pub fn reactor_names(&self) -> Vec<String> {
        self.reactors.iter().map(|r| r.name().to_string()).collect()
    }

    /// Token cancelled by [`Hub::signal_shutdown`]. Channels may hold a child
    /// token for their own background work.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Run every channel's listener until shutdown is signalled.
    ///
    /// Each channel gets its own task. A listener that fails or returns early
    /// is logged and stopped; the remaining channels keep running. Once the
    /// shutdown signal fires, every task is cancelled, each channel's
    /// `stop_listening` runs, and this returns after the tasks have been
    /// joined (or the grace period expires).
    pub async fn start(self: Arc<Self>) {
        let mut tasks = JoinSet::new();

        for (name, channel) in &self.channels {
            let hub = Arc::clone(&self);
            let channel = Arc::clone(channel);
            let token = self.shutdown.child_token();
            let name = name.clone();

            tasks.spawn(async move {
                tracing::info!(channel = %name, "Channel listening");
                let result = tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!(channel = %name, "Channel task cancelled");
                        Ok(())
                    }
                    res = channel.start_listening(hub) => res,
                };

                match result {
                    Ok(()) => tracing::info!(channel = %name, "Channel stopped listening"),
                    Err(e) => {
                        tracing::error!(channel = %name, error = %e, "Channel listener failed");
                        metrics::record_channel_failure(&name);
                    }
                }

                if let Err(e) = channel.stop_listening().await {
                    tracing::warn!(channel = %name, error = %e, "Channel stop_listening failed");
                }
            });
        }

        tracing::info!(
            channels = self.channels.len(),
            reactors = self.reactors.len(),
            "Hub started"
        );

        self.shutdown.cancelled().await;
        tracing::info!("Shutdown signal observed, waiting for channels to stop");

        let drain = async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Channel task panicked");
                }
            }
        };

        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            tracing::warn!(
                remaining = tasks.len(),
                "Channels did not stop within grace period, aborting"
            );
            tasks.abort_all();
        }

        tracing::info!("Hub stopped");
    }

    /// Run an event through the reactor list.
    ///
    /// The first reactor whose `can_handle` returns true handles the event and
    /// no later reactor is consulted, whether or not it produces a response.
    pub async fn process_event(&self, event: Event) -> DispatchOutcome {
        tracing::debug!(
            channel = %event.channel(),
            event_type = %event.event_type(),
            preview = %event.preview(),
            "Processing event"
        );

        let Some(reactor) = self.reactors.iter().find(|r| r.can_handle(&event)) else {
            tracing::warn!(
                channel = %event.channel(),
                event_type = %event.event_type(),
                preview = %event.preview(),
                "No reactor found to handle event"
            );
            metrics::record_unhandled_event(event.channel());
            return DispatchOutcome::Unhandled;
        };

        let name = reactor.name().to_string();
        tracing::info!(reactor = %name, channel = %event.channel(), "Reactor handling event");
        metrics::record_event_dispatched(&name);

        let handled = AssertUnwindSafe(reactor.handle(&event)).catch_unwind().await;

        match handled {
            Ok(Ok(Some(response))) if !response.is_empty() => {
                let delivered = self.send_channel_response(&event, &response).await;
                DispatchOutcome::Responded {
                    reactor: name,
                    delivered,
                }
            }
            Ok(Ok(_)) => {
                tracing::debug!(reactor = %name, "Reactor produced no response");
                DispatchOutcome::Consumed { reactor: name }
            }
            Ok(Err(e)) => {
                tracing::error!(reactor = %name, error = %e, "Reactor failed to handle event");
                metrics::record_reactor_failure(&name);
                DispatchOutcome::Failed { reactor: name }
            }
            Err(_) => {
                tracing::error!(reactor = %name, "Reactor panicked while handling event");
                metrics::record_reactor_failure(&name);
                DispatchOutcome::Failed { reactor: name }
            }
        }
    }

    /// Route a response to the channel the event came from.
    ///
    /// Returns whether the channel accepted it. Unknown channels and send
    /// failures are logged, never propagated.
    pub async fn send_channel_response(&self, event: &Event, response: &Response) -> bool {
        let channel_name = event.channel();
        let Some(channel) = self.channels.get(channel_name) else {
            tracing::warn!(channel = %channel_name, "Channel not found, dropping response");
            metrics::record_routing_failure(channel_name);
            return false;
        };

        match channel.send_response(event, response).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(channel = %channel_name, error = %e, "Failed to send response");
                metrics::record_routing_failure(channel_name);
                false
            }
        }
    }

    /// Ask every channel task to stop. Safe to call repeatedly and from any task.
    pub fn signal_shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        tracing::info!("Shutdown requested");
        self.shutdown.cancel();
    }
}
