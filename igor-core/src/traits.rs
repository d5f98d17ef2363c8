// ABOUTME: Capability traits implemented by every channel and reactor.
// ABOUTME: Channels adapt one platform to the hub; reactors implement one bot capability.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::event::{Event, Response};
use crate::hub::Hub;

// =============================================================================
// Channel
// =============================================================================

/// Adapter to one communication platform.
///
/// A channel turns platform input into [`Event`]s, hands them to
/// [`Hub::process_event`], and delivers the hub's [`Response`]s back to the
/// platform. `start_listening` runs for the life of the channel; the hub runs
/// it as its own task and cancels that task on shutdown, so implementations
/// must only hold platform resources across `.await` points that are safe to
/// drop.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Instance name from configuration (e.g. "console", "discord"). Events
    /// produced by this channel carry it so responses can be routed back.
    fn name(&self) -> &str;

    /// Receive platform input until cancelled or the platform goes away.
    async fn start_listening(&self, hub: Arc<Hub>) -> Result<()>;

    /// Release platform resources. Calling this more than once is a no-op.
    async fn stop_listening(&self) -> Result<()>;

    /// Deliver a response using routing data the channel stored in `event`.
    async fn send_response(&self, event: &Event, response: &Response) -> Result<()>;
}

/// Pure conversion from a channel's native input into an [`Event`].
///
/// Kept separate from [`Channel`] because every platform has its own raw
/// input type.
pub trait ConvertEvent {
    type Raw;

    /// Build the normalized event. Deterministic for the same input and
    /// channel configuration; never performs I/O.
    fn channel_event_to_igor_event(&self, raw: &Self::Raw) -> Event;
}

// =============================================================================
// Reactor
// =============================================================================

/// One bot capability: a cheap predicate plus an async handler.
#[async_trait]
pub trait Reactor: Send + Sync {
    /// Identifier used in logs and metrics (e.g. "echo").
    fn name(&self) -> &str;

    /// Whether this reactor claims the event. Must not block or perform I/O.
    fn can_handle(&self, event: &Event) -> bool;

    /// Produce a reply. `Ok(None)` means the event was consumed without output.
    async fn handle(&self, event: &Event) -> Result<Option<Response>>;
}
