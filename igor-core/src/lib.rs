// ABOUTME: Platform-agnostic core of the igor bot: events, traits, hub dispatch and config
// ABOUTME: Channel and reactor implementations live in the igor crate and plug in via traits

pub mod commands;
pub mod config;
pub mod event;
pub mod hub;
pub mod metrics;
pub mod paths;
pub mod traits;
pub mod utils;

pub use config::{ChannelEntry, Config, ReactorEntry};
pub use event::{Event, EventType, ExtraValue, Response};
pub use hub::{DispatchOutcome, Hub, HubBuilder};
pub use traits::{Channel, ConvertEvent, Reactor};
