// ABOUTME: Root library module exposing channels, reactors, the Discord gateway and bootstrap helpers
// ABOUTME: Platform-agnostic types (events, hub, config) are re-exported from igor-core

pub mod channels;
pub mod client;
pub mod context;
pub mod factory;
pub mod gateway;
pub mod logging;
pub mod reactors;

// Re-export platform-agnostic modules from igor-core
pub use igor_core::commands;
pub use igor_core::config;
pub use igor_core::event;
pub use igor_core::hub;
pub use igor_core::metrics;
pub use igor_core::paths;
pub use igor_core::traits;
pub use igor_core::utils;
