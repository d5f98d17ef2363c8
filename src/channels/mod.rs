// ABOUTME: Channel implementations: console, Telegram (feature "telegram") and Discord
// ABOUTME: Each adapts one platform's input/output to the hub's Event/Response model

pub mod console;
pub mod discord;
#[cfg(feature = "telegram")]
pub mod telegram;

pub use console::ConsoleChannel;
pub use discord::DiscordChannel;
#[cfg(feature = "telegram")]
pub use telegram::TelegramChannel;
