// ABOUTME: Built-in reactors: echo, fortune, help, cat pictures and sentiment
// ABOUTME: Each matches "<wake-word> <command>" on message events

pub mod catpic;
pub mod echo;
pub mod fortune;
pub mod help;
pub mod sentiment;

pub use catpic::CatPicReactor;
pub use echo::EchoReactor;
pub use fortune::FortuneReactor;
pub use help::HelpReactor;
pub use sentiment::SentimentReactor;
