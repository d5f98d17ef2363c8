// ABOUTME: Console channel: reads lines from stdin, prints replies to stdout
// ABOUTME: Generic over the reader/writer so tests can drive it with in-memory streams

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;

use crate::commands::has_wake_word;
use crate::event::{Event, EventType, Response};
use crate::hub::Hub;
use crate::traits::{Channel, ConvertEvent};

/// Input line that shuts the bot down.
const QUIT: &str = "q";
const REPLY_PREFIX: &str = "Igor: ";

pub struct ConsoleChannel<R = BufReader<Stdin>, W = Stdout> {
    name: String,
    wake_word: String,
    input: Mutex<R>,
    output: Mutex<W>,
    stopped: AtomicBool,
}

impl ConsoleChannel {
    /// Console bound to the process's stdin and stdout.
    pub fn stdio(name: impl Into<String>, wake_word: impl Into<String>) -> Self {
        Self::new(
            name,
            wake_word,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
    }
}

impl<R, W> ConsoleChannel<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(name: impl Into<String>, wake_word: impl Into<String>, input: R, output: W) -> Self {
        Self {
            name: name.into(),
            wake_word: wake_word.into(),
            input: Mutex::new(input),
            output: Mutex::new(output),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Hand back the writer, e.g. to inspect what a test run printed.
    pub fn into_output(self) -> W {
        self.output.into_inner()
    }
}

impl<R, W> ConvertEvent for ConsoleChannel<R, W> {
    type Raw = String;

    fn channel_event_to_igor_event(&self, raw: &String) -> Event {
        Event::new(EventType::Message, raw.trim(), self.name.as_str())
    }
}

#[async_trait]
impl<R, W> Channel for ConsoleChannel<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn start_listening(&self, hub: Arc<Hub>) -> Result<()> {
        let mut input = self.input.lock().await;
        let mut line = String::new();

        loop {
            line.clear();
            let read = input
                .read_line(&mut line)
                .await
                .context("Failed to read console input")?;
            if read == 0 {
                tracing::info!(channel = %self.name, "Console input closed");
                return Ok(());
            }

            let text = line.trim();
            if text.eq_ignore_ascii_case(QUIT) {
                tracing::info!(channel = %self.name, "Quit requested from console");
                hub.signal_shutdown();
                return Ok(());
            }

            if !has_wake_word(text, &self.wake_word) {
                tracing::trace!(channel = %self.name, "Ignoring console line without wake-word");
                continue;
            }

            let event = self.channel_event_to_igor_event(&line);
            hub.process_event(event).await;
        }
    }

    async fn stop_listening(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!(channel = %self.name, "Console channel stopped");
        Ok(())
    }

    async fn send_response(&self, _event: &Event, response: &Response) -> Result<()> {
        let mut output = self.output.lock().await;
        let line = format!("{}{}\n", REPLY_PREFIX, response.content());
        output
            .write_all(line.as_bytes())
            .await
            .context("Failed to write console reply")?;
        output.flush().await.context("Failed to flush console")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_trims_and_tags_channel() {
        let console = ConsoleChannel::new("console", "igor", &b""[..], Vec::new());
        let event = console.channel_event_to_igor_event(&"  igor echo hi \n".to_string());
        assert_eq!(event.content(), "igor echo hi");
        assert_eq!(event.channel(), "console");
        assert_eq!(event.event_type(), EventType::Message);
    }

    #[tokio::test]
    async fn test_send_response_prefixes_reply() {
        let console = ConsoleChannel::new("console", "igor", &b""[..], Vec::new());
        let event = Event::new(EventType::Message, "igor echo hi", "console");
        console
            .send_response(&event, &Response::new("hi"))
            .await
            .unwrap();
        let printed = String::from_utf8(console.into_output()).unwrap();
        assert_eq!(printed, "Igor: hi\n");
    }

    #[tokio::test]
    async fn test_stop_listening_twice() {
        let console = ConsoleChannel::new("console", "igor", &b""[..], Vec::new());
        assert!(!console.is_stopped());
        console.stop_listening().await.unwrap();
        console.stop_listening().await.unwrap();
        assert!(console.is_stopped());
    }
}
