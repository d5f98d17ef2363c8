// ABOUTME: Tests for Telegram channel startup against a stub Bot API server
// ABOUTME: getMe failures are retried until stopped; a rejected token ends the channel
#![cfg(feature = "telegram")]

mod common;

use common::{wait_until, StubServer};
use igor::channels::telegram::{TelegramChannel, TelegramSettings};
use igor::hub::Hub;
use igor::traits::Channel;
use std::sync::Arc;
use std::time::Duration;

fn channel_for(server: &StubServer) -> Arc<TelegramChannel> {
    let settings = TelegramSettings {
        bot_token: "123:abc".to_string(),
        api_url: None,
    };
    let api_url = url::Url::parse(&server.url("/")).unwrap();
    Arc::new(
        TelegramChannel::new("telegram", "igor", settings)
            .with_api_url(api_url)
            .with_retry_delay(Duration::from_millis(10)),
    )
}

#[tokio::test]
async fn test_get_me_failure_is_retried_until_stopped() {
    // Not a Bot API reply, so every getMe attempt fails without being an auth error
    let server = StubServer::start(200, "<html>gateway timeout</html>").await;
    let channel = channel_for(&server);
    let hub = Arc::new(Hub::builder().build());

    let listening = {
        let channel = Arc::clone(&channel);
        tokio::spawn(async move { channel.start_listening(hub).await })
    };

    wait_until("repeated getMe attempts", || server.requests().len() >= 3).await;
    assert!(!listening.is_finished(), "startup errors must not end the channel");
    assert!(server
        .requests()
        .iter()
        .all(|r| r.path.to_lowercase().ends_with("/getme")));

    channel.stop_listening().await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(2), listening)
        .await
        .expect("stop should interrupt the retry loop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_rejected_token_ends_listening_with_error() {
    let server = StubServer::start(
        401,
        r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#,
    )
    .await;
    let channel = channel_for(&server);
    let hub = Arc::new(Hub::builder().build());

    let result = tokio::time::timeout(Duration::from_secs(2), channel.start_listening(hub))
        .await
        .expect("a rejected token should end listening");

    let err = result.unwrap_err();
    assert!(err.to_string().contains("rejected the bot token"), "{:#}", err);
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_stop_before_start_returns_without_requests() {
    let server = StubServer::start(200, "{}").await;
    let channel = channel_for(&server);
    channel.stop_listening().await.unwrap();

    let result = channel.start_listening(Arc::new(Hub::builder().build())).await;
    assert!(result.is_ok());
    assert!(server.requests().is_empty());
}
