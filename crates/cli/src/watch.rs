//! Live order-thread feed over the server's WebSocket.

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use shared::{FeedEvent, FeedRequest};
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use uuid::Uuid;

use crate::display;

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Feed endpoint for an HTTP base URL
pub fn feed_url(server: &str, token: &str) -> String {
    let ws_base = server
        .replacen("https://", "wss://", 1)
        .replacen("http://", "ws://", 1);
    format!("{}/ws/messages?token={}", ws_base, token)
}

/// Result of a connection attempt
enum ConnectionResult {
    /// Server went away (reconnect)
    Disconnected,
    /// Ctrl-C (exit)
    Shutdown,
}

/// Print thread events for `order_ids` until interrupted.
/// Reconnects with exponential backoff when the connection drops.
pub async fn run(server: &str, token: &str, order_ids: &[Uuid]) -> Result<()> {
    let url = feed_url(server, token);
    let mut reconnect_delay = INITIAL_RECONNECT_DELAY;

    loop {
        match run_connection(&url, order_ids).await {
            Ok(ConnectionResult::Shutdown) => break,
            Ok(ConnectionResult::Disconnected) => {
                reconnect_delay = INITIAL_RECONNECT_DELAY;
                eprintln!("Connection lost. Reconnecting in {:?}...", reconnect_delay);
            }
            Err(e) => {
                eprintln!("Connection error: {}. Reconnecting in {:?}...", e, reconnect_delay);
                tracing::warn!("Feed connection error: {}", e);
                reconnect_delay = std::cmp::min(reconnect_delay * 2, MAX_RECONNECT_DELAY);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(reconnect_delay) => {}
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

async fn run_connection(url: &str, order_ids: &[Uuid]) -> Result<ConnectionResult> {
    let (ws_stream, _) = connect_async(url).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    for order_id in order_ids {
        let request = serde_json::to_string(&FeedRequest::Subscribe { order_id: *order_id })?;
        ws_sender.send(Message::Text(request)).await?;
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            msg = ws_receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<FeedEvent>(&text) {
                    Ok(event) => {
                        if let Some(line) = display::feed_event(&event) {
                            println!("{}", line);
                        }
                    }
                    Err(e) => tracing::warn!("Unrecognised feed event: {}", e),
                },
                Some(Ok(Message::Ping(data))) => ws_sender.send(Message::Pong(data)).await?,
                Some(Ok(Message::Close(_))) | None => return Ok(ConnectionResult::Disconnected),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
            _ = heartbeat.tick() => {
                let ping = serde_json::to_string(&FeedRequest::Ping)?;
                ws_sender.send(Message::Text(ping)).await?;
            }
            _ = tokio::signal::ctrl_c() => {
                let _ = ws_sender.send(Message::Close(None)).await;
                return Ok(ConnectionResult::Shutdown);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_url() {
        assert_eq!(
            feed_url("http://localhost:8080", "abc.def"),
            "ws://localhost:8080/ws/messages?token=abc.def"
        );
        assert_eq!(
            feed_url("https://filings.example", "t"),
            "wss://filings.example/ws/messages?token=t"
        );
    }
}
