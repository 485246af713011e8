//! Streams quotes for a handful of symbols and logs every lifecycle event.
//!
//! Point it at any endpoint that speaks the subscribe/unsubscribe/ping protocol:
//! ```sh
//! STREAM_ENDPOINT=wss://stream.example.com/quotes RUST_LOG=info cargo run --example stream_quotes --features tracing
//! ```
//!
//! Kill the server while it runs to watch the client back off, reconnect and
//! re-subscribe on its own.

use std::time::Duration;

use futures::StreamExt as _;
use realtime_stream_client::stream::{Client, Notification};
use realtime_stream_client::ws::config::{Config, ReconnectConfig};
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let endpoint = std::env::var("STREAM_ENDPOINT")
        .unwrap_or_else(|_| "ws://127.0.0.1:8080/quotes".to_owned());

    let config = Config::builder()
        .heartbeat_interval(Duration::from_secs(15))
        .heartbeat_timeout(Duration::from_secs(45))
        .reconnect(
            ReconnectConfig::builder()
                .base_interval(Duration::from_secs(1))
                .max_attempts(8)
                .max_backoff(Duration::from_secs(30))
                .build(),
        )
        .build();
    let client = Client::connect_to(&endpoint, config)?;

    let mut notifications = client.notifications();
    tokio::spawn(async move {
        while let Ok(notification) = notifications.recv().await {
            match notification {
                Notification::Opened => info!(event = "opened"),
                Notification::Closed { code, reason } => info!(event = "closed", %code, %reason),
                Notification::Reconnecting { attempt, delay } => {
                    info!(event = "reconnecting", attempt, ?delay);
                }
                Notification::ReconnectExhausted { attempts } => {
                    warn!(event = "reconnect_exhausted", attempts);
                }
                Notification::Error(e) => warn!(event = "error", error = %e),
                _ => {}
            }
        }
    });

    let symbols = ["AAPL", "MSFT", "TSLA"];
    info!(?symbols, "Subscribing");
    client.subscribe(symbols)?;

    let mut messages = Box::pin(client.messages());
    let mut count = 0;
    while let Ok(Some(result)) = timeout(Duration::from_secs(30), messages.next()).await {
        match result {
            Ok(message) => {
                info!(
                    symbol = %message["symbol"],
                    price = %message["price"],
                    "quote"
                );
                count += 1;
                if count >= 50 {
                    break;
                }
            }
            Err(e) => debug!(error = %e, "stream ended"),
        }
    }

    let status = client.connection_state().await?;
    info!(
        received = count,
        connected = status.connected,
        subscriptions = ?status.subscriptions,
        "Done"
    );

    client.disconnect().await?;
    Ok(())
}
