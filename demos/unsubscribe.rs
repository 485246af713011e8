//! Demonstrates how the subscription set evolves across subscribe and unsubscribe.
//!
//! This example shows how to:
//! 1. Subscribe before a connection exists (the first call opens it)
//! 2. Add and remove topics while connected
//! 3. Inspect the subscription set the client will restore after a reconnect
//!
//! Run with tracing enabled:
//! ```sh
//! STREAM_ENDPOINT=ws://127.0.0.1:8080/quotes RUST_LOG=info cargo run --example unsubscribe --features tracing
//! ```
//!
//! With debug level, you can see the connection state machine at work:
//! ```sh
//! RUST_LOG=debug,rustls=off cargo run --example unsubscribe --features tracing
//! ```

use std::time::Duration;

use realtime_stream_client::stream::Client;
use realtime_stream_client::ws::config::Config;
use tokio::time::timeout;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let endpoint = std::env::var("STREAM_ENDPOINT")
        .unwrap_or_else(|_| "ws://127.0.0.1:8080/quotes".to_owned());
    let client = Client::connect_to(&endpoint, Config::default())?;

    // === FIRST SUBSCRIPTION ===
    client.subscribe(["AAPL", "MSFT"])?;
    let status = client.connection_state().await?;
    info!(
        connecting = status.connecting,
        queued = status.queued_count,
        subscriptions = ?status.subscriptions,
        "Subscribed before connecting"
    );

    let mut state = client.state_receiver();
    timeout(
        Duration::from_secs(10),
        state.wait_for(|state| state.is_connected()),
    )
    .await??;
    info!("Connected; subscription set announced");

    // === ADD A TOPIC ===
    client.subscribe(["TSLA"])?;
    info!(
        subscriptions = ?client.connection_state().await?.subscriptions,
        "Added TSLA"
    );

    // === REMOVE A TOPIC ===
    client.unsubscribe(["AAPL"])?;
    info!(
        subscriptions = ?client.connection_state().await?.subscriptions,
        "Removed AAPL; this is the set restored after a reconnect"
    );

    tokio::time::sleep(Duration::from_secs(5)).await;

    client.disconnect().await?;
    info!(state = %client.state(), "Disconnected");
    Ok(())
}
