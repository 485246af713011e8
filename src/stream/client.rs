use std::sync::Arc;

use async_stream::try_stream;
use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use super::connection::{Command, ConnectionManager, ConnectionState, ConnectionStatus};
use super::types::{Notification, Payload};
use crate::Result;
use crate::error::{Error, Kind};
use crate::ws::config::Config;
use crate::ws::{Connector, ReadyState, WebSocketConnector, WsError};

/// Resilient streaming client.
///
/// Cheap to clone; every clone drives the same connection. The connection is
/// opened lazily on the first send or subscribe, re-established with
/// exponential backoff after abnormal closes, and re-subscribes to every
/// topic once it is back.
///
/// Dropping the last clone shuts the connection down with a normal close.
///
/// # Examples
///
/// ```rust, no_run
/// use futures::StreamExt;
/// use realtime_stream_client::stream::Client;
/// use realtime_stream_client::ws::config::Config;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = Client::connect_to("wss://stream.example.com/quotes", Config::default())?;
///     client.subscribe(["AAPL", "MSFT"])?;
///
///     let mut messages = Box::pin(client.messages());
///     while let Some(message) = messages.next().await {
///         println!("{}", message?);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    /// Configuration the connection was built with
    config: Config,
    /// Requests to the connection task
    commands: mpsc::UnboundedSender<Command>,
    /// Connection state published by the connection task
    state_rx: watch::Receiver<ConnectionState>,
    /// Sender half kept so new listeners can subscribe at any time
    notifications: broadcast::Sender<Notification>,
}

impl Client {
    /// Create a client that opens its transports through `connector`.
    ///
    /// Nothing is opened until the first [`Client::connect`], [`Client::send`]
    /// or [`Client::subscribe`].
    ///
    /// # Errors
    ///
    /// Returns an error if called outside a Tokio runtime, or if the
    /// notification capacity, heartbeat interval or heartbeat timeout is zero.
    pub fn new<C: Connector>(connector: C, config: Config) -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| Error::with_source(Kind::Internal, e))?;

        if config.notification_capacity == 0 {
            return Err(Error::validation(
                "notification capacity must be greater than zero",
            ));
        }
        if config.heartbeat_interval.is_zero() {
            return Err(Error::validation(
                "heartbeat interval must be greater than zero",
            ));
        }
        if config.heartbeat_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(Error::validation(
                "heartbeat timeout must be greater than zero",
            ));
        }

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (notifications, _) = broadcast::channel(config.notification_capacity);

        let (manager, inputs) = ConnectionManager::new(
            connector,
            &config,
            commands_rx,
            state_tx,
            notifications.clone(),
        );
        handle.spawn(manager.run(inputs));

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                commands: commands_tx,
                state_rx,
                notifications,
            }),
        })
    }

    /// Create a client for a WebSocket endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if `endpoint` is not a valid `ws://` or `wss://` URL,
    /// or if called outside a Tokio runtime.
    pub fn connect_to(endpoint: &str, config: Config) -> Result<Self> {
        Self::new(WebSocketConnector::new(endpoint)?, config)
    }

    /// Open a connection. No-op unless currently disconnected.
    ///
    /// Also re-enables automatic reconnection after it was exhausted or turned
    /// off by [`Client::disconnect`].
    ///
    /// # Errors
    ///
    /// Returns an error if the connection task has shut down.
    pub fn connect(&self) -> Result<()> {
        self.command(Command::Connect)
    }

    /// Close the connection with a normal close and stop reconnecting.
    ///
    /// Completes once the connection task has processed the request. Pending
    /// reconnect timers become inert; the subscription set and any queued
    /// messages are kept for the next [`Client::connect`].
    ///
    /// # Errors
    ///
    /// Returns an error if the connection task has shut down.
    pub async fn disconnect(&self) -> Result<()> {
        let (done, rx) = oneshot::channel();
        self.command(Command::Disconnect { done })?;
        rx.await.map_err(|_e| Error::closed())
    }

    /// Send an application payload.
    ///
    /// Transmitted immediately when connected, otherwise queued and flushed in
    /// order once a connection opens. Triggers a connection if disconnected,
    /// which like [`Client::connect`] re-enables automatic reconnection after
    /// it was exhausted or turned off by [`Client::disconnect`].
    ///
    /// # Errors
    ///
    /// Returns an error if a JSON payload cannot be serialized or the
    /// connection task has shut down.
    pub fn send<P: Into<Payload>>(&self, payload: P) -> Result<()> {
        let text = payload.into().into_text()?;
        self.command(Command::Send(text))
    }

    /// Serialize `message` as JSON and [`Client::send`] it.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the connection task has shut down.
    pub fn send_json<R: Serialize>(&self, message: &R) -> Result<()> {
        let text = serde_json::to_string(message)?;
        self.command(Command::Send(text))
    }

    /// Add topics to the subscription set and announce them.
    ///
    /// Connects if disconnected, the same way [`Client::send`] does.
    ///
    /// # Errors
    ///
    /// Returns an error if `topics` is empty or the connection task has shut down.
    pub fn subscribe<I, S>(&self, topics: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let topics = collect_topics(topics)?;
        self.command(Command::Subscribe(topics))
    }

    /// Remove topics from the subscription set and announce the removal.
    ///
    /// # Errors
    ///
    /// Returns an error if `topics` is empty or the connection task has shut down.
    pub fn unsubscribe<I, S>(&self, topics: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let topics = collect_topics(topics)?;
        self.command(Command::Unsubscribe(topics))
    }

    /// Snapshot of connection state, attempt counter, subscriptions and queue depth.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection task has shut down.
    pub async fn connection_state(&self) -> Result<ConnectionStatus> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Status(reply))?;
        rx.await.map_err(|_e| Error::closed())
    }

    /// Ready state of the current transport, or [`ReadyState::Closed`] if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection task has shut down.
    pub async fn transport_ready_state(&self) -> Result<ReadyState> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::ReadyState(reply))?;
        rx.await.map_err(|_e| Error::closed())
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_rx.borrow()
    }

    /// Watch connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_rx.clone()
    }

    /// Listen for lifecycle events, errors and messages.
    ///
    /// Only events emitted after this call are observed.
    #[must_use]
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.inner.notifications.subscribe()
    }

    /// Stream of application messages.
    ///
    /// Yields a lag error and ends if the listener falls behind by more than
    /// the configured notification capacity. Also ends when the connection
    /// task shuts down.
    pub fn messages(&self) -> impl Stream<Item = Result<Value>> + use<> {
        let mut rx = self.notifications();

        try_stream! {
            loop {
                match rx.recv().await {
                    Ok(Notification::Message(value)) => yield value,
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Message stream lagged, missed {n} notifications");
                        Err(WsError::Lagged { count: n })?;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    fn command(&self, command: Command) -> Result<()> {
        self.inner
            .commands
            .send(command)
            .map_err(|_e| Error::closed())
    }
}

fn collect_topics<I, S>(topics: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let topics: Vec<String> = topics.into_iter().map(Into::into).collect();
    if topics.is_empty() {
        return Err(Error::validation("at least one topic is required"));
    }
    Ok(topics)
}
