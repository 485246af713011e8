#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests, and https://github.com/rust-lang/rust-clippy/issues/13981"
)]
#![allow(
    unused,
    reason = "Deeply nested uses in sub-modules are falsely flagged as being unused"
)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use realtime_stream_client::Result;
use realtime_stream_client::stream::{Client, Notification};
use realtime_stream_client::ws::config::{Config, ReconnectConfig};
use realtime_stream_client::ws::{
    CloseCode, Connector, EventSink, Generation, ReadyState, Transport, WsError,
};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

/// Long enough for any backoff used in the tests. Time is paused, so waiting
/// costs nothing.
pub const WAIT: Duration = Duration::from_secs(600);

#[derive(Debug)]
struct Shared {
    ready: ReadyState,
    sent: Vec<String>,
    close_requests: Vec<(CloseCode, String)>,
    /// Frames accepted before the transport reports itself as closing
    capacity: usize,
}

impl Shared {
    fn ready_state(&self) -> ReadyState {
        if self.ready == ReadyState::Open && self.sent.len() >= self.capacity {
            ReadyState::Closing
        } else {
            self.ready
        }
    }
}

/// Transport whose lifecycle is scripted by the test through a [`MockHandle`].
#[derive(Debug)]
pub struct MockTransport {
    shared: Arc<Mutex<Shared>>,
}

impl Transport for MockTransport {
    fn send(&mut self, text: &str) -> Result<()> {
        let mut shared = self.shared.lock().unwrap();
        if shared.ready_state() != ReadyState::Open {
            return Err(WsError::NotReady.into());
        }
        shared.sent.push(text.to_owned());
        Ok(())
    }

    fn close(&mut self, code: CloseCode, reason: &str) {
        let mut shared = self.shared.lock().unwrap();
        shared.close_requests.push((code, reason.to_owned()));
        shared.ready = ReadyState::Closing;
    }

    fn ready_state(&self) -> ReadyState {
        self.shared.lock().unwrap().ready_state()
    }
}

/// Test-side view of one opened transport.
#[derive(Debug, Clone)]
pub struct MockHandle {
    shared: Arc<Mutex<Shared>>,
    events: EventSink,
}

impl MockHandle {
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.events.generation()
    }

    /// Complete the opening handshake.
    pub fn open(&self) {
        self.shared.lock().unwrap().ready = ReadyState::Open;
        self.events.opened();
    }

    /// Report the connection as closed.
    pub fn close(&self, code: CloseCode, reason: &str) {
        self.shared.lock().unwrap().ready = ReadyState::Closed;
        self.events.closed(code, reason);
    }

    pub fn fail(&self) {
        self.events.error(WsError::ConnectionClosed);
    }

    /// Deliver an inbound text frame.
    pub fn receive(&self, text: &str) {
        self.events.message(text);
    }

    pub fn receive_json(&self, value: &Value) {
        self.receive(&value.to_string());
    }

    /// Stop accepting frames after `capacity` have been sent in total.
    pub fn set_capacity(&self, capacity: usize) {
        self.shared.lock().unwrap().capacity = capacity;
    }

    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.shared.lock().unwrap().ready_state()
    }

    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.shared.lock().unwrap().sent.clone()
    }

    #[must_use]
    pub fn sent_json(&self) -> Vec<Value> {
        self.sent()
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }

    /// Sent frames whose `type` is not `ping`.
    #[must_use]
    pub fn sent_without_pings(&self) -> Vec<Value> {
        self.sent_json()
            .into_iter()
            .filter(|value| value["type"] != "ping")
            .collect()
    }

    #[must_use]
    pub fn pings(&self) -> usize {
        self.sent_json()
            .iter()
            .filter(|value| value["type"] == "ping")
            .count()
    }

    #[must_use]
    pub fn close_requests(&self) -> Vec<(CloseCode, String)> {
        self.shared.lock().unwrap().close_requests.clone()
    }
}

/// Connector handed to the client under test.
#[derive(Debug)]
pub struct MockConnector {
    opened: mpsc::UnboundedSender<MockHandle>,
    fail_next: Arc<AtomicUsize>,
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    fn open(&mut self, events: EventSink) -> Result<MockTransport> {
        let failed = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(WsError::ConnectionClosed.into());
        }

        let shared = Arc::new(Mutex::new(Shared {
            ready: ReadyState::Connecting,
            sent: Vec::new(),
            close_requests: Vec::new(),
            capacity: usize::MAX,
        }));
        _ = self.opened.send(MockHandle {
            shared: Arc::clone(&shared),
            events,
        });

        Ok(MockTransport { shared })
    }
}

/// Receives a [`MockHandle`] for every transport the client opens.
#[derive(Debug)]
pub struct Transports {
    opened: mpsc::UnboundedReceiver<MockHandle>,
    fail_next: Arc<AtomicUsize>,
}

impl Transports {
    /// Wait for the client to open a transport.
    pub async fn next(&mut self) -> MockHandle {
        timeout(WAIT, self.opened.recv())
            .await
            .expect("client did not open a transport")
            .unwrap()
    }

    /// A transport opened since the last check, if any.
    pub fn try_next(&mut self) -> Option<MockHandle> {
        self.opened.try_recv().ok()
    }

    /// Make the next `count` open attempts fail synchronously.
    pub fn fail_next_opens(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }
}

#[must_use]
pub fn mock_connector() -> (MockConnector, Transports) {
    let (tx, rx) = mpsc::unbounded_channel();
    let fail_next = Arc::new(AtomicUsize::new(0));

    (
        MockConnector {
            opened: tx,
            fail_next: Arc::clone(&fail_next),
        },
        Transports {
            opened: rx,
            fail_next,
        },
    )
}

/// 1 s base interval, 5 attempts, 30 s heartbeat.
#[must_use]
pub fn test_config() -> Config {
    Config::builder()
        .reconnect(
            ReconnectConfig::builder()
                .base_interval(Duration::from_secs(1))
                .max_attempts(5)
                .build(),
        )
        .build()
}

pub fn client_with(config: Config) -> (Client, Transports) {
    let (connector, transports) = mock_connector();
    let client = Client::new(connector, config).unwrap();
    (client, transports)
}

pub fn client() -> (Client, Transports) {
    client_with(test_config())
}

/// Wait until the client has handled everything sent to it so far.
pub async fn settle(client: &Client) {
    client.connection_state().await.unwrap();
}

/// Next notification, failing the test if none arrives.
pub async fn next_notification(rx: &mut broadcast::Receiver<Notification>) -> Notification {
    timeout(WAIT, rx.recv())
        .await
        .expect("no notification received")
        .unwrap()
}

/// Skip notifications until `predicate` matches one.
pub async fn wait_for<F>(rx: &mut broadcast::Receiver<Notification>, mut predicate: F) -> Notification
where
    F: FnMut(&Notification) -> bool,
{
    loop {
        let notification = next_notification(rx).await;
        if predicate(&notification) {
            return notification;
        }
    }
}

/// Drain whatever notifications are already buffered.
pub fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut notifications = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        notifications.push(notification);
    }
    notifications
}
