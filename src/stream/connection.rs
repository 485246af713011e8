#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;

use super::heartbeat::HeartbeatMonitor;
use super::queue::{Outbound, OutboundKind, OutboundQueue};
use super::reconnect::{ReconnectScheduler, Scheduled};
use super::subscription::SubscriptionRegistry;
use super::types::{Inbound, Notification, Request, parse_inbound};
use crate::ws::config::Config;
use crate::ws::{
    CloseCode, Connector, EventSink, Generation, ReadyState, Transport, TransportEvent, WsError,
};

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum_macros::Display)]
pub enum ConnectionState {
    /// Not connected
    #[default]
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Successfully connected
    Connected,
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    #[must_use]
    pub const fn is_connecting(self) -> bool {
        matches!(self, Self::Connecting)
    }
}

/// Point-in-time view of a client.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub connecting: bool,
    /// Reconnect attempts since the last successful open
    pub attempt_count: u32,
    /// Subscribed topics in insertion order
    pub subscriptions: Vec<String>,
    /// Frames waiting for an open transport
    pub queued_count: usize,
}

/// Requests from `Client` handles.
#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    Disconnect { done: oneshot::Sender<()> },
    Send(String),
    Subscribe(Vec<String>),
    Unsubscribe(Vec<String>),
    Status(oneshot::Sender<ConnectionStatus>),
    ReadyState(oneshot::Sender<ReadyState>),
}

/// Deferred work posted back into the actor by timer tasks.
#[derive(Debug)]
pub(crate) enum Timer {
    HeartbeatTick {
        generation: Generation,
    },
    ReconnectDue {
        epoch: u64,
        attempt: u32,
        delay: Duration,
    },
}

/// Who asked for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Public `connect`, or the lazy connect triggered by a send
    Caller,
    /// A reconnect timer
    Scheduled,
}

/// Channels the actor listens on.
#[derive(Debug)]
pub(crate) struct Inputs {
    pub(crate) commands: mpsc::UnboundedReceiver<Command>,
    pub(crate) transport: mpsc::UnboundedReceiver<(Generation, TransportEvent)>,
    pub(crate) timers: mpsc::UnboundedReceiver<Timer>,
}

/// Owns all connection state and is its only mutator.
///
/// Runs as a single task. Client commands, transport events and timer firings
/// are handled one at a time in arrival order, so no two ever race.
pub(crate) struct ConnectionManager<C: Connector> {
    connector: C,
    state: ConnectionState,
    transport: Option<C::Transport>,
    /// Generation of the most recently opened transport
    generation: Generation,
    subscriptions: SubscriptionRegistry,
    queue: OutboundQueue,
    reconnect: ReconnectScheduler,
    heartbeat: HeartbeatMonitor,
    state_tx: watch::Sender<ConnectionState>,
    notifications: broadcast::Sender<Notification>,
    transport_tx: mpsc::UnboundedSender<(Generation, TransportEvent)>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Build the manager and the receiving ends of its input channels.
    pub(crate) fn new(
        connector: C,
        config: &Config,
        commands: mpsc::UnboundedReceiver<Command>,
        state_tx: watch::Sender<ConnectionState>,
        notifications: broadcast::Sender<Notification>,
    ) -> (Self, Inputs) {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();

        let manager = Self {
            connector,
            state: ConnectionState::Disconnected,
            transport: None,
            generation: 0,
            subscriptions: SubscriptionRegistry::default(),
            queue: OutboundQueue::default(),
            reconnect: ReconnectScheduler::new(config.reconnect.clone(), timer_tx.clone()),
            heartbeat: HeartbeatMonitor::new(
                config.heartbeat_interval,
                config.heartbeat_timeout,
                timer_tx,
            ),
            state_tx,
            notifications,
            transport_tx,
        };
        let inputs = Inputs {
            commands,
            transport: transport_rx,
            timers: timer_rx,
        };

        (manager, inputs)
    }

    /// Main event loop. Returns once every `Client` handle is gone.
    pub(crate) async fn run(mut self, mut inputs: Inputs) {
        loop {
            // Transport events first: a command observes every event reported before it.
            tokio::select! {
                biased;

                Some((generation, event)) = inputs.transport.recv() => {
                    self.handle_transport_event(generation, event);
                }
                Some(timer) = inputs.timers.recv() => {
                    self.handle_timer(timer);
                }
                command = inputs.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        None => break,
                    }
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("All client handles dropped, shutting down connection");

        self.heartbeat.stop();
        if let Some(mut transport) = self.transport.take() {
            transport.close(CloseCode::NORMAL, "client dropped");
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.connect(Origin::Caller),
            Command::Disconnect { done } => {
                self.disconnect();
                _ = done.send(());
            }
            Command::Send(text) => self.send(Outbound::new(OutboundKind::Data, text)),
            Command::Subscribe(topics) => {
                let requested = self.subscriptions.add(topics);
                self.send_request(&Request::subscribe(requested), OutboundKind::Subscription);
            }
            Command::Unsubscribe(topics) => {
                let requested = self.subscriptions.remove(topics);
                self.send_request(&Request::unsubscribe(requested), OutboundKind::Subscription);
            }
            Command::Status(reply) => {
                _ = reply.send(self.status());
            }
            Command::ReadyState(reply) => {
                _ = reply.send(self.ready_state());
            }
        }
    }

    fn handle_transport_event(&mut self, generation: Generation, event: TransportEvent) {
        if generation != self.generation {
            #[cfg(feature = "tracing")]
            tracing::trace!(generation, current = self.generation, ?event, "Ignoring event from replaced transport");
            return;
        }

        match event {
            TransportEvent::Opened => self.on_opened(),
            TransportEvent::Closed { code, reason } => self.on_closed(code, reason),
            TransportEvent::Error(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %e, "Transport error");
                self.notify(Notification::Error(Arc::new(e)));
            }
            TransportEvent::Message(text) => self.on_message(&text),
        }
    }

    fn handle_timer(&mut self, timer: Timer) {
        match timer {
            Timer::HeartbeatTick { generation } => {
                if self.state.is_connected() && self.heartbeat.is_current(generation) {
                    self.on_heartbeat_tick();
                }
            }
            Timer::ReconnectDue {
                epoch,
                attempt,
                delay,
            } => {
                // A caller connect already in flight makes this attempt redundant, so no
                // `Reconnecting` is reported for it.
                if !self.reconnect.is_current(epoch) || self.state != ConnectionState::Disconnected
                {
                    return;
                }

                #[cfg(feature = "tracing")]
                tracing::info!(attempt, ?delay, "Reconnecting");
                self.notify(Notification::Reconnecting { attempt, delay });
                self.connect(Origin::Scheduled);
            }
        }
    }

    fn connect(&mut self, origin: Origin) {
        if self.state != ConnectionState::Disconnected {
            return;
        }
        if origin == Origin::Caller {
            self.reconnect.rearm();
        }

        self.generation += 1;
        self.set_state(ConnectionState::Connecting);

        let events = EventSink::new(self.generation, self.transport_tx.clone());
        match self.connector.open(events) {
            Ok(transport) => self.transport = Some(transport),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %e, "Unable to open transport");
                self.transport = None;
                self.set_state(ConnectionState::Disconnected);
                self.notify(Notification::Error(Arc::new(e)));
                self.schedule_reconnect();
            }
        }
    }

    fn disconnect(&mut self) {
        self.heartbeat.stop();
        self.reconnect.disarm();
        if let Some(mut transport) = self.transport.take() {
            transport.close(CloseCode::NORMAL, "client disconnect");
        }
        self.set_state(ConnectionState::Disconnected);
    }

    fn on_opened(&mut self) {
        if self.state != ConnectionState::Connecting {
            return;
        }

        self.set_state(ConnectionState::Connected);
        self.reconnect.reset();

        let discarded = self.queue.discard_superseded();
        #[cfg(feature = "tracing")]
        tracing::debug!(discarded, "Dropped queued control messages superseded by resubscribe");
        #[cfg(not(feature = "tracing"))]
        let _ = discarded;

        self.drain_queue();

        if !self.subscriptions.is_empty() {
            let topics = self.subscriptions.topics();
            #[cfg(feature = "tracing")]
            tracing::debug!(count = topics.len(), "Re-subscribing to topics");
            self.send_request(&Request::subscribe(topics), OutboundKind::Subscription);
        }

        self.heartbeat.start(self.generation);
        self.notify(Notification::Opened);
    }

    fn on_closed(&mut self, code: CloseCode, reason: String) {
        let was_active = self.state != ConnectionState::Disconnected;

        self.heartbeat.stop();
        self.transport = None;
        self.set_state(ConnectionState::Disconnected);

        #[cfg(feature = "tracing")]
        tracing::info!(%code, %reason, was_active, "Connection closed");
        self.notify(Notification::Closed { code, reason });

        if was_active && !code.is_normal() {
            self.schedule_reconnect();
        }
    }

    fn on_message(&mut self, text: &str) {
        match parse_inbound(text.as_bytes()) {
            Ok(Some(Inbound::Pong)) => self.heartbeat.record_pong(),
            Ok(Some(Inbound::Message(value))) => self.notify(Notification::Message(value)),
            Ok(None) => {}
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%text, error = %e, "Failed to parse WebSocket message");
                self.notify(Notification::Error(Arc::new(e)));
            }
        }
    }

    fn on_heartbeat_tick(&mut self) {
        let now = Instant::now();

        if let Some(timeout) = self.heartbeat.overdue(now) {
            #[cfg(feature = "tracing")]
            tracing::warn!("Heartbeat timeout: no PONG received within {timeout:?}");
            self.notify(Notification::Error(Arc::new(
                WsError::HeartbeatTimeout(timeout).into(),
            )));

            if let Some(mut transport) = self.transport.take() {
                transport.close(CloseCode::HEARTBEAT_TIMEOUT, "heartbeat timeout");
            }
            // Late events from the abandoned transport must not touch the next session.
            self.generation += 1;
            self.on_closed(CloseCode::HEARTBEAT_TIMEOUT, "heartbeat timeout".to_owned());
            return;
        }

        self.send_request(&Request::ping(crate::now_millis()), OutboundKind::Heartbeat);
        self.heartbeat.record_ping(now);
    }

    fn schedule_reconnect(&mut self) {
        match self.reconnect.schedule() {
            Scheduled::Pending { attempt, delay } => {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempt, ?delay, "Scheduled reconnect");
                #[cfg(not(feature = "tracing"))]
                let _ = (attempt, delay);
            }
            Scheduled::Exhausted { attempts } => {
                #[cfg(feature = "tracing")]
                tracing::error!(attempts, "Reconnect attempts exhausted");
                self.notify(Notification::ReconnectExhausted { attempts });
            }
        }
    }

    fn send_request(&mut self, request: &Request, kind: OutboundKind) {
        match serde_json::to_string(request) {
            Ok(text) => self.send(Outbound::new(kind, text)),
            Err(e) => self.notify(Notification::Error(Arc::new(e.into()))),
        }
    }

    /// Transmit now if connected and ready, otherwise queue and make sure a
    /// connection is on its way.
    fn send(&mut self, message: Outbound) {
        if self.state.is_connected()
            && let Some(transport) = self.transport.as_mut()
            && transport.ready_state() == ReadyState::Open
        {
            match transport.send(&message.text) {
                Ok(()) => return,
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %e, "Transport rejected message, queueing");
                    self.notify(Notification::Error(Arc::new(e)));
                }
            }
        }

        self.queue.push(message);
        if self.state == ConnectionState::Disconnected {
            self.connect(Origin::Caller);
        }
    }

    fn drain_queue(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };

        let drained = self.queue.drain_into(transport);
        #[cfg(feature = "tracing")]
        tracing::debug!(sent = drained.sent, remaining = self.queue.len(), "Drained outbound queue");
        if let Some(e) = drained.error {
            self.notify(Notification::Error(Arc::new(e)));
        }
    }

    fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: self.state.is_connected(),
            connecting: self.state.is_connecting(),
            attempt_count: self.reconnect.attempt(),
            subscriptions: self.subscriptions.topics(),
            queued_count: self.queue.len(),
        }
    }

    fn ready_state(&self) -> ReadyState {
        self.transport
            .as_ref()
            .map_or(ReadyState::Closed, Transport::ready_state)
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            #[cfg(feature = "tracing")]
            tracing::debug!(from = %self.state, to = %state, "Connection state changed");
            self.state = state;
            _ = self.state_tx.send(state);
        }
        debug_assert!(
            !self.heartbeat.is_active() || self.state.is_connected(),
            "heartbeat must only run while connected"
        );
    }

    fn notify(&self, notification: Notification) {
        // No listeners is fine.
        _ = self.notifications.send(notification);
    }
}
