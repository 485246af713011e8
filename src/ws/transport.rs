//! Transport adapter contract.
//!
//! The streaming state machine never touches a socket directly. It asks a
//! [`Connector`] to open a [`Transport`], writes frames through it, and reacts
//! to the [`TransportEvent`]s the transport reports through its [`EventSink`].

use std::fmt;

use tokio::sync::mpsc;

use crate::Result;
use crate::error::Error;

/// Identifies one transport instance. Every call to [`Connector::open`] gets a
/// fresh generation so late events from a replaced transport can be told apart.
pub type Generation = u64;

/// Readiness of a transport, mirroring the WebSocket `readyState` values.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[repr(u8)]
pub enum ReadyState {
    /// Opening handshake in progress
    Connecting = 0,
    /// Frames can be sent
    Open = 1,
    /// Closing handshake in progress
    Closing = 2,
    /// Closed or never opened
    Closed = 3,
}

impl ReadyState {
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Inverse of [`ReadyState::as_u8`]. Unknown values map to `Closed`.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// WebSocket close status code.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseCode(u16);

impl CloseCode {
    /// Deliberate, graceful shutdown. The only code that never triggers a reconnect.
    pub const NORMAL: Self = Self(1000);
    /// Endpoint is going away
    pub const GOING_AWAY: Self = Self(1001);
    /// Close frame carried no status code
    pub const NO_STATUS: Self = Self(1005);
    /// Connection dropped without a close frame
    pub const ABNORMAL: Self = Self(1006);
    /// Local heartbeat monitor declared the session dead
    pub const HEARTBEAT_TIMEOUT: Self = Self(4000);

    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn is_normal(self) -> bool {
        self.0 == Self::NORMAL.0
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event reported by a transport.
#[non_exhaustive]
#[derive(Debug)]
pub enum TransportEvent {
    /// The connection is established and frames can be sent
    Opened,
    /// The connection terminated
    Closed {
        /// Close status code
        code: CloseCode,
        /// Close reason, possibly empty
        reason: String,
    },
    /// A transport-level fault. A `Closed` event may or may not follow.
    Error(Error),
    /// A text frame arrived
    Message(String),
}

/// Channel a transport reports its events through.
///
/// Every event is stamped with the generation of the transport it belongs to.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: Generation,
    tx: mpsc::UnboundedSender<(Generation, TransportEvent)>,
}

impl EventSink {
    #[must_use]
    pub fn new(
        generation: Generation,
        tx: mpsc::UnboundedSender<(Generation, TransportEvent)>,
    ) -> Self {
        Self { generation, tx }
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Report an event. Returns `false` once the client has shut down.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }

    pub fn opened(&self) -> bool {
        self.emit(TransportEvent::Opened)
    }

    pub fn closed<R: Into<String>>(&self, code: CloseCode, reason: R) -> bool {
        self.emit(TransportEvent::Closed {
            code,
            reason: reason.into(),
        })
    }

    pub fn error<E: Into<Error>>(&self, error: E) -> bool {
        self.emit(TransportEvent::Error(error.into()))
    }

    pub fn message<T: Into<String>>(&self, text: T) -> bool {
        self.emit(TransportEvent::Message(text.into()))
    }
}

/// A single full-duplex connection.
pub trait Transport: Send + 'static {
    /// Hand a text frame to the transport.
    ///
    /// Must fail without side effects when [`Transport::ready_state`] is not `Open`.
    fn send(&mut self, text: &str) -> Result<()>;

    /// Begin the closing handshake. Completion is reported as a
    /// [`TransportEvent::Closed`] through the transport's [`EventSink`].
    fn close(&mut self, code: CloseCode, reason: &str);

    fn ready_state(&self) -> ReadyState;
}

/// Factory for [`Transport`]s.
pub trait Connector: Send + 'static {
    type Transport: Transport;

    /// Start opening a new transport.
    ///
    /// Returns immediately; the outcome of the handshake is reported through
    /// `events`. An `Err` means the transport could not even be constructed.
    fn open(&mut self, events: EventSink) -> Result<Self::Transport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_state_round_trips_through_u8() {
        for state in [
            ReadyState::Connecting,
            ReadyState::Open,
            ReadyState::Closing,
            ReadyState::Closed,
        ] {
            assert_eq!(ReadyState::from_u8(state.as_u8()), state);
        }
        assert_eq!(ReadyState::from_u8(42), ReadyState::Closed);
    }

    #[test]
    fn only_1000_is_normal() {
        assert!(CloseCode::NORMAL.is_normal());
        assert!(!CloseCode::GOING_AWAY.is_normal());
        assert!(!CloseCode::ABNORMAL.is_normal());
        assert!(!CloseCode::new(4001).is_normal());
    }

    #[test]
    fn sink_stamps_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(7, tx);

        assert!(sink.message("hello"));
        let (generation, event) = rx.try_recv().unwrap();
        assert_eq!(generation, 7);
        assert!(matches!(event, TransportEvent::Message(text) if text == "hello"));
    }

    #[test]
    fn sink_reports_shutdown() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(1, tx);
        drop(rx);

        assert!(!sink.opened());
    }
}
