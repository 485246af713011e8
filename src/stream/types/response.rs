use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::Error;
use crate::ws::{CloseCode, WsError};

/// Value of the `type` discriminator on heartbeat replies.
const PONG_TYPE: &str = "pong";

/// A decoded inbound frame.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Heartbeat reply, consumed by the client
    Pong,
    /// Anything else, forwarded to the application untouched
    Message(Value),
}

impl Inbound {
    #[must_use]
    pub fn is_pong(&self) -> bool {
        matches!(self, Self::Pong)
    }
}

/// Decode an inbound frame.
///
/// Returns `Ok(None)` for empty or whitespace-only input (server keepalives).
pub fn parse_inbound(bytes: &[u8]) -> crate::Result<Option<Inbound>> {
    let trimmed = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map_or(&[][..], |start| &bytes[start..]);

    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_slice(trimmed).map_err(WsError::MessageParse)?;
    if value.get("type").and_then(Value::as_str) == Some(PONG_TYPE) {
        return Ok(Some(Inbound::Pong));
    }

    Ok(Some(Inbound::Message(value)))
}

/// Event observable by the application that owns a client.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum Notification {
    /// The connection is open and the subscription set has been re-announced
    Opened,
    /// The connection closed
    Closed {
        /// Close status code
        code: CloseCode,
        /// Close reason, possibly empty
        reason: String,
    },
    /// A transport fault or an undecodable inbound frame. Never changes state on its own.
    Error(Arc<Error>),
    /// Application message from the remote side
    Message(Value),
    /// A scheduled reconnect fired and a new connection is being opened
    Reconnecting {
        /// 1-based attempt number
        attempt: u32,
        /// Backoff delay that preceded this attempt
        delay: Duration,
    },
    /// Automatic reconnection gave up. Call `Client::connect` to resume.
    ReconnectExhausted {
        /// Number of attempts made
        attempts: u32,
    },
}
