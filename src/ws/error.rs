#![expect(
    clippy::module_name_repetitions,
    reason = "Error types include the module name to indicate their scope"
)]

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

/// WebSocket error variants.
#[non_exhaustive]
#[derive(Debug)]
pub enum WsError {
    /// Error connecting to or communicating with the WebSocket server
    Connection(tokio_tungstenite::tungstenite::Error),
    /// Error parsing an inbound WebSocket message
    MessageParse(serde_json::Error),
    /// The transport is not in the `Open` state and cannot accept frames
    NotReady,
    /// WebSocket connection was closed
    ConnectionClosed,
    /// No `pong` arrived within the configured heartbeat timeout
    HeartbeatTimeout(Duration),
    /// Listener lagged and missed messages
    Lagged {
        /// Number of messages that were missed
        count: u64,
    },
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "WebSocket connection error: {e}"),
            Self::MessageParse(e) => write!(f, "Failed to parse WebSocket message: {e}"),
            Self::NotReady => write!(f, "WebSocket transport is not ready"),
            Self::ConnectionClosed => write!(f, "WebSocket connection closed"),
            Self::HeartbeatTimeout(timeout) => {
                write!(f, "No PONG received within {timeout:?}")
            }
            Self::Lagged { count } => write!(f, "Listener lagged, missed {count} messages"),
        }
    }
}

impl StdError for WsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Connection(e) => Some(e),
            Self::MessageParse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WsError> for crate::error::Error {
    fn from(e: WsError) -> Self {
        let kind = match e {
            WsError::MessageParse(_) => crate::error::Kind::Decode,
            _ => crate::error::Kind::WebSocket,
        };
        crate::error::Error::with_source(kind, e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for crate::error::Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        crate::error::Error::with_source(crate::error::Kind::WebSocket, WsError::Connection(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Kind};

    #[test]
    fn parse_error_maps_to_decode_kind() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: Error = WsError::MessageParse(parse).into();

        assert_eq!(error.kind(), Kind::Decode);
        assert!(error.to_string().contains("Failed to parse WebSocket message"));
    }

    #[test]
    fn not_ready_maps_to_websocket_kind() {
        let error: Error = WsError::NotReady.into();

        assert_eq!(error.kind(), Kind::WebSocket);
        assert!(matches!(
            error.downcast_ref::<WsError>(),
            Some(WsError::NotReady)
        ));
    }
}
