use serde::Serialize;
use serde_json::Value;

use crate::{Result, TimestampMillis};

/// Control message sent by the client.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Request {
    /// Start receiving events for the listed topics
    Subscribe {
        /// Topic identifiers (e.g. ticker symbols)
        symbols: Vec<String>,
    },
    /// Stop receiving events for the listed topics
    Unsubscribe {
        /// Topic identifiers (e.g. ticker symbols)
        symbols: Vec<String>,
    },
    /// Liveness probe
    Ping {
        /// Unix timestamp in milliseconds
        timestamp: TimestampMillis,
    },
}

impl Request {
    /// Create a subscribe request.
    #[must_use]
    pub fn subscribe(symbols: Vec<String>) -> Self {
        Self::Subscribe { symbols }
    }

    /// Create an unsubscribe request.
    #[must_use]
    pub fn unsubscribe(symbols: Vec<String>) -> Self {
        Self::Unsubscribe { symbols }
    }

    /// Create a ping stamped with `timestamp`.
    #[must_use]
    pub fn ping(timestamp: TimestampMillis) -> Self {
        Self::Ping { timestamp }
    }
}

/// Application payload accepted by `Client::send`.
///
/// Text is sent verbatim; JSON values are serialized first.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Already-serialized frame
    Text(String),
    /// Structured value to serialize
    Json(Value),
}

impl Payload {
    /// Serialize into the frame that goes on the wire.
    pub fn into_text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Json(value) => Ok(serde_json::to_string(&value)?),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}
