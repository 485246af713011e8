//! Core WebSocket infrastructure.
//!
//! This module defines the transport contract the streaming client is written
//! against, plus a `tokio-tungstenite` implementation of it.
//!
//! # Architecture
//!
//! - [`Connector`] / [`Transport`]: open, send, close and readiness of one connection
//! - [`EventSink`]: how a transport reports `opened`, `closed`, `error` and `message` events
//! - [`WebSocketConnector`]: the bundled WebSocket transport
//!
//! # Example
//!
//! ```ignore
//! struct MyConnector;
//!
//! impl Connector for MyConnector {
//!     type Transport = MyTransport;
//!
//!     fn open(&mut self, events: EventSink) -> Result<MyTransport> { /* ... */ }
//! }
//!
//! let client = Client::new(MyConnector, Config::default())?;
//! ```

pub mod config;
pub mod error;
pub mod transport;
pub mod websocket;

#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use transport::{
    CloseCode, Connector, EventSink, Generation, ReadyState, Transport, TransportEvent,
};
pub use websocket::{WebSocketConnector, WebSocketTransport};
