//! Resilient streaming client.
//!
//! A [`Client`] keeps one long-lived connection to a streaming endpoint and
//! hides its failures from the application:
//!
//! - connections are opened lazily, on the first send or subscribe
//! - messages sent while offline are queued and flushed in order once open
//! - the subscription set survives reconnects and is re-announced as one message
//! - abnormal closes are retried with exponential backoff up to a bounded budget
//! - a periodic `ping` keeps the session alive; `pong` replies are never forwarded
//!
//! All connection state lives in a single background task. Client calls,
//! transport events and timers are handled there one at a time.

pub mod client;
mod connection;
mod heartbeat;
mod queue;
pub mod reconnect;
mod subscription;
pub mod types;

pub use client::Client;
pub use connection::{ConnectionState, ConnectionStatus};
pub use reconnect::ReconnectBackoff;
pub use types::{Inbound, Notification, Payload, Request, parse_inbound};
