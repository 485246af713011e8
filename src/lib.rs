#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod error;
pub mod stream;
pub mod ws;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Timestamp in milliseconds since [`std::time::UNIX_EPOCH`]
pub(crate) type TimestampMillis = i64;

/// Current wall-clock time in milliseconds, as carried by heartbeat pings.
pub(crate) fn now_millis() -> TimestampMillis {
    chrono::Utc::now().timestamp_millis()
}
