pub mod request;
pub mod response;

pub use request::{Payload, Request};
pub use response::{Inbound, Notification, parse_inbound};
