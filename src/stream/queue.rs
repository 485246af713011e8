use std::collections::VecDeque;

use crate::error::Error;
use crate::ws::{ReadyState, Transport};

/// What an outbound frame is for. Decides whether it survives a reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutboundKind {
    /// Application payload passed to `send`
    Data,
    /// Subscribe or unsubscribe control message
    Subscription,
    /// Heartbeat ping
    Heartbeat,
}

#[derive(Debug, Clone)]
pub(crate) struct Outbound {
    pub(crate) kind: OutboundKind,
    pub(crate) text: String,
}

impl Outbound {
    pub(crate) fn new(kind: OutboundKind, text: String) -> Self {
        Self { kind, text }
    }
}

/// Result of a [`OutboundQueue::drain_into`] pass.
#[derive(Debug, Default)]
pub(crate) struct Drained {
    pub(crate) sent: usize,
    /// Set when the transport rejected the head message. It stays queued.
    pub(crate) error: Option<Error>,
}

/// FIFO buffer of frames waiting for an open transport.
///
/// Unbounded. A frame leaves the queue only once the transport accepts it.
#[derive(Debug, Default)]
pub(crate) struct OutboundQueue {
    messages: VecDeque<Outbound>,
}

impl OutboundQueue {
    pub(crate) fn push(&mut self, message: Outbound) {
        self.messages.push_back(message);
    }

    pub(crate) fn len(&self) -> usize {
        self.messages.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop control traffic that a fresh session replaces: subscription deltas
    /// (superseded by the full resubscribe) and pings from a dead session.
    /// Returns how many frames were dropped.
    pub(crate) fn discard_superseded(&mut self) -> usize {
        let before = self.messages.len();
        self.messages
            .retain(|message| message.kind == OutboundKind::Data);
        before - self.messages.len()
    }

    /// Hand frames to `transport` head first until the queue is empty or the
    /// transport stops being ready.
    pub(crate) fn drain_into<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Drained {
        let mut drained = Drained::default();

        while let Some(head) = self.messages.front() {
            if transport.ready_state() != ReadyState::Open {
                break;
            }

            match transport.send(&head.text) {
                Ok(()) => {
                    self.messages.pop_front();
                    drained.sent += 1;
                }
                Err(e) => {
                    drained.error = Some(e);
                    break;
                }
            }
        }

        drained
    }
}
