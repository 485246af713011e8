use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::{CancellationToken, DropGuard};

use super::connection::Timer;
use crate::ws::Generation;

/// The recurring ping task of one connected session.
#[derive(Debug)]
struct Session {
    generation: Generation,
    /// Cancels the ticker task when dropped.
    _guard: DropGuard,
    /// Sent time of the oldest ping that has not been answered yet.
    awaiting_pong_since: Option<Instant>,
}

/// Emits [`Timer::HeartbeatTick`] at a fixed interval while a session is connected.
///
/// At most one ticker exists at a time; starting a new session cancels the
/// previous one, so tick timing never carries over between connections.
#[derive(Debug)]
pub(crate) struct HeartbeatMonitor {
    interval: Duration,
    timeout: Option<Duration>,
    timers: mpsc::UnboundedSender<Timer>,
    session: Option<Session>,
}

impl HeartbeatMonitor {
    pub(crate) fn new(
        interval: Duration,
        timeout: Option<Duration>,
        timers: mpsc::UnboundedSender<Timer>,
    ) -> Self {
        Self {
            interval,
            timeout,
            timers,
            session: None,
        }
    }

    pub(crate) fn start(&mut self, generation: Generation) {
        self.stop();

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let timers = self.timers.clone();
        let period = self.interval;

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        if timers.send(Timer::HeartbeatTick { generation }).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        self.session = Some(Session {
            generation,
            _guard: token.drop_guard(),
            awaiting_pong_since: None,
        });
    }

    pub(crate) fn stop(&mut self) {
        self.session = None;
    }

    pub(crate) fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Whether a tick belongs to the running session.
    pub(crate) fn is_current(&self, generation: Generation) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.generation == generation)
    }

    pub(crate) fn record_ping(&mut self, now: Instant) {
        if let Some(session) = self.session.as_mut() {
            session.awaiting_pong_since.get_or_insert(now);
        }
    }

    pub(crate) fn record_pong(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.awaiting_pong_since = None;
        }
    }

    /// The configured timeout, if a ping has gone unanswered for at least that long.
    pub(crate) fn overdue(&self, now: Instant) -> Option<Duration> {
        let timeout = self.timeout?;
        let since = self.session.as_ref()?.awaiting_pong_since?;
        (now.saturating_duration_since(since) >= timeout).then_some(timeout)
    }
}
