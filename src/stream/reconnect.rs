use std::time::Duration;

use backoff::backoff::Backoff;
use tokio::sync::mpsc;
use tokio::time::sleep;

use super::connection::Timer;
use crate::ws::config::ReconnectConfig;

/// Deterministic doubling backoff bounded by a maximum number of attempts.
///
/// Attempt `n` waits `base_interval * 2^(n - 1)`; once `max_attempts` delays
/// have been handed out, [`Backoff::next_backoff`] returns `None` until
/// [`Backoff::reset`].
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    config: ReconnectConfig,
    attempt: u32,
}

impl ReconnectBackoff {
    #[must_use]
    pub fn new(config: ReconnectConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Number of delays handed out since the last reset.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.config.max_attempts
    }

    /// Jump straight to the exhausted state.
    pub fn exhaust(&mut self) {
        self.attempt = self.config.max_attempts;
    }
}

impl From<ReconnectConfig> for ReconnectBackoff {
    fn from(config: ReconnectConfig) -> Self {
        Self::new(config)
    }
}

impl Backoff for ReconnectBackoff {
    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        self.attempt += 1;
        Some(self.config.delay_for_attempt(self.attempt))
    }
}

/// Outcome of [`ReconnectScheduler::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scheduled {
    /// A [`Timer::ReconnectDue`] will fire after `delay`
    Pending { attempt: u32, delay: Duration },
    /// No attempts left
    Exhausted { attempts: u32 },
}

/// Schedules delayed reconnect attempts.
///
/// A pending attempt is never cancelled. Each schedule, reset or disarm moves
/// the epoch forward, and a timer whose epoch is no longer current is ignored
/// when it fires.
#[derive(Debug)]
pub(crate) struct ReconnectScheduler {
    backoff: ReconnectBackoff,
    epoch: u64,
    timers: mpsc::UnboundedSender<Timer>,
}

impl ReconnectScheduler {
    pub(crate) fn new(config: ReconnectConfig, timers: mpsc::UnboundedSender<Timer>) -> Self {
        Self {
            backoff: config.into(),
            epoch: 0,
            timers,
        }
    }

    pub(crate) fn attempt(&self) -> u32 {
        self.backoff.attempt()
    }

    pub(crate) fn schedule(&mut self) -> Scheduled {
        let Some(delay) = self.backoff.next_backoff() else {
            return Scheduled::Exhausted {
                attempts: self.backoff.attempt(),
            };
        };

        self.epoch += 1;
        let attempt = self.backoff.attempt();
        let epoch = self.epoch;
        let timers = self.timers.clone();

        tokio::spawn(async move {
            sleep(delay).await;
            _ = timers.send(Timer::ReconnectDue {
                epoch,
                attempt,
                delay,
            });
        });

        Scheduled::Pending { attempt, delay }
    }

    pub(crate) fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    /// A connection opened: start counting from zero again.
    pub(crate) fn reset(&mut self) {
        self.backoff.reset();
        self.epoch += 1;
    }

    /// Manual disconnect: no further automatic attempts until [`Self::rearm`].
    pub(crate) fn disarm(&mut self) {
        self.backoff.exhaust();
        self.epoch += 1;
    }

    /// Caller-initiated connect: a spent budget starts over.
    pub(crate) fn rearm(&mut self) {
        if self.backoff.is_exhausted() {
            self.backoff.reset();
        }
    }
}
