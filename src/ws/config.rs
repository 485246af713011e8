#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use bon::Builder;

const DEFAULT_HEARTBEAT_INTERVAL_DURATION: Duration = Duration::from_secs(30);
const DEFAULT_RECONNECT_BASE_INTERVAL_DURATION: Duration = Duration::from_secs(1);
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_NOTIFICATION_CAPACITY: usize = 1024;

/// Configuration for streaming client behavior.
///
/// Fixed at construction; the client never mutates it afterwards.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Interval for sending `ping` messages while connected
    #[builder(default = DEFAULT_HEARTBEAT_INTERVAL_DURATION)]
    pub heartbeat_interval: Duration,
    /// Maximum time to wait for a `pong` after a `ping` before the session is
    /// considered dead. `None` disables the check.
    pub heartbeat_timeout: Option<Duration>,
    /// Reconnection strategy configuration
    #[builder(default)]
    pub reconnect: ReconnectConfig,
    /// Capacity of the notification broadcast channel. Slow listeners that fall
    /// further behind than this observe a lag error.
    #[builder(default = DEFAULT_NOTIFICATION_CAPACITY)]
    pub notification_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL_DURATION,
            heartbeat_timeout: None,
            reconnect: ReconnectConfig::default(),
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

/// Configuration for automatic reconnection behavior.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Attempt `n` waits
    /// `base_interval * 2^(n - 1)`.
    #[builder(default = DEFAULT_RECONNECT_BASE_INTERVAL_DURATION)]
    pub base_interval: Duration,
    /// Maximum number of reconnection attempts before giving up.
    #[builder(default = DEFAULT_MAX_RECONNECT_ATTEMPTS)]
    pub max_attempts: u32,
    /// Upper bound on a single backoff delay. `None` means uncapped.
    pub max_backoff: Option<Duration>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_interval: DEFAULT_RECONNECT_BASE_INTERVAL_DURATION,
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            max_backoff: None,
        }
    }
}

impl ReconnectConfig {
    /// Backoff delay for the given 1-based attempt number.
    ///
    /// Saturates at [`Duration::MAX`] instead of overflowing, then applies
    /// `max_backoff` if one is configured.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let delay = 2_u32
            .checked_pow(exponent)
            .and_then(|factor| self.base_interval.checked_mul(factor))
            .unwrap_or(Duration::MAX);

        match self.max_backoff {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_sequence_doubles() {
        let config = ReconnectConfig::builder()
            .base_interval(Duration::from_millis(1000))
            .build();

        let delays: Vec<_> = (1..=4).map(|n| config.delay_for_attempt(n)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
                Duration::from_millis(8000),
            ]
        );
    }

    #[test]
    fn backoff_respects_max() {
        let config = ReconnectConfig::builder()
            .base_interval(Duration::from_secs(1))
            .max_backoff(Duration::from_secs(3))
            .build();

        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(3));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(3));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let config = ReconnectConfig::default();

        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::MAX);
    }

    #[test]
    fn default_config_values() {
        let config = Config::default();

        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.heartbeat_timeout, None);
        assert_eq!(config.reconnect.base_interval, Duration::from_secs(1));
        assert_eq!(config.reconnect.max_attempts, 5);
    }

    #[test]
    fn builder_matches_default() {
        let built = Config::builder().build();
        let default = Config::default();

        assert_eq!(built.heartbeat_interval, default.heartbeat_interval);
        assert_eq!(built.notification_capacity, default.notification_capacity);
        assert_eq!(built.reconnect.max_attempts, default.reconnect.max_attempts);
    }
}
