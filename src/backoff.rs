//! Reconnection backoff policy.
//!
//! Delays grow exponentially from a base up to a capped maximum, with
//! randomized jitter so a fleet of consumers does not reconnect against the
//! broker in lockstep after a shared outage. The attempt counter resets to
//! the base delay only once a connection has been held for a stability
//! window, which keeps a flapping broker from being hammered while still
//! recovering quickly from one-off blips.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Reconnection tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Exponential growth factor applied per attempt.
    pub multiplier: f64,
    /// Jitter fraction; 0.2 spreads each delay by ±20%.
    pub jitter: f64,
    /// Minimum connected time before the attempt counter resets to base.
    pub stability_window: Duration,
    /// Maximum reconnection attempts per outage (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.2,
            stability_window: Duration::from_secs(30),
            max_attempts: 0,
        }
    }
}

/// Decides retry timing after connection loss.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt: u32,
    connected_at: Option<Instant>,
}

impl ReconnectPolicy {
    /// Creates a policy with a fresh attempt counter.
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempt: 0,
            connected_at: None,
        }
    }

    /// Deterministic (pre-jitter) delay for the given attempt number.
    ///
    /// Monotonically non-decreasing in `attempt` and capped at the
    /// configured maximum.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = self.config.multiplier.max(1.0).powi(attempt.min(1_000) as i32);
        let secs = self.config.initial_delay.as_secs_f64() * exp;
        Duration::from_secs_f64(secs.min(self.config.max_delay.as_secs_f64()))
    }

    /// Jittered delay for the given attempt number.
    ///
    /// The jitter spreads the capped base delay by the configured fraction;
    /// the result is clamped back to the maximum so the configured cap
    /// holds absolutely.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.config.jitter <= 0.0 {
            return base;
        }
        let spread = (rand::rng().random::<f64>() - 0.5) * 2.0 * self.config.jitter;
        let secs = (base.as_secs_f64() * (1.0 + spread)).max(0.0);
        Duration::from_secs_f64(secs.min(self.config.max_delay.as_secs_f64()))
    }

    /// Returns the delay for the next attempt and advances the counter.
    pub fn delay_for_next_attempt(&mut self) -> Duration {
        let delay = self.next_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Number of attempts made in the current outage.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Returns true once `max_attempts` is reached (never when unlimited).
    pub fn attempts_exhausted(&self) -> bool {
        self.config.max_attempts != 0 && self.attempt >= self.config.max_attempts
    }

    /// Records a successful connection; pairs with [`Self::note_disconnected`].
    pub fn note_connected(&mut self) {
        self.connected_at = Some(Instant::now());
    }

    /// Records connection loss.
    ///
    /// Resets the attempt counter only if the connection was held at least
    /// the stability window.
    pub fn note_disconnected(&mut self) {
        if let Some(connected_at) = self.connected_at.take() {
            if connected_at.elapsed() >= self.config.stability_window {
                self.reset();
            }
        }
    }

    /// Clears the attempt counter unconditionally.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.2,
            stability_window: Duration::from_millis(50),
            max_attempts: 0,
        }
    }

    #[test]
    fn base_delay_grows_exponentially_to_cap() {
        let policy = ReconnectPolicy::new(test_config());
        assert_eq!(policy.base_delay(0), Duration::from_millis(100));
        assert_eq!(policy.base_delay(1), Duration::from_millis(200));
        assert_eq!(policy.base_delay(2), Duration::from_millis(400));
        // 100ms * 2^7 = 12.8s, capped at 10s.
        assert_eq!(policy.base_delay(7), Duration::from_secs(10));
        assert_eq!(policy.base_delay(100), Duration::from_secs(10));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = ReconnectPolicy::new(test_config());
        for attempt in 0..10 {
            let base = policy.base_delay(attempt).as_secs_f64();
            for _ in 0..50 {
                let jittered = policy.next_delay(attempt).as_secs_f64();
                assert!(jittered >= base * 0.8 - f64::EPSILON);
                assert!(jittered <= (base * 1.2).min(10.0) + f64::EPSILON);
            }
        }
    }

    #[test]
    fn no_jitter_is_deterministic() {
        let mut config = test_config();
        config.jitter = 0.0;
        let policy = ReconnectPolicy::new(config);
        assert_eq!(policy.next_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn attempt_counter_advances_and_exhausts() {
        let mut config = test_config();
        config.max_attempts = 3;
        let mut policy = ReconnectPolicy::new(config);
        assert!(!policy.attempts_exhausted());
        for _ in 0..3 {
            policy.delay_for_next_attempt();
        }
        assert_eq!(policy.attempts(), 3);
        assert!(policy.attempts_exhausted());
        policy.reset();
        assert!(!policy.attempts_exhausted());
    }

    #[test]
    fn stable_connection_resets_backoff() {
        let mut policy = ReconnectPolicy::new(test_config());
        policy.delay_for_next_attempt();
        policy.delay_for_next_attempt();
        assert_eq!(policy.attempts(), 2);

        policy.note_connected();
        std::thread::sleep(Duration::from_millis(60));
        policy.note_disconnected();
        assert_eq!(policy.attempts(), 0);
    }

    #[test]
    fn short_lived_connection_keeps_backoff() {
        let mut policy = ReconnectPolicy::new(test_config());
        policy.delay_for_next_attempt();
        policy.delay_for_next_attempt();

        policy.note_connected();
        policy.note_disconnected();
        assert_eq!(policy.attempts(), 2);
    }
}
