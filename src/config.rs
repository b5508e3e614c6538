//! Configuration for the feed consumer core.
//!
//! [`FeedConfig`] is a plain record; loading it from files or the
//! environment is the caller's concern. `validate()` catches mistakes that
//! would otherwise surface as confusing runtime behavior (empty topic,
//! zero-capacity queues, a backoff that shrinks).

use crate::backoff::ReconnectConfig;
use crate::error::FeedError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Behavior when the message queue is full.
///
/// `Block` stalls the receive loop until the consumer drains, pushing
/// backpressure to the broker; `DropNewest` sheds the incoming frame and
/// counts it in `ReceiverStatus::total_dropped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Wait for queue space (at-least-once bias). Default.
    Block,
    /// Drop the incoming frame and keep receiving.
    DropNewest,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        Self::Block
    }
}

/// Configuration for the receiver and consumer loop.
///
/// # Examples
///
/// ```rust
/// use railfeed::FeedConfig;
///
/// let config = FeedConfig {
///     url: "tcp://datafeeds.example.net:61616".to_string(),
///     topic: "feed/pushport/v16".to_string(),
///     queue_capacity: 100,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Broker connection URL.
    pub url: String,

    /// Username for broker authentication.
    pub username: String,

    /// Password for broker authentication. Redacted from Debug output.
    pub password: String,

    /// Topic to subscribe to.
    pub topic: String,

    /// Capacity of the message queue.
    pub queue_capacity: usize,

    /// Capacity of the error queue.
    pub error_queue_capacity: usize,

    /// What to do when the message queue is full.
    pub overflow_policy: OverflowPolicy,

    /// Upper bound on a single blocking receive; also bounds shutdown
    /// latency, since stop requests are observed at timeout boundaries.
    pub receive_timeout: Duration,

    /// Cadence of the consumer loop's status report.
    pub status_interval: Duration,

    /// Time-boxed slice per consumer drain pass, bounding processing
    /// latency for the caller.
    pub drain_slice: Duration,

    /// Reconnection backoff tuning.
    pub reconnect: ReconnectConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            topic: String::new(),
            queue_capacity: 100,
            error_queue_capacity: 100,
            overflow_policy: OverflowPolicy::default(),
            receive_timeout: Duration::from_secs(1),
            status_interval: Duration::from_millis(500),
            drain_slice: Duration::from_millis(100),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl FeedConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::Config` describing the first problem found.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.url.is_empty() {
            return Err(FeedError::Config("url must not be empty".to_string()));
        }
        if self.topic.is_empty() {
            return Err(FeedError::Config("topic must not be empty".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(FeedError::Config(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.error_queue_capacity == 0 {
            return Err(FeedError::Config(
                "error_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.receive_timeout.is_zero() {
            return Err(FeedError::Config(
                "receive_timeout must be non-zero".to_string(),
            ));
        }
        if self.reconnect.multiplier < 1.0 {
            return Err(FeedError::Config(
                "reconnect.multiplier must be at least 1.0".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.reconnect.jitter) {
            return Err(FeedError::Config(
                "reconnect.jitter must be in [0.0, 1.0)".to_string(),
            ));
        }
        if self.reconnect.initial_delay > self.reconnect.max_delay {
            return Err(FeedError::Config(
                "reconnect.initial_delay must not exceed reconnect.max_delay".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for FeedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("topic", &self.topic)
            .field("queue_capacity", &self.queue_capacity)
            .field("error_queue_capacity", &self.error_queue_capacity)
            .field("overflow_policy", &self.overflow_policy)
            .field("receive_timeout", &self.receive_timeout)
            .field("status_interval", &self.status_interval)
            .field("drain_slice", &self.drain_slice)
            .field("reconnect", &self.reconnect)
            .finish()
    }
}
