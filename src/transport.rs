//! Broker connection seam.
//!
//! [`FeedTransport`] is the boundary between this crate and whichever
//! messaging client actually speaks to the broker. The receiver owns the
//! transport exclusively and drives it from a single task, so
//! implementations need `&mut self` but no internal synchronization.
//!
//! # Failure semantics
//!
//! Any transport-level failure must flip `is_connected()` to false and
//! surface as [`FeedError::ConnectionLost`] from the in-flight call.
//! Implementations never retry internally; reconnection timing belongs to
//! the receiver's backoff policy. A receive timeout is not a failure: it
//! returns `Ok(None)` with the connection still up.

use crate::error::FeedError;
use crate::frame::RawFrame;
use async_trait::async_trait;
use std::time::Duration;

/// A single logical connection to a broker topic.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Establishes the connection using the credentials the implementation
    /// was built with.
    async fn connect(&mut self) -> Result<(), FeedError>;

    /// Subscribes to the given topic on an established connection.
    async fn subscribe(&mut self, topic: &str) -> Result<(), FeedError>;

    /// Waits up to `timeout` for the next frame.
    ///
    /// Returns `Ok(None)` on timeout. Must not block past the timeout, so
    /// the receiver's shutdown latency stays bounded by it.
    async fn receive_next(&mut self, timeout: Duration) -> Result<Option<RawFrame>, FeedError>;

    /// Tears the connection down.
    ///
    /// Idempotent and safe to call from any state, including after a
    /// failure or on a never-connected transport.
    async fn disconnect(&mut self);

    /// Returns the current transport-level connection health.
    fn is_connected(&self) -> bool;
}
