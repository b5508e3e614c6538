//! Error types for the feed consumer core.
//!
//! The taxonomy follows three propagation rules: connection-level errors
//! trigger reconnection and never escape the receiver, protocol-level errors
//! are recorded and skipped while the connection stays up, and handler-level
//! errors are isolated per item and never crash the consumer loop. Nothing
//! in this crate is fatal to the process.

use std::error::Error as StdError;

/// Coarse classification used for routing decisions.
///
/// The receiver reconnects on `Connection`, skips on `Protocol`, and the
/// consumer loop isolates `Handler` failures per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedErrorKind {
    /// Transport-level failure, triggers reconnection.
    Connection,
    /// Malformed frame, connection remains up.
    Protocol,
    /// Downstream consumer failure, isolated per item.
    Handler,
    /// Invalid configuration or lifecycle misuse.
    Config,
}

/// Feed-specific error type.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The transport lost its connection to the broker.
    #[error("connection lost: {detail}")]
    ConnectionLost {
        detail: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// A frame could not be read or decoded at the transport level.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A downstream frame handler failed.
    #[error("handler failed: {detail}")]
    Handler {
        detail: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The receiver was started while already running.
    #[error("receiver is already running")]
    AlreadyRunning,
}

impl FeedError {
    /// Creates a connection-lost error from a short description.
    pub fn connection_lost(detail: impl Into<String>) -> Self {
        Self::ConnectionLost {
            detail: detail.into(),
            source: None,
        }
    }

    /// Creates a connection-lost error wrapping an underlying cause.
    pub fn connection_lost_with(
        detail: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::ConnectionLost {
            detail: detail.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a protocol error from a short description.
    pub fn protocol(detail: impl Into<String>) -> Self {
        Self::Protocol(detail.into())
    }

    /// Wraps a failed handler result.
    ///
    /// The cause is preserved opaquely; `detail` carries its rendered form
    /// so the error queue entry is readable without downcasting.
    pub fn handler(source: anyhow::Error) -> Self {
        Self::Handler {
            detail: source.to_string(),
            source: Some(source.into()),
        }
    }

    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> FeedErrorKind {
        match self {
            Self::ConnectionLost { .. } => FeedErrorKind::Connection,
            Self::Protocol(_) => FeedErrorKind::Protocol,
            Self::Handler { .. } => FeedErrorKind::Handler,
            Self::Config(_) | Self::AlreadyRunning => FeedErrorKind::Config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_classification() {
        assert_eq!(
            FeedError::connection_lost("socket closed").kind(),
            FeedErrorKind::Connection
        );
        assert_eq!(
            FeedError::protocol("truncated frame").kind(),
            FeedErrorKind::Protocol
        );
        assert_eq!(
            FeedError::handler(anyhow::anyhow!("boom")).kind(),
            FeedErrorKind::Handler
        );
        assert_eq!(
            FeedError::Config("bad url".to_string()).kind(),
            FeedErrorKind::Config
        );
        assert_eq!(FeedError::AlreadyRunning.kind(), FeedErrorKind::Config);
    }

    #[test]
    fn display_includes_detail() {
        let err = FeedError::connection_lost("socket closed");
        assert_eq!(err.to_string(), "connection lost: socket closed");

        let err = FeedError::handler(anyhow::anyhow!("deserialization failed"));
        assert!(err.to_string().contains("deserialization failed"));
    }

    #[test]
    fn source_is_preserved() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let err = FeedError::connection_lost_with("write failed", io_err);
        assert!(std::error::Error::source(&err).is_some());
    }
}
