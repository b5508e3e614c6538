//! Raw frame data model.
//!
//! A [`RawFrame`] is the unit handed from the transport to the receiver: an
//! opaque payload tagged with its transport-level kind plus the receive
//! timestamp. Classification happens exactly once, at the transport
//! boundary, into a closed variant set, so downstream code matches on the
//! enum and never inspects payload types dynamically. Kinds the transport
//! does not recognize are tagged [`FramePayload::Unsupported`] rather than
//! rejected; the receiver enqueues them like any other frame.

use std::time::SystemTime;

/// Transport-level frame kind, used for counting and dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Text,
    Bytes,
    Unsupported,
}

/// Frame payload, classified once at receive time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    /// A text frame. Most binary feeds should never send these, but they
    /// are accepted and counted rather than dropped.
    Text(String),
    /// A binary frame, the normal case for push-port style feeds.
    Bytes(Vec<u8>),
    /// A frame of a kind the transport did not recognize; the raw content
    /// is kept as-is for diagnostics.
    Unsupported(Vec<u8>),
}

impl FramePayload {
    /// Returns the kind tag for this payload.
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Text(_) => FrameKind::Text,
            Self::Bytes(_) => FrameKind::Bytes,
            Self::Unsupported(_) => FrameKind::Unsupported,
        }
    }

    /// Returns the payload length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Bytes(b) | Self::Unsupported(b) => b.len(),
        }
    }

    /// Returns true if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single frame received from the feed, immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// The classified payload.
    pub payload: FramePayload,
    /// When the transport handed the frame to the receiver.
    pub received_at: SystemTime,
}

impl RawFrame {
    /// Creates a frame timestamped now.
    pub fn new(payload: FramePayload) -> Self {
        Self {
            payload,
            received_at: SystemTime::now(),
        }
    }

    /// Creates a text frame timestamped now.
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(FramePayload::Text(content.into()))
    }

    /// Creates a binary frame timestamped now.
    pub fn bytes(content: impl Into<Vec<u8>>) -> Self {
        Self::new(FramePayload::Bytes(content.into()))
    }

    /// Creates an unsupported frame timestamped now.
    pub fn unsupported(content: impl Into<Vec<u8>>) -> Self {
        Self::new(FramePayload::Unsupported(content.into()))
    }

    /// Returns the kind tag of the payload.
    pub fn kind(&self) -> FrameKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_payload() {
        assert_eq!(RawFrame::text("hello").kind(), FrameKind::Text);
        assert_eq!(RawFrame::bytes(vec![1, 2, 3]).kind(), FrameKind::Bytes);
        assert_eq!(
            RawFrame::unsupported(vec![0xff]).kind(),
            FrameKind::Unsupported
        );
    }

    #[test]
    fn payload_length() {
        assert_eq!(FramePayload::Text("abc".to_string()).len(), 3);
        assert_eq!(FramePayload::Bytes(vec![0; 10]).len(), 10);
        assert!(FramePayload::Bytes(Vec::new()).is_empty());
    }
}
