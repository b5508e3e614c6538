//! # Railfeed
//!
//! A resilient, reconnecting publish/subscribe feed consumer core with
//! bounded buffering, backpressure, and ordered at-least-once delivery to
//! downstream processing. Built for push-port style rail data feeds, but
//! broker-agnostic: the connection is a trait seam and payload
//! deserialization stays with the caller.
//!
//! ## Overview
//!
//! - [`FeedTransport`] trait for pluggable broker clients
//! - [`Receiver`] background task: connect, subscribe, pump frames,
//!   reconnect with capped exponential backoff and jitter
//! - [`BoundedQueue`] hand-off between the receive and consume sides, with
//!   an explicit block-or-drop overflow policy
//! - [`ConsumerLoop`] caller-side drain loop with handler-failure isolation
//!   and periodic status reporting
//! - [`ReceiverStatus`] lock-free status snapshots
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Receiver task                         │
//! │  FeedTransport ──▶ classify ──▶ BoundedQueue<RawFrame> ──┐   │
//! │       │                  │                               │   │
//! │  ReconnectPolicy         └────▶ BoundedQueue<FeedError> ─┤   │
//! └──────────────────────────────────────────────────────────┼───┘
//!                                                            ▼
//!                                   ConsumerLoop ──▶ FeedHandler
//! ```
//!
//! Exactly one producer context (the receiver task) writes to the queues
//! and status counters; exactly one consumer context reads them. No
//! cross-component locking beyond the queues' own synchronization.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use railfeed::{
//!     ConsumerLoop, FeedConfig, FeedError, FeedHandler, FeedTransport, RawFrame, Receiver,
//! };
//! use std::time::Duration;
//!
//! struct MyBrokerClient; // wraps your messaging library
//!
//! #[async_trait]
//! impl FeedTransport for MyBrokerClient {
//!     async fn connect(&mut self) -> Result<(), FeedError> {
//!         Ok(())
//!     }
//!     async fn subscribe(&mut self, _topic: &str) -> Result<(), FeedError> {
//!         Ok(())
//!     }
//!     async fn receive_next(
//!         &mut self,
//!         timeout: Duration,
//!     ) -> Result<Option<RawFrame>, FeedError> {
//!         tokio::time::sleep(timeout).await;
//!         Ok(None)
//!     }
//!     async fn disconnect(&mut self) {}
//!     fn is_connected(&self) -> bool {
//!         true
//!     }
//! }
//!
//! struct MyHandler;
//!
//! #[async_trait]
//! impl FeedHandler for MyHandler {
//!     async fn on_frame(&self, _frame: &RawFrame) -> anyhow::Result<()> {
//!         // deserialize _frame.payload here
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = FeedConfig {
//!         url: "tcp://datafeeds.example.net:61616".to_string(),
//!         username: "user".to_string(),
//!         password: "pass".to_string(),
//!         topic: "feed/pushport/v16".to_string(),
//!         ..Default::default()
//!     };
//!
//!     let mut receiver = Receiver::new(config, Box::new(MyBrokerClient))?;
//!     receiver.start()?;
//!
//!     let consumer = ConsumerLoop::new(&receiver, MyHandler);
//!     let stop = consumer.stop_handle();
//!     tokio::spawn(async move {
//!         tokio::time::sleep(Duration::from_secs(120)).await;
//!         stop.request_stop();
//!     });
//!     consumer.run().await;
//!
//!     receiver.stop().await;
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod config;
pub mod consumer;
pub mod error;
pub mod frame;
pub mod queue;
pub mod receiver;
pub mod transport;

// Re-export main types for convenience
pub use backoff::{ReconnectConfig, ReconnectPolicy};
pub use config::{FeedConfig, OverflowPolicy};
pub use consumer::{ConsumerLoop, ConsumerStopHandle, FeedHandler, ProcessingStats};
pub use error::{FeedError, FeedErrorKind};
pub use frame::{FrameKind, FramePayload, RawFrame};
pub use queue::BoundedQueue;
pub use receiver::{Receiver, ReceiverState, ReceiverStatus, StatusHandle};
pub use transport::FeedTransport;
