//! Caller-side consumer loop.
//!
//! [`ConsumerLoop`] is the only component that hands data to external
//! consumers: it drains the error and message queues in time-boxed slices,
//! invokes the caller's [`FeedHandler`], and logs a periodic status report
//! at a fixed cadence independent of message arrival rate. Handler failures
//! are converted to `FeedError::Handler` and fed back through the error
//! queue; they never terminate consumption.

use crate::error::FeedError;
use crate::frame::{FrameKind, RawFrame};
use crate::queue::BoundedQueue;
use crate::receiver::{Receiver, StatusHandle};
use async_trait::async_trait;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Sleep applied when the message queue is near-empty, so an idle consumer
/// does not spin.
const IDLE_SLEEP: Duration = Duration::from_millis(50);

/// Queue depth under which the consumer considers itself idle.
const IDLE_THRESHOLD: usize = 10;

/// Downstream processing hooks supplied by the caller.
///
/// The deserialization of payload bytes into domain objects happens behind
/// this trait; the core only classifies frames by transport-level kind.
#[async_trait]
pub trait FeedHandler: Send + Sync {
    /// Processes one frame.
    ///
    /// # Errors
    ///
    /// A returned error is recorded as a handler failure and pushed onto
    /// the error queue; the loop keeps consuming.
    async fn on_frame(&self, frame: &RawFrame) -> anyhow::Result<()>;

    /// Observes one error drained from the error queue.
    ///
    /// The default implementation logs it.
    async fn on_error(&self, error: &FeedError) {
        warn!(error = %error, kind = ?error.kind(), "feed error");
    }
}

/// Per-kind processing counters, shared with the caller.
#[derive(Debug, Default)]
pub struct ProcessingStats {
    text_frames: AtomicU64,
    byte_frames: AtomicU64,
    unsupported_frames: AtomicU64,
    feed_errors: AtomicU64,
    handler_failures: AtomicU64,
}

impl ProcessingStats {
    /// Text frames processed.
    pub fn text_frames(&self) -> u64 {
        self.text_frames.load(Ordering::Relaxed)
    }

    /// Binary frames processed.
    pub fn byte_frames(&self) -> u64 {
        self.byte_frames.load(Ordering::Relaxed)
    }

    /// Unsupported frames processed.
    pub fn unsupported_frames(&self) -> u64 {
        self.unsupported_frames.load(Ordering::Relaxed)
    }

    /// Errors drained from the error queue.
    pub fn feed_errors(&self) -> u64 {
        self.feed_errors.load(Ordering::Relaxed)
    }

    /// Handler invocations that returned an error.
    pub fn handler_failures(&self) -> u64 {
        self.handler_failures.load(Ordering::Relaxed)
    }

    /// All frames processed, regardless of kind.
    pub fn total_frames(&self) -> u64 {
        self.text_frames() + self.byte_frames() + self.unsupported_frames()
    }
}

/// Cooperative stop handle for a running consumer loop.
#[derive(Debug, Clone)]
pub struct ConsumerStopHandle {
    stop: Arc<AtomicBool>,
}

impl ConsumerStopHandle {
    /// Signals the loop to stop at its next iteration.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }
}

/// Drains the receiver's queues and reports status.
pub struct ConsumerLoop<H: FeedHandler> {
    frames: Arc<BoundedQueue<RawFrame>>,
    errors: Arc<BoundedQueue<FeedError>>,
    handler: H,
    receiver_status: StatusHandle,
    drain_slice: Duration,
    status_interval: Duration,
    stats: Arc<ProcessingStats>,
    stop: Arc<AtomicBool>,
}

impl<H: FeedHandler> ConsumerLoop<H> {
    /// Creates a consumer loop wired to the given receiver's queues,
    /// status, and cadence settings.
    pub fn new(receiver: &Receiver, handler: H) -> Self {
        let config = receiver.config();
        Self {
            frames: receiver.frames(),
            errors: receiver.errors(),
            handler,
            receiver_status: receiver.status_handle(),
            drain_slice: config.drain_slice,
            status_interval: config.status_interval,
            stats: Arc::new(ProcessingStats::default()),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The shared processing counters.
    pub fn stats(&self) -> Arc<ProcessingStats> {
        Arc::clone(&self.stats)
    }

    /// Returns a handle that stops the loop from another task.
    pub fn stop_handle(&self) -> ConsumerStopHandle {
        ConsumerStopHandle {
            stop: Arc::clone(&self.stop),
        }
    }

    /// Runs until the stop handle fires.
    ///
    /// Each pass drains the error queue first (matching arrival-order
    /// priority for operational visibility), then the message queue, both
    /// bounded by the configured drain slice so processing latency stays
    /// predictable even under a flooded queue.
    pub async fn run(&self) {
        info!("consumer loop started");
        let mut last_report = Instant::now();

        while !self.stop.load(Ordering::Acquire) {
            let slice_end = Instant::now() + self.drain_slice;

            while Instant::now() < slice_end {
                let Some(err) = self.errors.try_dequeue() else {
                    break;
                };
                self.stats.feed_errors.fetch_add(1, Ordering::Relaxed);
                self.handler.on_error(&err).await;
            }

            while Instant::now() < slice_end {
                let Some(frame) = self.frames.try_dequeue() else {
                    break;
                };
                self.process_frame(&frame).await;
            }

            if last_report.elapsed() >= self.status_interval {
                self.report_status();
                last_report = Instant::now();
            }

            if self.frames.len() < IDLE_THRESHOLD {
                tokio::time::sleep(IDLE_SLEEP).await;
            }
        }

        info!("consumer loop stopped");
    }

    async fn process_frame(&self, frame: &RawFrame) {
        match frame.kind() {
            FrameKind::Text => self.stats.text_frames.fetch_add(1, Ordering::Relaxed),
            FrameKind::Bytes => self.stats.byte_frames.fetch_add(1, Ordering::Relaxed),
            FrameKind::Unsupported => self
                .stats
                .unsupported_frames
                .fetch_add(1, Ordering::Relaxed),
        };

        if let Err(e) = self.handler.on_frame(frame).await {
            self.stats.handler_failures.fetch_add(1, Ordering::Relaxed);
            let err = FeedError::handler(e);
            warn!(error = %err, "frame handler failed");
            if self.errors.try_enqueue(err).is_err() {
                warn!("error queue full, discarding handler error");
            }
        }
    }

    fn report_status(&self) {
        let status = self.receiver_status.snapshot();
        info!(
            state = ?status.state,
            connected = status.is_connected,
            queued = self.frames.len(),
            total_messages = status.total_messages,
            total_errors = status.total_errors,
            total_dropped = status.total_dropped,
            text = self.stats.text_frames(),
            bytes = self.stats.byte_frames(),
            unsupported = self.stats.unsupported_frames(),
            handler_failures = self.stats.handler_failures(),
            "feed status"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedConfig;
    use crate::error::FeedErrorKind;
    use crate::frame::FramePayload;
    use crate::transport::FeedTransport;
    use std::sync::atomic::AtomicUsize;

    /// Transport that never connects; used only to build a Receiver whose
    /// queues the tests fill directly.
    struct InertTransport;

    #[async_trait]
    impl FeedTransport for InertTransport {
        async fn connect(&mut self) -> Result<(), FeedError> {
            Err(FeedError::connection_lost("inert"))
        }
        async fn subscribe(&mut self, _topic: &str) -> Result<(), FeedError> {
            Err(FeedError::connection_lost("inert"))
        }
        async fn receive_next(
            &mut self,
            _timeout: Duration,
        ) -> Result<Option<RawFrame>, FeedError> {
            Ok(None)
        }
        async fn disconnect(&mut self) {}
        fn is_connected(&self) -> bool {
            false
        }
    }

    struct CountingHandler {
        frames_seen: AtomicUsize,
        errors_seen: AtomicUsize,
        fail_on_text: bool,
    }

    impl CountingHandler {
        fn new(fail_on_text: bool) -> Self {
            Self {
                frames_seen: AtomicUsize::new(0),
                errors_seen: AtomicUsize::new(0),
                fail_on_text,
            }
        }
    }

    #[async_trait]
    impl FeedHandler for CountingHandler {
        async fn on_frame(&self, frame: &RawFrame) -> anyhow::Result<()> {
            self.frames_seen.fetch_add(1, Ordering::Relaxed);
            if self.fail_on_text && frame.kind() == FrameKind::Text {
                anyhow::bail!("text frames unsupported downstream");
            }
            Ok(())
        }

        async fn on_error(&self, _error: &FeedError) {
            self.errors_seen.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn test_receiver() -> Receiver {
        let config = FeedConfig {
            url: "tcp://broker.example.net:61616".to_string(),
            topic: "feed/test".to_string(),
            status_interval: Duration::from_millis(50),
            drain_slice: Duration::from_millis(20),
            ..Default::default()
        };
        Receiver::new(config, Box::new(InertTransport)).unwrap()
    }

    #[tokio::test]
    async fn drains_frames_and_counts_kinds() {
        let receiver = test_receiver();
        let frames = receiver.frames();
        for _ in 0..3 {
            frames.try_enqueue(RawFrame::bytes(vec![1])).unwrap();
        }
        frames.try_enqueue(RawFrame::text("hi")).unwrap();
        frames
            .try_enqueue(RawFrame::new(FramePayload::Unsupported(vec![0xff])))
            .unwrap();

        let consumer = ConsumerLoop::new(&receiver, CountingHandler::new(false));
        let stats = consumer.stats();
        let stop = consumer.stop_handle();

        let consumer = Arc::new(consumer);
        let task = {
            let consumer = Arc::clone(&consumer);
            tokio::spawn(async move { consumer.run().await })
        };

        while stats.total_frames() < 5 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        stop.request_stop();
        task.await.unwrap();

        assert_eq!(stats.byte_frames(), 3);
        assert_eq!(stats.text_frames(), 1);
        assert_eq!(stats.unsupported_frames(), 1);
        assert_eq!(stats.handler_failures(), 0);
    }

    #[tokio::test]
    async fn handler_failure_feeds_error_queue_and_loop_survives() {
        let receiver = test_receiver();
        let frames = receiver.frames();
        frames.try_enqueue(RawFrame::text("bad")).unwrap();
        frames.try_enqueue(RawFrame::bytes(vec![1])).unwrap();

        let consumer = ConsumerLoop::new(&receiver, CountingHandler::new(true));
        let stats = consumer.stats();
        let stop = consumer.stop_handle();

        let consumer = Arc::new(consumer);
        let task = {
            let consumer = Arc::clone(&consumer);
            tokio::spawn(async move { consumer.run().await })
        };

        // The failed text frame becomes a Handler error which the loop
        // itself drains on a later pass.
        while stats.feed_errors() < 1 || stats.total_frames() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        stop.request_stop();
        task.await.unwrap();

        assert_eq!(stats.handler_failures(), 1);
        assert_eq!(stats.byte_frames(), 1);
        assert_eq!(stats.feed_errors(), 1);
    }

    #[tokio::test]
    async fn drained_errors_reach_the_handler() {
        let receiver = test_receiver();
        receiver
            .errors()
            .try_enqueue(FeedError::protocol("truncated"))
            .unwrap();

        let handler = Arc::new(CountingHandler::new(false));
        struct SharedHandler(Arc<CountingHandler>);

        #[async_trait]
        impl FeedHandler for SharedHandler {
            async fn on_frame(&self, frame: &RawFrame) -> anyhow::Result<()> {
                self.0.on_frame(frame).await
            }
            async fn on_error(&self, error: &FeedError) {
                assert_eq!(error.kind(), FeedErrorKind::Protocol);
                self.0.on_error(error).await;
            }
        }

        let consumer = ConsumerLoop::new(&receiver, SharedHandler(Arc::clone(&handler)));
        let stats = consumer.stats();
        let stop = consumer.stop_handle();

        let consumer = Arc::new(consumer);
        let task = {
            let consumer = Arc::clone(&consumer);
            tokio::spawn(async move { consumer.run().await })
        };

        while stats.feed_errors() < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        stop.request_stop();
        task.await.unwrap();

        assert_eq!(handler.errors_seen.load(Ordering::Relaxed), 1);
    }
}
