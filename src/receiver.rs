//! Feed receiver: connection lifecycle, reconnection, and frame pumping.
//!
//! The [`Receiver`] owns a [`FeedTransport`] and a [`ReconnectPolicy`] and
//! runs a background task that connects, subscribes, and pumps frames into
//! the message queue, reconnecting with capped exponential backoff when the
//! connection drops. It is the sole writer to both queues and to the status
//! counters; the caller's consumer loop is the sole reader.
//!
//! # State machine
//!
//! ```text
//! Stopped ──start()──▶ Connecting ──▶ Subscribing ──▶ Running
//!    ▲                     │               │             │
//!    │                     └──── failure ──┴──── lost ───┤
//!    │                                                   ▼
//!    └────── Stopping ◀── requestStop() ──── Disconnected (backoff, retry)
//! ```
//!
//! Shutdown is cooperative: `request_stop()` sets a flag observed at the
//! loop top, at receive-timeout boundaries, and inside backoff sleeps, so
//! stop latency is bounded by the configured receive timeout rather than by
//! network conditions.

use crate::backoff::ReconnectPolicy;
use crate::config::{FeedConfig, OverflowPolicy};
use crate::error::{FeedError, FeedErrorKind};
use crate::frame::RawFrame;
use crate::queue::BoundedQueue;
use crate::transport::FeedTransport;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering},
};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::{sync::Notify, task::JoinHandle};
use tracing::{debug, error, info, instrument, warn};

/// Receiver lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReceiverState {
    Stopped = 0,
    Connecting = 1,
    Subscribing = 2,
    Running = 3,
    Disconnected = 4,
    Stopping = 5,
}

impl ReceiverState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Subscribing,
            3 => Self::Running,
            4 => Self::Disconnected,
            5 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Point-in-time snapshot of the receiver's state and counters.
///
/// Read lock-free from the consumer side; eventually consistent with the
/// receiver's own view.
#[derive(Debug, Clone, Copy)]
pub struct ReceiverStatus {
    /// Current lifecycle state.
    pub state: ReceiverState,
    /// True from `start()` until the background task has fully stopped.
    pub is_running: bool,
    /// True while connected and subscribed.
    pub is_connected: bool,
    /// When the last frame was received, if any.
    pub last_message_at: Option<SystemTime>,
    /// Total frames received since `start()`.
    pub total_messages: u64,
    /// Total errors recorded since `start()`.
    pub total_errors: u64,
    /// Frames shed under `OverflowPolicy::DropNewest`.
    pub total_dropped: u64,
}

/// State shared between the receiver handle and its background task.
#[derive(Debug)]
struct ReceiverShared {
    state: AtomicU8,
    running: AtomicBool,
    // Unix millis of the last received frame; 0 = never.
    last_message_ms: AtomicU64,
    messages: AtomicU64,
    errors: AtomicU64,
    dropped: AtomicU64,
    shutdown: AtomicBool,
    shutdown_notify: Notify,
}

impl ReceiverShared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(ReceiverState::Stopped as u8),
            running: AtomicBool::new(false),
            last_message_ms: AtomicU64::new(0),
            messages: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            shutdown_notify: Notify::new(),
        }
    }

    fn set_state(&self, state: ReceiverState) {
        self.state.store(state as u8, Ordering::Release);
        debug!(state = ?state, "receiver state transition");
    }

    fn state(&self) -> ReceiverState {
        ReceiverState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn record_message(&self) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.last_message_ms.store(now_ms, Ordering::Release);
        self.messages.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ReceiverStatus {
        let state = self.state();
        let last_ms = self.last_message_ms.load(Ordering::Acquire);
        ReceiverStatus {
            state,
            is_running: self.running.load(Ordering::Acquire),
            is_connected: state == ReceiverState::Running,
            last_message_at: (last_ms > 0)
                .then(|| UNIX_EPOCH + std::time::Duration::from_millis(last_ms)),
            total_messages: self.messages.load(Ordering::Relaxed),
            total_errors: self.errors.load(Ordering::Relaxed),
            total_dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Cheap cloneable handle for reading receiver status from other tasks.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    shared: Arc<ReceiverShared>,
}

impl StatusHandle {
    /// Returns a point-in-time status snapshot.
    pub fn snapshot(&self) -> ReceiverStatus {
        self.shared.snapshot()
    }

    /// True from `start()` until the background task has fully stopped.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }
}

/// Resilient feed receiver.
///
/// Created once at startup with a transport and configuration; lives until
/// explicit stop. Frames and errors flow out through the bounded queues
/// returned by [`Receiver::frames`] and [`Receiver::errors`].
pub struct Receiver {
    config: FeedConfig,
    frames: Arc<BoundedQueue<RawFrame>>,
    errors: Arc<BoundedQueue<FeedError>>,
    shared: Arc<ReceiverShared>,
    transport: Option<Box<dyn FeedTransport>>,
    handle: Option<JoinHandle<()>>,
}

impl Receiver {
    /// Creates a receiver over the given transport.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::Config` if the configuration fails validation.
    pub fn new(config: FeedConfig, transport: Box<dyn FeedTransport>) -> Result<Self, FeedError> {
        config.validate()?;
        let frames = Arc::new(BoundedQueue::new(config.queue_capacity));
        let errors = Arc::new(BoundedQueue::new(config.error_queue_capacity));
        Ok(Self {
            config,
            frames,
            errors,
            shared: Arc::new(ReceiverShared::new()),
            transport: Some(transport),
            handle: None,
        })
    }

    /// The message queue this receiver fills.
    pub fn frames(&self) -> Arc<BoundedQueue<RawFrame>> {
        Arc::clone(&self.frames)
    }

    /// The error queue this receiver fills.
    pub fn errors(&self) -> Arc<BoundedQueue<FeedError>> {
        Arc::clone(&self.errors)
    }

    /// The configuration this receiver was built with.
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Returns a point-in-time status snapshot.
    pub fn status(&self) -> ReceiverStatus {
        self.shared.snapshot()
    }

    /// Returns a cloneable handle for reading status from other tasks.
    pub fn status_handle(&self) -> StatusHandle {
        StatusHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// True from `start()` until the background task has fully stopped.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Starts the background work loop.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::AlreadyRunning` if the receiver was started
    /// before. Restart after stop is not supported; create a new receiver.
    #[instrument(skip(self), fields(topic = %self.config.topic))]
    pub fn start(&mut self) -> Result<(), FeedError> {
        if self.handle.is_some() {
            return Err(FeedError::AlreadyRunning);
        }
        let transport = self.transport.take().ok_or(FeedError::AlreadyRunning)?;

        self.shared.shutdown.store(false, Ordering::Release);
        self.shared.running.store(true, Ordering::Release);
        info!("starting feed receiver");

        let worker = ReceiverWorker {
            config: self.config.clone(),
            transport,
            frames: Arc::clone(&self.frames),
            errors: Arc::clone(&self.errors),
            shared: Arc::clone(&self.shared),
            policy: ReconnectPolicy::new(self.config.reconnect.clone()),
        };
        self.handle = Some(tokio::spawn(worker.run()));
        Ok(())
    }

    /// Requests a cooperative stop.
    ///
    /// Observed at the next loop iteration, receive-timeout boundary, or
    /// backoff sleep. Poll [`Receiver::is_running`] (or await
    /// [`Receiver::stop`]) to detect completion.
    pub fn request_stop(&self) {
        info!("stop requested");
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.shutdown_notify.notify_one();
    }

    /// Requests a stop and waits for the background task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = ?e, "receiver task join error");
            }
        }
    }
}

/// The background work loop. Owns the transport exclusively.
struct ReceiverWorker {
    config: FeedConfig,
    transport: Box<dyn FeedTransport>,
    frames: Arc<BoundedQueue<RawFrame>>,
    errors: Arc<BoundedQueue<FeedError>>,
    shared: Arc<ReceiverShared>,
    policy: ReconnectPolicy,
}

impl ReceiverWorker {
    async fn run(mut self) {
        // One error-queue entry per outage: the transition into Disconnected
        // records, repeated failed retries of the same outage only log.
        let mut outage_recorded = false;

        while !self.shared.shutdown_requested() {
            self.shared.set_state(ReceiverState::Connecting);
            match self.transport.connect().await {
                Ok(()) => {
                    self.shared.set_state(ReceiverState::Subscribing);
                    match self.transport.subscribe(&self.config.topic).await {
                        Ok(()) => {
                            info!(topic = %self.config.topic, "subscribed to feed");
                            self.shared.set_state(ReceiverState::Running);
                            self.policy.note_connected();
                            outage_recorded = false;

                            let result = self.pump().await;
                            self.policy.note_disconnected();
                            if let Err(e) = result {
                                self.record_outage_error(e, &mut outage_recorded);
                            }
                        }
                        Err(e) => self.record_outage_error(e, &mut outage_recorded),
                    }
                }
                Err(e) => self.record_outage_error(e, &mut outage_recorded),
            }

            self.transport.disconnect().await;
            if self.shared.shutdown_requested() {
                break;
            }

            self.shared.set_state(ReceiverState::Disconnected);
            if self.policy.attempts_exhausted() {
                error!(
                    attempts = self.policy.attempts(),
                    "reconnect attempts exhausted, stopping receiver"
                );
                self.push_error(FeedError::connection_lost(format!(
                    "reconnect attempts exhausted after {} tries",
                    self.policy.attempts()
                )));
                break;
            }

            let delay = self.policy.delay_for_next_attempt();
            debug!(
                delay_ms = delay.as_millis() as u64,
                attempt = self.policy.attempts(),
                "waiting before reconnect attempt"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shared.shutdown_notify.notified() => {}
            }
        }

        self.shared.set_state(ReceiverState::Stopping);
        self.transport.disconnect().await;
        self.shared.set_state(ReceiverState::Stopped);
        self.shared.running.store(false, Ordering::Release);
        info!("feed receiver stopped");
    }

    /// Receives frames until shutdown (`Ok`) or connection loss (`Err`).
    async fn pump(&mut self) -> Result<(), FeedError> {
        loop {
            if self.shared.shutdown_requested() {
                return Ok(());
            }
            match self.transport.receive_next(self.config.receive_timeout).await {
                Ok(Some(frame)) => {
                    self.shared.record_message();
                    self.enqueue_frame(frame).await;
                }
                Ok(None) => {
                    // Timeout: not a failure, loop re-checks shutdown.
                }
                Err(e) if e.kind() == FeedErrorKind::Connection => return Err(e),
                Err(e) => {
                    // Malformed frame or similar: record and keep receiving.
                    warn!(error = %e, "protocol-level error, skipping frame");
                    self.push_error(e);
                }
            }
        }
    }

    /// Routes a received frame into the message queue per overflow policy.
    async fn enqueue_frame(&self, frame: RawFrame) {
        match self.config.overflow_policy {
            OverflowPolicy::Block => {
                tokio::select! {
                    _ = self.frames.enqueue(frame) => {}
                    _ = self.shared.shutdown_notify.notified() => {
                        // Stopping; the in-flight frame is dropped with the
                        // rest of the undelivered connection state.
                    }
                }
            }
            OverflowPolicy::DropNewest => {
                if self.frames.try_enqueue(frame).is_err() {
                    self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        capacity = self.frames.capacity(),
                        "message queue full, dropping frame"
                    );
                }
            }
        }
    }

    /// Records the first failure of an outage; later failures only log.
    fn record_outage_error(&self, error: FeedError, outage_recorded: &mut bool) {
        if *outage_recorded {
            warn!(error = %error, attempt = self.policy.attempts(), "reconnect attempt failed");
        } else {
            warn!(error = %error, "connection to feed lost");
            self.push_error(error);
            *outage_recorded = true;
        }
    }

    fn push_error(&self, error: FeedError) {
        self.shared.errors.fetch_add(1, Ordering::Relaxed);
        if self.errors.try_enqueue(error).is_err() {
            warn!("error queue full, discarding error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_u8() {
        for state in [
            ReceiverState::Stopped,
            ReceiverState::Connecting,
            ReceiverState::Subscribing,
            ReceiverState::Running,
            ReceiverState::Disconnected,
            ReceiverState::Stopping,
        ] {
            assert_eq!(ReceiverState::from_u8(state as u8), state);
        }
        assert_eq!(ReceiverState::from_u8(42), ReceiverState::Stopped);
    }

    #[test]
    fn snapshot_reflects_counters() {
        let shared = ReceiverShared::new();
        let status = shared.snapshot();
        assert_eq!(status.state, ReceiverState::Stopped);
        assert!(!status.is_running);
        assert!(!status.is_connected);
        assert!(status.last_message_at.is_none());
        assert_eq!(status.total_messages, 0);

        shared.set_state(ReceiverState::Running);
        shared.record_message();
        let status = shared.snapshot();
        assert!(status.is_connected);
        assert!(status.last_message_at.is_some());
        assert_eq!(status.total_messages, 1);
    }
}
