//! Bounded FIFO buffering shared between the receive and consume sides.
//!
//! [`BoundedQueue`] is the hand-off point between the receiver's background
//! task (sole producer in this crate's ownership model) and the caller's
//! consumer loop (sole reader). It is nonetheless safe for multi-producer
//! and multi-consumer use without external locking: the critical sections
//! are a handful of `VecDeque` operations under a `std::sync::Mutex`, with
//! a lock-free length mirror for cheap occupancy checks.
//!
//! `try_enqueue` hands the item back on a full queue so the caller decides
//! between dropping and waiting; the async [`BoundedQueue::enqueue`] waits
//! for space using a [`tokio::sync::Notify`] woken by dequeues.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::Notify;

/// Thread-safe FIFO queue with a hard capacity bound.
///
/// Invariant: the number of queued items never exceeds the capacity, and
/// dequeue order always equals enqueue order.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    // Mirrors items.len() so len() never takes the lock.
    len: AtomicUsize,
    space: Notify,
}

impl<T> BoundedQueue<T> {
    /// Creates a queue holding at most `capacity` items (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            len: AtomicUsize::new(0),
            space: Notify::new(),
        }
    }

    /// Attempts to enqueue without blocking.
    ///
    /// Returns the item back to the caller if the queue is at capacity.
    pub fn try_enqueue(&self, item: T) -> Result<(), T> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        if items.len() >= self.capacity {
            return Err(item);
        }
        items.push_back(item);
        self.len.store(items.len(), Ordering::Release);
        Ok(())
    }

    /// Enqueues, waiting for space if the queue is full.
    ///
    /// Wakeups come from dequeues; ordering among concurrent waiters is not
    /// specified, but items from a single producer are enqueued in the
    /// order the calls complete.
    pub async fn enqueue(&self, item: T) {
        let mut item = item;
        loop {
            // Register for the wakeup before trying, so a dequeue racing
            // with a failed try still stores a permit for us.
            let space = self.space.notified();
            match self.try_enqueue(item) {
                Ok(()) => return,
                Err(back) => {
                    item = back;
                    space.await;
                }
            }
        }
    }

    /// Dequeues the oldest item without blocking.
    pub fn try_dequeue(&self) -> Option<T> {
        let item = {
            let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
            let item = items.pop_front();
            self.len.store(items.len(), Ordering::Release);
            item
        };
        if item.is_some() {
            self.space.notify_one();
        }
        item
    }

    /// Returns the approximate number of queued items.
    ///
    /// Exact when no concurrent operation is in flight; never exceeds the
    /// capacity.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Returns true if the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn fifo_order_preserved() {
        let queue = BoundedQueue::new(16);
        for i in 0..10 {
            queue.try_enqueue(i).unwrap();
        }
        for i in 0..10 {
            assert_eq!(queue.try_dequeue(), Some(i));
        }
        assert_eq!(queue.try_dequeue(), None);
    }

    #[test]
    fn try_enqueue_returns_item_when_full() {
        let queue = BoundedQueue::new(2);
        assert!(queue.try_enqueue("a").is_ok());
        assert!(queue.try_enqueue("b").is_ok());
        assert_eq!(queue.try_enqueue("c"), Err("c"));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.try_dequeue(), Some("a"));
        assert!(queue.try_enqueue("c").is_ok());
        assert_eq!(queue.try_dequeue(), Some("b"));
        assert_eq!(queue.try_dequeue(), Some("c"));
    }

    #[test]
    fn capacity_is_clamped_to_one() {
        let queue = BoundedQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        assert!(queue.try_enqueue(1).is_ok());
        assert!(queue.try_enqueue(2).is_err());
    }

    #[test]
    fn concurrent_producers_lose_nothing() {
        let queue = Arc::new(BoundedQueue::new(4_000));
        let mut handles = Vec::new();
        for p in 0..4u32 {
            let queue = Arc::clone(&queue);
            handles.push(std::thread::spawn(move || {
                for i in 0..1_000u32 {
                    queue.try_enqueue((p, i)).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let mut count = 0usize;
        let mut last_per_producer = [None::<u32>; 4];
        while let Some((p, i)) = queue.try_dequeue() {
            // Per-producer order must survive interleaving.
            if let Some(last) = last_per_producer[p as usize] {
                assert!(i > last);
            }
            last_per_producer[p as usize] = Some(i);
            count += 1;
        }
        assert_eq!(count, 4_000);
    }

    #[tokio::test]
    async fn blocking_enqueue_waits_for_space() {
        let queue = Arc::new(BoundedQueue::new(1));
        queue.try_enqueue(1u32).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                queue.enqueue(2).await;
            })
        };

        // Give the producer time to block on the full queue.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!producer.is_finished());
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.try_dequeue(), Some(1));
        tokio::time::timeout(Duration::from_secs(1), producer)
            .await
            .expect("producer should unblock")
            .unwrap();
        assert_eq!(queue.try_dequeue(), Some(2));
    }
}
