//! Bounded MPMC work queue with backpressure and depth/throughput stats.
//!
//! The teacher's `ExecutionPool` (`task.rs`) hands tasks to workers over an
//! unbounded `std::sync::mpsc` channel fed through a shared `Mutex`. Spec §4.1
//! calls for a *bounded* queue that rejects whole batches under pressure
//! instead of blocking, so this is rebuilt on `crossbeam-channel`'s bounded
//! channel (native MPMC, no `Mutex<Receiver>` wrapper needed) with an
//! `AtomicU64` stats block alongside it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};

/// Point-in-time counters for one queue (spec §6).
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    pub capacity: usize,
    pub depth: usize,
    pub enqueued_total: u64,
    pub dequeued_total: u64,
    pub dropped_total: u64,
    pub avg_queue_time: Duration,
    pub max_queue_time: Duration,
    pub enqueue_rate: f64,
    pub dequeue_rate: f64,
    pub last_enqueue: Option<Instant>,
    pub last_dequeue: Option<Instant>,
}

/// One queued item plus the instant it was enqueued, so a later dequeue can
/// compute how long it waited (spec §6 `avg_queue_time`/`max_queue_time`).
struct Envelope<T> {
    item: T,
    enqueued_at: Instant,
}

struct Counters {
    created_at: Instant,
    enqueued_total: AtomicU64,
    dequeued_total: AtomicU64,
    dropped_total: AtomicU64,
    total_wait_nanos: AtomicU64,
    max_wait_nanos: AtomicU64,
    last_enqueue: Mutex<Option<Instant>>,
    last_dequeue: Mutex<Option<Instant>>,
    closed: AtomicBool,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            created_at: Instant::now(),
            enqueued_total: AtomicU64::new(0),
            dequeued_total: AtomicU64::new(0),
            dropped_total: AtomicU64::new(0),
            total_wait_nanos: AtomicU64::new(0),
            max_wait_nanos: AtomicU64::new(0),
            last_enqueue: Mutex::new(None),
            last_dequeue: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }
}

/// A fixed-capacity queue shared between one producer (the scheduler) and a
/// worker pool's consumer threads.
pub struct BoundedQueue<T> {
    sender: Sender<Envelope<T>>,
    receiver: Receiver<Envelope<T>>,
    capacity: usize,
    counters: Arc<Counters>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            capacity: self.capacity,
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver, capacity, counters: Arc::new(Counters::default()) }
    }

    /// Enqueue an entire batch or none of it (spec §4.1: partial enqueue
    /// would let a scheduler tick silently lose jobs mid-batch). Returns the
    /// items back to the caller on rejection so they can be retried or
    /// counted as dropped by the caller's policy. A whole-batch rejection
    /// does NOT increment `dropped_total` — the dispatcher retries next tick,
    /// so nothing was actually lost.
    pub fn enqueue_batch(&self, items: Vec<T>) -> Result<(), Vec<T>> {
        if self.counters.closed.load(Ordering::SeqCst) {
            return Err(items);
        }
        if items.len() > self.capacity - self.len() {
            return Err(items);
        }

        let now = Instant::now();
        let count = items.len() as u64;
        for item in items {
            // Capacity was checked above under a single-producer assumption
            // (spec §5: only the scheduler thread enqueues), so this send
            // cannot legitimately hit `Full`. If it ever does, that item is
            // a genuine, already-accepted-batch partial drop, counted here
            // for metrics only per spec §4.1's "variant" clause.
            if self.sender.try_send(Envelope { item, enqueued_at: now }).is_err() {
                self.counters.dropped_total.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.counters.enqueued_total.fetch_add(count, Ordering::Relaxed);
        *self.counters.last_enqueue.lock().unwrap() = Some(now);
        Ok(())
    }

    /// Pop up to `max` items without blocking.
    pub fn try_dequeue_batch(&self, max: usize) -> Vec<T> {
        let mut out = Vec::with_capacity(max.min(self.len()));
        let now = Instant::now();
        for _ in 0..max {
            match self.receiver.try_recv() {
                Ok(envelope) => out.push(self.record_dequeue(envelope, now)),
                Err(_) => break,
            }
        }
        out
    }

    /// Blocking pop with a timeout, used by worker threads (spec §4.2).
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(envelope) => Some(self.record_dequeue(envelope, Instant::now())),
            Err(_) => None,
        }
    }

    fn record_dequeue(&self, envelope: Envelope<T>, now: Instant) -> T {
        self.counters.dequeued_total.fetch_add(1, Ordering::Relaxed);
        let wait = now.saturating_duration_since(envelope.enqueued_at).as_nanos() as u64;
        self.counters.total_wait_nanos.fetch_add(wait, Ordering::Relaxed);
        self.counters.max_wait_nanos.fetch_max(wait, Ordering::Relaxed);
        *self.counters.last_dequeue.lock().unwrap() = Some(now);
        envelope.item
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fraction of capacity currently occupied, used by the worker pool
    /// controller to decide on scaling (spec §4.2).
    pub fn pressure(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.len() as f64 / self.capacity as f64
        }
    }

    /// Stop accepting new batches; already-queued items still drain through
    /// `try_dequeue_batch`/`dequeue_timeout` (spec §4.1 `close()`).
    pub fn close(&self) {
        self.counters.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.counters.closed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> QueueStats {
        let enqueued = self.counters.enqueued_total.load(Ordering::Relaxed);
        let dequeued = self.counters.dequeued_total.load(Ordering::Relaxed);
        // All-time average rather than a true sliding window: the counters
        // already kept are cheap running totals, and a windowed rate would
        // need a ring buffer this queue has no other use for.
        let elapsed = self.counters.created_at.elapsed().as_secs_f64().max(f64::MIN_POSITIVE);
        let avg_wait_nanos = if dequeued > 0 { self.counters.total_wait_nanos.load(Ordering::Relaxed) / dequeued } else { 0 };

        QueueStats {
            capacity: self.capacity,
            depth: self.len(),
            enqueued_total: enqueued,
            dequeued_total: dequeued,
            dropped_total: self.counters.dropped_total.load(Ordering::Relaxed),
            avg_queue_time: Duration::from_nanos(avg_wait_nanos),
            max_queue_time: Duration::from_nanos(self.counters.max_wait_nanos.load(Ordering::Relaxed)),
            enqueue_rate: enqueued as f64 / elapsed,
            dequeue_rate: dequeued as f64 / elapsed,
            last_enqueue: *self.counters.last_enqueue.lock().unwrap(),
            last_dequeue: *self.counters.last_dequeue.lock().unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_batch_rejects_whole_batch_without_dropping_metrics() {
        let q: BoundedQueue<u32> = BoundedQueue::new(2);
        let rejected = q.enqueue_batch(vec![1, 2, 3]);
        assert!(rejected.is_err());
        assert_eq!(q.len(), 0);
        assert_eq!(q.stats().dropped_total, 0, "a whole-batch rejection is retried next tick, not dropped");
    }

    #[test]
    fn enqueue_batch_accepts_batch_within_capacity() {
        let q: BoundedQueue<u32> = BoundedQueue::new(4);
        assert!(q.enqueue_batch(vec![1, 2, 3]).is_ok());
        assert_eq!(q.len(), 3);
        assert_eq!(q.stats().enqueued_total, 3);
    }

    #[test]
    fn try_dequeue_batch_caps_at_max_and_available() {
        let q: BoundedQueue<u32> = BoundedQueue::new(10);
        q.enqueue_batch(vec![1, 2, 3]).unwrap();
        let batch = q.try_dequeue_batch(2);
        assert_eq!(batch, vec![1, 2]);
        let rest = q.try_dequeue_batch(10);
        assert_eq!(rest, vec![3]);
        assert_eq!(q.stats().dequeued_total, 3);
    }

    #[test]
    fn pressure_reflects_occupancy() {
        let q: BoundedQueue<u32> = BoundedQueue::new(4);
        q.enqueue_batch(vec![1, 2]).unwrap();
        assert_eq!(q.pressure(), 0.5);
    }

    #[test]
    fn partial_capacity_still_rejects_oversized_batch() {
        let q: BoundedQueue<u32> = BoundedQueue::new(3);
        q.enqueue_batch(vec![1]).unwrap();
        let rejected = q.enqueue_batch(vec![2, 3, 4]);
        assert!(rejected.is_err());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn stats_track_wait_time_and_timestamps() {
        let q: BoundedQueue<u32> = BoundedQueue::new(4);
        q.enqueue_batch(vec![1]).unwrap();
        q.try_dequeue_batch(1);
        let stats = q.stats();
        assert!(stats.last_enqueue.is_some());
        assert!(stats.last_dequeue.is_some());
    }

    #[test]
    fn closed_queue_rejects_new_batches() {
        let q: BoundedQueue<u32> = BoundedQueue::new(4);
        q.enqueue_batch(vec![1]).unwrap();
        q.close();
        assert!(q.is_closed());
        assert!(q.enqueue_batch(vec![2]).is_err());
        // Already-queued items still drain after close.
        assert_eq!(q.try_dequeue_batch(4), vec![1]);
    }
}
