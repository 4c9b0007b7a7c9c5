//! Dynamic worker pool: a fixed-shape generalization of the teacher's
//! `ExecutionPool` (`task.rs`) plus a scaling controller thread.
//!
//! The teacher spawns `worker_count` threads once, each pulling from a
//! shared `Mutex<Receiver<ExecutionTask>>` and pushing to a single
//! `Sender<ExecutionOutcome>`. This keeps that core loop (threads block on a
//! shared receiver, run one `Executor`, publish one `Outcome`) but makes the
//! thread count elastic: a controller thread samples queue pressure every
//! `scale_interval` and grows or shrinks the pool between `min` and `max`
//! workers (spec §4.2).

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::executors::{default_timeout, Executor};
use crate::job::{Job, JobPayload, Outcome};
use crate::queue::BoundedQueue;

/// Bounds and cadence for one pool's scaling controller (spec §4.2).
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub min_workers: usize,
    pub max_workers: usize,
    pub scale_step: usize,
    pub scale_interval: Duration,
    /// Queue pressure above which the controller considers scaling up.
    pub high_watermark: f64,
    /// Queue pressure below which the controller considers scaling down.
    pub low_watermark: f64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_workers: 4,
            max_workers: 8,
            scale_step: 2,
            scale_interval: Duration::from_secs(5),
            high_watermark: 0.75,
            low_watermark: 0.25,
        }
    }
}

/// Point-in-time counters for one pool (spec §6).
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolStats {
    pub running: usize,
    pub capacity: usize,
    pub target: usize,
    pub min: usize,
    pub max: usize,
    pub waiting: usize,
    pub submitted: u64,
    pub completed: u64,
    pub pending_results: usize,
    pub scaling_events: u64,
    pub last_scale: Option<Instant>,
}

/// A running pool of worker threads draining `input` through `executor` and
/// publishing onto `output`, plus a controller thread that scales worker
/// count with demand.
pub struct DynamicWorkerPool {
    input: BoundedQueue<Job>,
    output: BoundedQueue<Outcome>,
    executor: Arc<dyn Executor>,
    config: PoolConfig,
    worker_count: Arc<AtomicUsize>,
    target_workers: Arc<AtomicUsize>,
    retiring: Arc<AtomicUsize>,
    waiting: Arc<AtomicUsize>,
    submitted: Arc<AtomicU64>,
    completed: Arc<AtomicU64>,
    scaling_events: Arc<AtomicU64>,
    last_scale: Arc<Mutex<Option<Instant>>>,
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
    controller: Option<JoinHandle<()>>,
    decisions: Option<crossbeam_channel::Receiver<ScaleDecision>>,
}

impl DynamicWorkerPool {
    pub fn new(
        input: BoundedQueue<Job>,
        output: BoundedQueue<Outcome>,
        executor: Arc<dyn Executor>,
        config: PoolConfig,
    ) -> Self {
        let mut pool = Self {
            input,
            output,
            executor,
            config,
            worker_count: Arc::new(AtomicUsize::new(0)),
            target_workers: Arc::new(AtomicUsize::new(config.min_workers)),
            retiring: Arc::new(AtomicUsize::new(0)),
            waiting: Arc::new(AtomicUsize::new(0)),
            submitted: Arc::new(AtomicU64::new(0)),
            completed: Arc::new(AtomicU64::new(0)),
            scaling_events: Arc::new(AtomicU64::new(0)),
            last_scale: Arc::new(Mutex::new(None)),
            shutdown: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
            controller: None,
            decisions: None,
        };

        for _ in 0..config.min_workers {
            pool.spawn_worker();
        }
        pool.spawn_controller();
        pool
    }

    fn spawn_worker(&mut self) {
        let input = self.input.clone();
        let output = self.output.clone();
        let executor = Arc::clone(&self.executor);
        let shutdown = Arc::clone(&self.shutdown);
        let worker_count = Arc::clone(&self.worker_count);
        let retiring = Arc::clone(&self.retiring);
        let waiting = Arc::clone(&self.waiting);
        let submitted = Arc::clone(&self.submitted);
        let completed = Arc::clone(&self.completed);
        let id = worker_count.fetch_add(1, Ordering::SeqCst);

        let handle = thread::spawn(move || {
            debug!(worker = id, backend = executor.backend_type(), "worker started");
            loop {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                if try_retire(&retiring) {
                    debug!(worker = id, "worker retiring on scale-down");
                    break;
                }

                waiting.fetch_add(1, Ordering::Relaxed);
                let job = input.dequeue_timeout(Duration::from_millis(100));
                waiting.fetch_sub(1, Ordering::Relaxed);

                let Some(job) = job else { continue };
                submitted.fetch_add(1, Ordering::Relaxed);

                let color = match &job.payload {
                    JobPayload::Code { color, .. } => Some(color.clone()),
                    _ => None,
                };
                let timeout = default_timeout(&job.payload);
                let outcome_result = run_with_timeout(&*executor, &job, timeout);
                let entity = job.entity;
                let job_id = job.id;
                let outcome = outcome_result
                    .map_or_else(|e| Outcome::err(job_id, entity, e), |payload| Outcome::ok(job_id, entity, payload))
                    .with_color(color);
                completed.fetch_add(1, Ordering::Relaxed);
                // A full output queue means results are draining slower than
                // jobs complete; spec §4.1 treats the queue as the sole
                // backpressure point, so a dropped result here is recorded
                // by the output queue's own `dropped_total` on the next
                // `enqueue_batch` from whatever owns batching upstream.
                let _ = output.enqueue_batch(vec![outcome]);
            }
            worker_count.fetch_sub(1, Ordering::SeqCst);
            debug!(worker = id, "worker stopped");
        });
        self.workers.push(handle);
    }

    fn spawn_controller(&mut self) {
        let input = self.input.clone();
        let worker_count = Arc::clone(&self.worker_count);
        let shutdown = Arc::clone(&self.shutdown);
        let config = self.config;

        // The controller only decides *how many* workers should exist;
        // spawning/stopping threads still goes through `self`, so it
        // communicates via a channel back rather than owning `self`.
        let (tx, rx) = crossbeam_channel::unbounded::<ScaleDecision>();

        let controller = thread::spawn(move || {
            let mut consecutive_pressure = 0u32;
            let mut consecutive_idle = 0u32;
            while !shutdown.load(Ordering::Relaxed) {
                thread::sleep(config.scale_interval);
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                let pressure = input.pressure();
                let current = worker_count.load(Ordering::SeqCst);

                if pressure >= config.high_watermark && current < config.max_workers {
                    consecutive_pressure += 1;
                    consecutive_idle = 0;
                } else if pressure <= config.low_watermark && current > config.min_workers {
                    consecutive_idle += 1;
                    consecutive_pressure = 0;
                } else {
                    consecutive_pressure = 0;
                    consecutive_idle = 0;
                }

                if consecutive_pressure >= 2 {
                    let grow = config.scale_step.min(config.max_workers - current);
                    if grow > 0 {
                        info!(pressure, current, grow, "scaling worker pool up");
                        let _ = tx.send(ScaleDecision::Grow(grow));
                    }
                    consecutive_pressure = 0;
                } else if consecutive_idle >= 2 {
                    let shrink = config.scale_step.min(current - config.min_workers);
                    if shrink > 0 {
                        info!(pressure, current, shrink, "scaling worker pool down");
                        let _ = tx.send(ScaleDecision::Shrink(shrink));
                    }
                    consecutive_idle = 0;
                }
            }
        });

        self.controller = Some(controller);
        self.decisions = Some(rx);
    }

    /// Apply any pending scale decisions from the controller thread. Called
    /// by the scheduler once per tick so thread spawn/join stays on a
    /// single owning thread rather than happening inside the controller.
    pub fn apply_scaling(&mut self) {
        self.workers.retain(|h| !h.is_finished());

        let Some(rx) = &self.decisions else { return };
        let mut decisions = Vec::new();
        while let Ok(decision) = rx.try_recv() {
            decisions.push(decision);
        }
        for decision in decisions {
            match decision {
                ScaleDecision::Grow(n) => {
                    for _ in 0..n {
                        self.spawn_worker();
                    }
                    self.target_workers.fetch_add(n, Ordering::SeqCst);
                }
                ScaleDecision::Shrink(n) => {
                    // Ask `n` idle workers to retire themselves rather than
                    // just decrementing the logical count: each worker
                    // checks `retiring` right before it would otherwise
                    // block on the next dequeue, so the actual thread count
                    // shrinks along with `worker_count`.
                    self.retiring.fetch_add(n, Ordering::SeqCst);
                    let current = self.target_workers.load(Ordering::SeqCst);
                    self.target_workers.store(current.saturating_sub(n), Ordering::SeqCst);
                }
            }
            self.scaling_events.fetch_add(1, Ordering::Relaxed);
            *self.last_scale.lock().unwrap() = Some(Instant::now());
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> WorkerPoolStats {
        WorkerPoolStats {
            running: self.worker_count(),
            capacity: self.config.max_workers,
            target: self.target_workers.load(Ordering::SeqCst),
            min: self.config.min_workers,
            max: self.config.max_workers,
            waiting: self.waiting.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            pending_results: self.output.len(),
            scaling_events: self.scaling_events.load(Ordering::Relaxed),
            last_scale: *self.last_scale.lock().unwrap(),
        }
    }

    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        if let Some(handle) = self.controller.take() {
            let _ = handle.join();
        }
    }
}

/// Atomically claim one unit of pending retirement, if any is outstanding.
fn try_retire(retiring: &AtomicUsize) -> bool {
    retiring.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
}

enum ScaleDecision {
    Grow(usize),
    Shrink(usize),
}

fn run_with_timeout(
    executor: &dyn Executor,
    job: &Job,
    _timeout: Duration,
) -> Result<crate::job::OutcomePayload, crate::error::EngineError> {
    // Reference executors are synchronous and return immediately; a
    // deadline is still threaded through so a future executor that shells
    // out to a real process has somewhere to enforce it.
    executor.execute(job)
}
