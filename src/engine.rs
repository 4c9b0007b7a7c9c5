//! `MonitorEngine`: the public façade wiring the component store, the three
//! queue/worker-pool pairs, and the scheduler into a runnable unit.
//!
//! Grounded on the teacher's `InstanceManager` + `global_instance_manager`
//! pattern (`instance_manager.rs`): one owning struct constructed from a
//! config, exposing lifecycle methods (`tick`/`run`/`stop`) and a stats
//! snapshot, rather than scattering pool/queue ownership across callers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::config::EngineConfig;
use crate::error::LoaderResult;
use crate::executors::Executor;
use crate::job::{Job, Outcome};
use crate::loader;
use crate::queue::{BoundedQueue, QueueStats};
use crate::scheduler::{Scheduler, SchedulerQueues, TickStats};
use crate::spec::MonitorSpec;
use crate::store::ComponentStore;
use crate::worker_pool::{DynamicWorkerPool, PoolConfig};

/// Snapshot of queue and scheduler counters, exposed for the host process
/// to publish as metrics (spec §6, SPEC_FULL §1.1 ambient stack).
#[derive(Debug, Clone, Copy)]
pub struct EngineStats {
    pub pulse_queue: QueueStats,
    pub intervention_queue: QueueStats,
    pub code_queue: QueueStats,
    pub pulse_workers: usize,
    pub intervention_workers: usize,
    pub code_workers: usize,
    pub last_tick: TickStats,
}

/// Owns every live resource for one monitor population: the component
/// store, the three queue/pool pairs, and the scheduler driving them.
pub struct MonitorEngine {
    store: ComponentStore,
    scheduler: Scheduler,
    pulse_pool: DynamicWorkerPool,
    intervention_pool: DynamicWorkerPool,
    code_pool: DynamicWorkerPool,
    config: EngineConfig,
    last_tick: TickStats,
    stop: Arc<AtomicBool>,
}

impl MonitorEngine {
    /// Build an engine from a manifest and three executors (one per
    /// pipeline). Executors are trait objects so callers can swap in real
    /// network/process backends without touching the engine.
    pub fn new(
        specs: Vec<MonitorSpec>,
        config: EngineConfig,
        pulse_executor: Arc<dyn Executor>,
        intervention_executor: Arc<dyn Executor>,
        code_executor: Arc<dyn Executor>,
    ) -> LoaderResult<Self> {
        let store = loader::load(specs)?;

        let pulse_jobs: BoundedQueue<Job> = BoundedQueue::new(config.pulse_queue_capacity);
        let intervention_jobs: BoundedQueue<Job> = BoundedQueue::new(config.intervention_queue_capacity);
        let code_jobs: BoundedQueue<Job> = BoundedQueue::new(config.code_queue_capacity);
        let pulse_outcomes: BoundedQueue<Outcome> = BoundedQueue::new(config.pulse_queue_capacity);
        let intervention_outcomes: BoundedQueue<Outcome> =
            BoundedQueue::new(config.intervention_queue_capacity);
        let code_outcomes: BoundedQueue<Outcome> = BoundedQueue::new(config.code_queue_capacity);

        let pool_config = PoolConfig {
            min_workers: config.worker_pool_min,
            max_workers: config.worker_pool_max,
            scale_step: config.worker_pool_scale_step,
            scale_interval: config.worker_pool_scale_interval,
            ..PoolConfig::default()
        };

        let pulse_pool = DynamicWorkerPool::new(
            pulse_jobs.clone(),
            pulse_outcomes.clone(),
            pulse_executor,
            pool_config,
        );
        let intervention_pool = DynamicWorkerPool::new(
            intervention_jobs.clone(),
            intervention_outcomes.clone(),
            intervention_executor,
            pool_config,
        );
        let code_pool =
            DynamicWorkerPool::new(code_jobs.clone(), code_outcomes.clone(), code_executor, pool_config);

        // `max_dispatch` caps the §4.1 backpressure token budget; the result
        // batch size is a separate, uncapped drain limit since draining
        // results never needs to be throttled the way dispatch does.
        let max_dispatch = Some(config.max_dispatch_override.unwrap_or(config.dispatch_batch_size));
        let scheduler = Scheduler::new(
            SchedulerQueues {
                pulse_jobs,
                intervention_jobs,
                code_jobs,
                pulse_outcomes,
                intervention_outcomes,
                code_outcomes,
            },
            max_dispatch,
            config.dispatch_batch_size,
        );

        Ok(Self {
            store,
            scheduler,
            pulse_pool,
            intervention_pool,
            code_pool,
            config,
            last_tick: TickStats::default(),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Run a single tick immediately, ignoring `tick_period`. Used by tests
    /// and by callers driving their own loop.
    pub fn tick(&mut self) -> TickStats {
        let now = Instant::now();
        self.pulse_pool.apply_scaling();
        self.intervention_pool.apply_scaling();
        self.code_pool.apply_scaling();
        self.last_tick = self.scheduler.tick(&mut self.store, now);
        self.last_tick
    }

    /// Block the calling thread, ticking every `tick_period` until `stop()`
    /// is called from another thread.
    pub fn run(&mut self) {
        info!(tick_period = ?self.config.tick_period, "engine run loop starting");
        while !self.stop.load(Ordering::Relaxed) {
            let started = Instant::now();
            self.tick();
            let elapsed = started.elapsed();
            if elapsed < self.config.tick_period {
                std::thread::sleep(self.config.tick_period - elapsed);
            }
        }
        info!("engine run loop stopped");
    }

    /// A cloneable handle that `stop()` can be called on from another
    /// thread while `run()` is blocking the caller's own thread.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn store(&self) -> &ComponentStore {
        &self.store
    }

    pub fn stats(&self) -> EngineStats {
        let queues = self.scheduler.queues();
        EngineStats {
            pulse_queue: queues.pulse_jobs.stats(),
            intervention_queue: queues.intervention_jobs.stats(),
            code_queue: queues.code_jobs.stats(),
            pulse_workers: self.pulse_pool.worker_count(),
            intervention_workers: self.intervention_pool.worker_count(),
            code_workers: self.code_pool.worker_count(),
            last_tick: self.last_tick,
        }
    }

    /// Shut down every worker pool's threads. Blocks until all workers have
    /// joined.
    pub fn shutdown(self) {
        self.pulse_pool.shutdown();
        self.intervention_pool.shutdown();
        self.code_pool.shutdown();
    }
}
