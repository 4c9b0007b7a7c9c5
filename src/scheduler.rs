//! Single-threaded cooperative tick loop (spec §4.4).
//!
//! `Scheduler::tick` runs the six systems in fixed order. It is the only
//! code in the crate that ever takes `&mut ComponentStore`: workers only
//! ever see `Job` payloads and publish `Outcome`s, matching the
//! single-writer concurrency model in spec §5.

use std::time::Instant;

use crate::job::{Job, Outcome};
use crate::queue::BoundedQueue;
use crate::store::ComponentStore;
use crate::systems::{dispatch, result, schedule, DispatchStats, ResultStats};

/// Aggregate counters for one tick, folded across all six systems.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickStats {
    pub scheduled: usize,
    pub pulse_dispatch: DispatchStats,
    pub intervention_dispatch: DispatchStats,
    pub code_dispatch: DispatchStats,
    pub pulse_result: ResultStats,
    pub intervention_result: ResultStats,
    pub code_result: ResultStats,
}

/// The three job queues and three outcome queues wired between the
/// scheduler and the worker pools (spec §4.1, §6).
pub struct SchedulerQueues {
    pub pulse_jobs: BoundedQueue<Job>,
    pub intervention_jobs: BoundedQueue<Job>,
    pub code_jobs: BoundedQueue<Job>,
    pub pulse_outcomes: BoundedQueue<Outcome>,
    pub intervention_outcomes: BoundedQueue<Outcome>,
    pub code_outcomes: BoundedQueue<Outcome>,
}

pub struct Scheduler {
    queues: SchedulerQueues,
    ids: dispatch::JobIdSource,
    /// Caller-provided cap on a single tick's dispatch token budget (spec
    /// §4.1); `None` means the budget computed from queue depth alone.
    max_dispatch: Option<usize>,
    result_batch_size: usize,
}

/// Fraction of capacity at/above which a queue's dispatcher skips the tick
/// entirely rather than dispatch into an already-saturated queue (spec
/// §4.1).
const BACKPRESSURE_SKIP_RATIO: f64 = 0.9;

/// Fraction of free capacity released as dispatch tokens on a tick that
/// isn't skipped outright (spec §4.1).
const BACKPRESSURE_TOKEN_RATIO: f64 = 0.8;

/// Consult a job queue's stats and compute this tick's dispatch token
/// budget per the §4.1 backpressure contract: skip the tick entirely once
/// depth reaches 90% of capacity, otherwise release 80% of the remaining
/// free capacity, capped by `max_dispatch`. A zero-capacity (unbounded)
/// queue has no depth signal to throttle on, so pacing falls back to
/// `max_dispatch` alone.
fn token_budget(queue: &BoundedQueue<Job>, max_dispatch: Option<usize>) -> Option<usize> {
    let stats = queue.stats();
    if stats.capacity == 0 {
        return Some(max_dispatch.unwrap_or(usize::MAX));
    }

    let capacity = stats.capacity as f64;
    let depth = stats.depth as f64;
    if depth >= BACKPRESSURE_SKIP_RATIO * capacity {
        return None;
    }

    let tokens = (BACKPRESSURE_TOKEN_RATIO * (capacity - depth)).floor() as usize;
    Some(match max_dispatch {
        Some(max) => tokens.min(max),
        None => tokens,
    })
}

impl Scheduler {
    pub fn new(queues: SchedulerQueues, max_dispatch: Option<usize>, result_batch_size: usize) -> Self {
        Self { queues, ids: dispatch::JobIdSource::default(), max_dispatch, result_batch_size }
    }

    pub fn queues(&self) -> &SchedulerQueues {
        &self.queues
    }

    /// Run one full tick: schedule, dispatch, then drain results, in that
    /// fixed order so a job enqueued this tick cannot have its result
    /// applied before the dispatch step that produced it completes.
    ///
    /// Each dispatch step first consults its own queue's backpressure
    /// budget (spec §4.1); a queue at or above 90% depth is skipped for the
    /// whole tick rather than dispatched into.
    pub fn tick(&mut self, store: &mut ComponentStore, now: Instant) -> TickStats {
        let scheduled = schedule::run(store, now);

        let pulse_dispatch = match token_budget(&self.queues.pulse_jobs, self.max_dispatch) {
            Some(tokens) => dispatch::run_pulse(store, &self.queues.pulse_jobs, &mut self.ids, tokens),
            None => DispatchStats::default(),
        };
        let intervention_dispatch = match token_budget(&self.queues.intervention_jobs, self.max_dispatch) {
            Some(tokens) => {
                dispatch::run_intervention(store, &self.queues.intervention_jobs, &mut self.ids, tokens)
            }
            None => DispatchStats::default(),
        };
        let code_dispatch = match token_budget(&self.queues.code_jobs, self.max_dispatch) {
            Some(tokens) => dispatch::run_code(store, &self.queues.code_jobs, &mut self.ids, tokens),
            None => DispatchStats::default(),
        };

        let pulse_result = result::run_pulse(store, &self.queues.pulse_outcomes, self.result_batch_size);
        let intervention_result =
            result::run_intervention(store, &self.queues.intervention_outcomes, self.result_batch_size);
        let code_result = result::run_code(store, &self.queues.code_outcomes, self.result_batch_size);

        TickStats {
            scheduled,
            pulse_dispatch,
            intervention_dispatch,
            code_dispatch,
            pulse_result,
            intervention_result,
            code_result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::job::OutcomePayload;
    use crate::spec::{CodeConfig, DurationSpec, PulseConfig, PulseTransport};
    use crate::state::MonitorState;
    use std::time::Duration;

    fn queues() -> SchedulerQueues {
        SchedulerQueues {
            pulse_jobs: BoundedQueue::new(16),
            intervention_jobs: BoundedQueue::new(16),
            code_jobs: BoundedQueue::new(16),
            pulse_outcomes: BoundedQueue::new(16),
            intervention_outcomes: BoundedQueue::new(16),
            code_outcomes: BoundedQueue::new(16),
        }
    }

    fn spawn(store: &mut ComponentStore) -> Entity {
        store.spawn(
            MonitorState::new("svc", false, false),
            PulseConfig {
                transport: PulseTransport::Tcp { host: "h".into(), port: 1 },
                interval: DurationSpec(Duration::from_secs(60)),
                timeout: DurationSpec(Duration::from_secs(1)),
                unhealthy_threshold: 3,
                healthy_threshold: 2,
            },
            None,
            CodeConfig::new(),
        )
    }

    #[test]
    fn first_tick_schedules_and_dispatches_a_pulse() {
        let mut store = ComponentStore::new();
        spawn(&mut store);
        let mut scheduler = Scheduler::new(queues(), Some(100), 100);

        let stats = scheduler.tick(&mut store, Instant::now());
        assert_eq!(stats.scheduled, 1);
        assert_eq!(stats.pulse_dispatch.enqueued, 1);
        assert_eq!(scheduler.queues().pulse_jobs.len(), 1);
    }

    #[test]
    fn token_budget_skips_tick_once_depth_reaches_90_percent() {
        let q: BoundedQueue<Job> = BoundedQueue::new(10);
        q.enqueue_batch(vec![job_stub(); 9]).unwrap();
        assert_eq!(token_budget(&q, Some(100)), None);
    }

    #[test]
    fn token_budget_releases_80_percent_of_free_capacity_capped_by_max_dispatch() {
        let q: BoundedQueue<Job> = BoundedQueue::new(10);
        q.enqueue_batch(vec![job_stub(); 5]).unwrap();
        // capacity=10, depth=5 -> tokens = floor(0.8*5) = 4
        assert_eq!(token_budget(&q, Some(100)), Some(4));
        assert_eq!(token_budget(&q, Some(2)), Some(2));
    }

    #[test]
    fn token_budget_falls_back_to_max_dispatch_on_unbounded_queue() {
        let q: BoundedQueue<Job> = BoundedQueue::new(0);
        assert_eq!(token_budget(&q, Some(7)), Some(7));
    }

    fn job_stub() -> Job {
        use crate::job::JobPayload;
        use crate::spec::PulseTransport;
        use std::time::Duration;
        Job {
            id: 1,
            entity: Entity { index: 0, generation: 0 },
            payload: JobPayload::Pulse {
                transport: PulseTransport::Tcp { host: "h".into(), port: 1 },
                timeout: Duration::from_secs(1),
            },
        }
    }

    #[test]
    fn result_applied_same_tick_it_is_enqueued_by_the_caller() {
        let mut store = ComponentStore::new();
        let e = spawn(&mut store);
        let mut scheduler = Scheduler::new(queues(), Some(100), 100);

        scheduler.tick(&mut store, Instant::now());
        scheduler
            .queues()
            .pulse_outcomes
            .enqueue_batch(vec![Outcome::ok(1, e, OutcomePayload::Pulse { healthy: true })])
            .unwrap();

        let stats = scheduler.tick(&mut store, Instant::now());
        assert_eq!(stats.pulse_result.applied, 1);
    }
}
