//! `PulseDispatchSystem`, `InterventionDispatchSystem`, `CodeDispatchSystem`:
//! turn `*_needed` entities into `Job`s and enqueue them as one batch.
//!
//! Backpressure handling is uniform across all three (spec §4.1): a
//! rejected batch leaves every entity's `*_needed` flag set so next tick's
//! dispatch retries the same entities, and the queue's own `dropped_total`
//! stat already reflects the rejection, so the state machine does not need
//! a parallel drop counter.

use tracing::warn;

use crate::entity::Entity;
use crate::job::{Job, JobId, JobPayload};
use crate::queue::BoundedQueue;
use crate::store::ComponentStore;
use crate::systems::DispatchStats;

/// Shared id source for jobs across all three dispatch systems. A single
/// `AtomicU64`-backed counter would also work; a plain counter suffices
/// because dispatch only ever runs on the scheduler thread.
#[derive(Debug, Default)]
pub struct JobIdSource(JobId);

impl JobIdSource {
    pub fn next(&mut self) -> JobId {
        self.0 += 1;
        self.0
    }
}

pub fn run_pulse(
    store: &mut ComponentStore,
    queue: &BoundedQueue<Job>,
    ids: &mut JobIdSource,
    batch_size: usize,
) -> DispatchStats {
    let candidates: Vec<Entity> =
        store.query_states(|s| s.flags.pulse_needed() && !s.flags.pulse_pending()).take(batch_size).collect();

    let mut jobs = Vec::with_capacity(candidates.len());
    for entity in &candidates {
        let Some(pulse) = store.pulse(*entity) else { continue };
        jobs.push(Job {
            id: ids.next(),
            entity: *entity,
            payload: JobPayload::Pulse { transport: pulse.transport.clone(), timeout: pulse.timeout.0 },
        });
    }

    let considered = candidates.len();
    match queue.enqueue_batch(jobs) {
        Ok(()) => {
            for entity in &candidates {
                if let Some(state) = store.state_mut(*entity) {
                    state.flags.clear_pulse_needed();
                    state.flags.set_pulse_pending();
                }
            }
            DispatchStats { considered, enqueued: considered, rejected: 0 }
        }
        Err(_) => DispatchStats { considered, enqueued: 0, rejected: considered },
    }
}

pub fn run_intervention(
    store: &mut ComponentStore,
    queue: &BoundedQueue<Job>,
    ids: &mut JobIdSource,
    batch_size: usize,
) -> DispatchStats {
    let candidates: Vec<Entity> = store
        .query_states(|s| s.flags.intervention_needed() && !s.flags.intervention_pending())
        .take(batch_size)
        .collect();

    let mut jobs = Vec::with_capacity(candidates.len());
    for entity in &candidates {
        let Some(intervention) = store.intervention(*entity) else { continue };
        jobs.push(Job {
            id: ids.next(),
            entity: *entity,
            payload: JobPayload::Intervention { target: intervention.target.clone() },
        });
    }

    let considered = candidates.len();
    match queue.enqueue_batch(jobs) {
        Ok(()) => {
            for entity in &candidates {
                if let Some(state) = store.state_mut(*entity) {
                    state.flags.clear_intervention_needed();
                    state.flags.set_intervention_pending();
                }
            }
            DispatchStats { considered, enqueued: considered, rejected: 0 }
        }
        Err(_) => DispatchStats { considered, enqueued: 0, rejected: considered },
    }
}

pub fn run_code(
    store: &mut ComponentStore,
    queue: &BoundedQueue<Job>,
    ids: &mut JobIdSource,
    batch_size: usize,
) -> DispatchStats {
    let candidates: Vec<Entity> =
        store.query_states(|s| s.flags.code_needed() && !s.flags.code_pending()).take(batch_size).collect();

    // Entities that yield a real job to enqueue, versus entities that must
    // be dropped outright because there is nothing to dispatch for them
    // (missing color, unrecognized color, or a code entry with
    // `dispatch == false`) — the latter must never be left with
    // `CodeNeeded` stuck and no job ever enqueued (spec §3, §4.5 "unknown
    // color... warn, clear, do not retry").
    let mut jobs = Vec::with_capacity(candidates.len());
    let mut dispatchable = Vec::with_capacity(candidates.len());
    let mut skipped = Vec::new();

    for entity in &candidates {
        let color = store.state(*entity).and_then(|s| s.pending_code.clone());
        let Some(color) = color else {
            skipped.push(*entity);
            continue;
        };
        let entry = store.codes(*entity).and_then(|codes| codes.get(&color).cloned());
        let Some(entry) = entry else {
            warn!(entity = %entity, color = %color, "code dispatch: unrecognized color, dropping");
            skipped.push(*entity);
            continue;
        };
        if !entry.dispatch {
            skipped.push(*entity);
            continue;
        }
        jobs.push(Job { id: ids.next(), entity: *entity, payload: JobPayload::Code { color, sink: entry.notify } });
        dispatchable.push(*entity);
    }

    for entity in &skipped {
        if let Some(state) = store.state_mut(*entity) {
            state.flags.clear_code_needed();
            state.pending_code = None;
        }
    }

    let considered = candidates.len();
    match queue.enqueue_batch(jobs) {
        Ok(()) => {
            for entity in &dispatchable {
                if let Some(state) = store.state_mut(*entity) {
                    state.flags.clear_code_needed();
                    state.flags.set_code_pending();
                }
            }
            DispatchStats { considered, enqueued: dispatchable.len(), rejected: 0 }
        }
        Err(_) => DispatchStats { considered, enqueued: 0, rejected: dispatchable.len() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{CodeConfig, DurationSpec, PulseConfig, PulseTransport};
    use crate::state::MonitorState;
    use std::time::Duration;

    fn spawn_needing_pulse(store: &mut ComponentStore, name: &str) -> Entity {
        let e = store.spawn(
            MonitorState::new(name, false, false),
            PulseConfig {
                transport: PulseTransport::Tcp { host: "h".into(), port: 1 },
                interval: DurationSpec(Duration::from_secs(1)),
                timeout: DurationSpec(Duration::from_secs(1)),
                unhealthy_threshold: 3,
                healthy_threshold: 2,
            },
            None,
            CodeConfig::new(),
        );
        store.state_mut(e).unwrap().flags.set_pulse_needed();
        e
    }

    #[test]
    fn pulse_dispatch_enqueues_and_flips_flags() {
        let mut store = ComponentStore::new();
        let e = spawn_needing_pulse(&mut store, "svc");
        let queue = BoundedQueue::new(16);
        let mut ids = JobIdSource::default();

        let stats = run_pulse(&mut store, &queue, &mut ids, 10);
        assert_eq!(stats.enqueued, 1);
        assert_eq!(queue.len(), 1);
        let state = store.state(e).unwrap();
        assert!(!state.flags.pulse_needed());
        assert!(state.flags.pulse_pending());
    }

    #[test]
    fn rejected_batch_leaves_needed_flag_set() {
        let mut store = ComponentStore::new();
        let e = spawn_needing_pulse(&mut store, "svc");
        let queue = BoundedQueue::new(0);
        let mut ids = JobIdSource::default();

        let stats = run_pulse(&mut store, &queue, &mut ids, 10);
        assert_eq!(stats.rejected, 1);
        assert!(store.state(e).unwrap().flags.pulse_needed());
        assert!(!store.state(e).unwrap().flags.pulse_pending());
    }

    #[test]
    fn batch_size_caps_how_many_are_considered_per_tick() {
        let mut store = ComponentStore::new();
        spawn_needing_pulse(&mut store, "a");
        spawn_needing_pulse(&mut store, "b");
        let queue = BoundedQueue::new(16);
        let mut ids = JobIdSource::default();

        let stats = run_pulse(&mut store, &queue, &mut ids, 1);
        assert_eq!(stats.considered, 1);
    }
}
