//! `PulseResultSystem`, `InterventionResultSystem`, `CodeResultSystem`:
//! drain a result queue and fold each `Outcome` into its entity's
//! `MonitorState` via `state_machine`.
//!
//! Three guards are applied uniformly before any transition runs (spec
//! §4.5): an outcome for an entity that no longer exists is an
//! `InvariantViolation`, logged and skipped; a `Disabled` entity has its
//! pending flag cleared without any further transition; and a pending
//! result for an entity that isn't actually in the matching `*_pending`
//! state is warned about and dropped, since applying it again would
//! double-count a result the state machine already consumed.

use std::time::Instant;

use tracing::warn;

use crate::job::{Outcome, OutcomePayload};
use crate::queue::BoundedQueue;
use crate::state_machine;
use crate::store::ComponentStore;
use crate::systems::ResultStats;

pub fn run_pulse(store: &mut ComponentStore, queue: &BoundedQueue<Outcome>, max: usize) -> ResultStats {
    let mut stats = ResultStats::default();
    let now = Instant::now();
    for outcome in queue.try_dequeue_batch(max) {
        let Some(state) = store.state(outcome.entity) else {
            warn!(entity = %outcome.entity, "pulse result for unknown entity");
            stats.errors += 1;
            continue;
        };

        if state.flags.disabled() {
            if let Some(state) = store.state_mut(outcome.entity) {
                state.flags.clear_pulse_pending();
            }
            continue;
        }

        if !state.flags.pulse_pending() {
            warn!(entity = %outcome.entity, "pulse result for non-pending entity, dropping");
            stats.errors += 1;
            continue;
        }

        let Some(pulse) = store.pulse(outcome.entity).cloned() else {
            stats.errors += 1;
            continue;
        };
        match outcome.result {
            Ok(OutcomePayload::Pulse { healthy }) => {
                if let Some(state) = store.state_mut(outcome.entity) {
                    state_machine::apply_pulse_result(state, &pulse, healthy, now);
                    stats.applied += 1;
                }
            }
            Ok(_) => {
                warn!(entity = %outcome.entity, "pulse result queue received non-pulse payload");
                stats.errors += 1;
            }
            Err(error) => {
                if let Some(state) = store.state_mut(outcome.entity) {
                    state.last_error = Some(error.to_string());
                    state_machine::apply_pulse_result(state, &pulse, false, now);
                    stats.applied += 1;
                }
            }
        }
    }
    stats
}

pub fn run_intervention(
    store: &mut ComponentStore,
    queue: &BoundedQueue<Outcome>,
    max: usize,
) -> ResultStats {
    let mut stats = ResultStats::default();
    for outcome in queue.try_dequeue_batch(max) {
        let Some(state) = store.state(outcome.entity) else {
            warn!(entity = %outcome.entity, "intervention result for unknown entity");
            stats.errors += 1;
            continue;
        };

        if state.flags.disabled() {
            if let Some(state) = store.state_mut(outcome.entity) {
                state.flags.clear_intervention_pending();
            }
            continue;
        }

        if !state.flags.intervention_pending() {
            warn!(entity = %outcome.entity, "intervention result for non-pending entity, dropping");
            stats.errors += 1;
            continue;
        }

        let Some(intervention) = store.intervention(outcome.entity).cloned() else {
            warn!(entity = %outcome.entity, "intervention result for entity without intervention config");
            stats.errors += 1;
            continue;
        };
        let Some(pulse) = store.pulse(outcome.entity).cloned() else {
            stats.errors += 1;
            continue;
        };
        match outcome.result {
            Ok(OutcomePayload::Intervention { recovered }) => {
                if let Some(state) = store.state_mut(outcome.entity) {
                    state_machine::apply_intervention_result(state, &intervention, &pulse, recovered);
                    stats.applied += 1;
                }
            }
            Ok(_) => {
                warn!(entity = %outcome.entity, "intervention result queue received non-intervention payload");
                stats.errors += 1;
            }
            Err(error) => {
                if let Some(state) = store.state_mut(outcome.entity) {
                    state.last_error = Some(error.to_string());
                    state_machine::apply_intervention_result(state, &intervention, &pulse, false);
                    stats.applied += 1;
                }
            }
        }
    }
    stats
}

pub fn run_code(store: &mut ComponentStore, queue: &BoundedQueue<Outcome>, max: usize) -> ResultStats {
    let mut stats = ResultStats::default();
    for outcome in queue.try_dequeue_batch(max) {
        let Some(state) = store.state(outcome.entity) else {
            warn!(entity = %outcome.entity, "code result for unknown entity");
            stats.errors += 1;
            continue;
        };

        if state.flags.disabled() {
            if let Some(state) = store.state_mut(outcome.entity) {
                state.flags.clear_code_pending();
            }
            continue;
        }

        if !state.flags.code_pending() {
            warn!(entity = %outcome.entity, "code result for non-pending entity, dropping");
            stats.errors += 1;
            continue;
        }

        match outcome.result {
            Ok(OutcomePayload::Code { delivered }) => {
                let Some(color) = outcome.color.clone() else {
                    warn!(entity = %outcome.entity, "code result missing its dispatched color, dropping");
                    stats.errors += 1;
                    continue;
                };
                if let Some(state) = store.state_mut(outcome.entity) {
                    state_machine::apply_code_result(state, color, delivered, None);
                    stats.applied += 1;
                }
            }
            Ok(_) => {
                warn!(entity = %outcome.entity, "code result queue received non-code payload");
                stats.errors += 1;
            }
            Err(error) => {
                let Some(color) = outcome.color.clone() else {
                    warn!(entity = %outcome.entity, "code error result missing its dispatched color, dropping");
                    stats.errors += 1;
                    continue;
                };
                if let Some(state) = store.state_mut(outcome.entity) {
                    state_machine::apply_code_result(state, color, false, Some(error.to_string()));
                    stats.applied += 1;
                }
            }
        }
    }
    stats
}
