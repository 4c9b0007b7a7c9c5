//! `PulseScheduleSystem`: marks monitors due for a pulse this tick.

use std::time::Instant;

use crate::store::ComponentStore;

/// Walk every enabled, non-pending entity and set `pulse_needed` if its
/// first check hasn't run yet or `next_check_time` has elapsed (spec §4.4).
/// Advances `next_check_time` for entities it marks, so a monitor is never
/// marked twice for the same due interval.
///
/// Also excludes entities with an intervention in flight
/// (`InterventionNeeded`/`InterventionPending`): a concurrent pulse
/// dispatched mid-intervention would race that intervention's own mutation
/// of `pulse_failures`/`IncidentOpen` once its result lands.
pub fn run(store: &mut ComponentStore, now: Instant) -> usize {
    let due: Vec<_> = store
        .query_states(|s| {
            !s.flags.disabled()
                && !s.flags.pulse_pending()
                && !s.flags.pulse_needed()
                && !s.flags.intervention_needed()
                && !s.flags.intervention_pending()
                && (s.flags.pulse_first_check() || s.next_check_time.is_some_and(|t| t <= now))
        })
        .collect();

    for entity in &due {
        let interval = store.pulse(*entity).map(|p| p.interval.0).unwrap_or_default();
        if let Some(state) = store.state_mut(*entity) {
            state.flags.set_pulse_needed();
            state.flags.set_pulse_first_check(false);
            state.next_check_time = Some(now + interval);
        }
    }
    due.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{CodeConfig, DurationSpec, PulseConfig, PulseTransport};
    use crate::state::MonitorState;
    use std::time::Duration;

    fn spawn(store: &mut ComponentStore, name: &str, interval_secs: u64) -> crate::entity::Entity {
        store.spawn(
            MonitorState::new(name, false, false),
            PulseConfig {
                transport: PulseTransport::Tcp { host: "h".into(), port: 1 },
                interval: DurationSpec(Duration::from_secs(interval_secs)),
                timeout: DurationSpec(Duration::from_secs(1)),
                unhealthy_threshold: 3,
                healthy_threshold: 2,
            },
            None,
            CodeConfig::new(),
        )
    }

    #[test]
    fn first_check_is_always_due_immediately() {
        let mut store = ComponentStore::new();
        let e = spawn(&mut store, "svc", 60);
        let marked = run(&mut store, Instant::now());
        assert_eq!(marked, 1);
        assert!(store.state(e).unwrap().flags.pulse_needed());
    }

    #[test]
    fn does_not_remark_before_interval_elapses() {
        let mut store = ComponentStore::new();
        spawn(&mut store, "svc", 60);
        let now = Instant::now();
        run(&mut store, now);
        // Clear pulse_needed to simulate dispatch having picked it up.
        let e = store.entity_by_name("svc").unwrap();
        store.state_mut(e).unwrap().flags.clear_pulse_needed();

        let marked = run(&mut store, now + Duration::from_secs(1));
        assert_eq!(marked, 0);
    }

    #[test]
    fn disabled_monitor_is_never_marked() {
        let mut store = ComponentStore::new();
        store.spawn(
            MonitorState::new("svc", false, true),
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
        let marked = run(&mut store, Instant::now());
        assert_eq!(marked, 0);
    }
}
