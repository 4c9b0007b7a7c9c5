//! Pure state transitions applied by the three result systems.
//!
//! Kept separate from `systems::result` so the transition logic can be unit
//! tested without a running scheduler or worker pool, the way the teacher
//! keeps `State`'s transition table (`state.rs`) free of any I/O.

use std::time::Instant;

use crate::spec::{InterventionConfig, PulseConfig};
use crate::state::MonitorState;

/// Apply a pulse result: update failure/recovery counters, the verification
/// countdown, and trigger a color code on first failure, no-intervention
/// escalation, or recovery (spec §4.5).
///
/// `Verifying` is only ever opened by a successful intervention
/// (`apply_intervention_result`), so it always implies `IncidentOpen`. A
/// no-intervention recovery instead counts consecutive successes in
/// `recovery_streak` without ever touching `Verifying`.
pub fn apply_pulse_result(state: &mut MonitorState, pulse: &PulseConfig, healthy: bool, now: Instant) {
    state.flags.clear_pulse_pending();
    state.last_check_time = Some(now);

    if healthy {
        state.last_success_time = Some(now);

        if state.flags.verifying() {
            state.verify_remaining -= 1;
            if state.verify_remaining <= 0 {
                state.flags.set_verifying(false);
                state.flags.set_incident_open(false);
                state.recovery_streak = 0;
                state.trigger_code("green");
            }
        } else if state.pulse_failures > 0 || state.flags.incident_open() {
            state.recovery_streak += 1;
            if state.recovery_streak >= pulse.healthy_threshold {
                state.trigger_code("green");
                state.flags.set_incident_open(false);
                state.recovery_streak = 0;
            }
        }

        state.pulse_failures = 0;
        return;
    }

    // A pulse failure while verifying a recovery fails the verification
    // window outright; it is handled entirely here rather than falling
    // through to the ordinary failure-counting path below.
    if state.flags.verifying() {
        state.flags.set_verifying(false);
        state.verify_remaining = 0;
        state.recovery_streak = 0;
        if !state.flags.incident_open() {
            state.flags.set_incident_open(true);
            state.trigger_code("red");
        }
        return;
    }

    state.pulse_failures += 1;

    if state.pulse_failures == 1 && !state.flags.incident_open() {
        state.trigger_code("yellow");
    }

    if state.pulse_failures >= pulse.unhealthy_threshold {
        if state.flags.has_intervention() {
            state.flags.set_intervention_needed();
        } else if !state.flags.incident_open() {
            state.flags.set_incident_open(true);
            state.trigger_code("red");
        }
        state.pulse_failures = 0;
        state.recovery_streak = 0;
    }
}

/// Apply an intervention result: on success, start a verification window and
/// trigger `cyan`; on failure, escalate to `red` unless already open
/// (spec §4.5). `max_failures` on `InterventionConfig` is a hint to the
/// executor about how many internal attempts it may make before reporting
/// failure; the state machine itself does not retry an intervention.
pub fn apply_intervention_result(
    state: &mut MonitorState,
    _intervention: &InterventionConfig,
    pulse: &PulseConfig,
    recovered: bool,
) {
    state.flags.clear_intervention_pending();

    if recovered {
        state.pulse_failures = 0;
        state.intervention_failures = 0;
        // `Verifying` must imply `IncidentOpen` (spec §3 invariant 2); set
        // both together since an intervention can succeed on its first
        // attempt, before any failure ever opened the incident.
        state.flags.set_incident_open(true);
        state.flags.set_verifying(true);
        state.verify_remaining = pulse.healthy_threshold as i32;
        state.trigger_code("cyan");
        return;
    }

    state.intervention_failures += 1;
    if !state.flags.incident_open() {
        state.flags.set_incident_open(true);
        state.trigger_code("red");
    }
}

/// Apply a code dispatch result: clear the pending marker. A failed delivery
/// restores `pending_code` and re-sets `CodeNeeded` so the dispatcher
/// retries it; a successful delivery clears `pending_code` entirely
/// (spec §4.5).
pub fn apply_code_result(state: &mut MonitorState, color: String, delivered: bool, error: Option<String>) {
    state.flags.clear_code_pending();
    if delivered {
        state.pending_code = None;
    } else {
        state.pending_code = Some(color);
        state.flags.set_code_needed();
        state.last_error = error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{DurationSpec, InterventionTarget, PulseTransport};
    use std::time::Duration;

    fn pulse_cfg(k1: u32, k2: u32) -> PulseConfig {
        PulseConfig {
            transport: PulseTransport::Tcp { host: "h".into(), port: 1 },
            interval: DurationSpec(Duration::from_secs(1)),
            timeout: DurationSpec(Duration::from_secs(1)),
            unhealthy_threshold: k1,
            healthy_threshold: k2,
        }
    }

    fn intervention_cfg(max_failures: u32) -> InterventionConfig {
        InterventionConfig {
            target: InterventionTarget::Docker {
                container: "c".into(),
                timeout: DurationSpec(Duration::from_secs(1)),
            },
            max_failures,
        }
    }

    #[test]
    fn first_failure_triggers_yellow_once() {
        let mut state = MonitorState::new("svc", false, false);
        let pulse = pulse_cfg(3, 2);
        let now = Instant::now();

        apply_pulse_result(&mut state, &pulse, false, now);
        assert_eq!(state.pending_code.as_deref(), Some("yellow"));

        state.pending_code = None;
        state.flags.clear_code_needed();
        apply_pulse_result(&mut state, &pulse, false, now);
        assert_eq!(state.pending_code, None, "second consecutive failure must not re-trigger yellow");
    }

    #[test]
    fn reaching_threshold_without_intervention_triggers_red_exactly_once() {
        let mut state = MonitorState::new("svc", false, false);
        let pulse = pulse_cfg(2, 2);
        let now = Instant::now();

        apply_pulse_result(&mut state, &pulse, false, now);
        state.pending_code = None;
        state.flags.clear_code_needed();
        apply_pulse_result(&mut state, &pulse, false, now);

        assert_eq!(state.pending_code.as_deref(), Some("red"));
        assert!(state.flags.incident_open());
        assert_eq!(state.pulse_failures, 0);
        assert_eq!(state.recovery_streak, 0);

        // Every subsequent failure must not re-trigger red while the
        // incident stays open with no intervention configured.
        state.pending_code = None;
        state.flags.clear_code_needed();
        apply_pulse_result(&mut state, &pulse, false, now);
        apply_pulse_result(&mut state, &pulse, false, now);
        assert_eq!(state.pending_code, None, "no-intervention escalation law: exactly one red");
    }

    #[test]
    fn reaching_threshold_with_intervention_requests_intervention_not_red() {
        let mut state = MonitorState::new("svc", true, false);
        let pulse = pulse_cfg(1, 2);
        let now = Instant::now();

        apply_pulse_result(&mut state, &pulse, false, now);

        assert!(state.flags.intervention_needed());
        assert_ne!(state.pending_code.as_deref(), Some("red"));
        assert_eq!(state.pulse_failures, 0);
        assert_eq!(state.recovery_streak, 0);
    }

    /// S2 from spec §8: `success, success, fail, success, success` with
    /// K1=3/K2=2 must never touch `Verifying` and must not emit `green`.
    #[test]
    fn isolated_failure_recovers_via_plain_streak_without_verifying() {
        let mut state = MonitorState::new("svc", false, false);
        let pulse = pulse_cfg(3, 2);
        let now = Instant::now();

        apply_pulse_result(&mut state, &pulse, true, now);
        apply_pulse_result(&mut state, &pulse, true, now);
        apply_pulse_result(&mut state, &pulse, false, now);
        assert!(!state.flags.verifying());
        assert!(!state.flags.incident_open());

        state.pending_code = None;
        apply_pulse_result(&mut state, &pulse, true, now);
        assert!(!state.flags.verifying(), "a single isolated failure must not open a verification window");
        assert_eq!(state.pending_code, None);

        apply_pulse_result(&mut state, &pulse, true, now);
        assert_eq!(state.pending_code, None, "no incident was ever open, so no green is expected either");
    }

    #[test]
    fn no_intervention_recovery_reaches_green_via_recovery_streak() {
        let mut state = MonitorState::new("svc", false, false);
        let pulse = pulse_cfg(2, 2);
        let now = Instant::now();

        apply_pulse_result(&mut state, &pulse, false, now);
        state.pending_code = None;
        state.flags.clear_code_needed();
        apply_pulse_result(&mut state, &pulse, false, now); // red, IncidentOpen=true
        assert!(state.flags.incident_open());
        assert!(!state.flags.verifying());

        state.pending_code = None;
        state.flags.clear_code_needed();
        apply_pulse_result(&mut state, &pulse, true, now);
        assert_eq!(state.pending_code, None, "one success of two must not end recovery");
        assert!(state.flags.incident_open());

        apply_pulse_result(&mut state, &pulse, true, now);
        assert_eq!(state.pending_code.as_deref(), Some("green"));
        assert!(!state.flags.incident_open());
    }

    #[test]
    fn pulse_failure_during_verification_reopens_the_incident() {
        let mut state = MonitorState::new("svc", true, false);
        let pulse = pulse_cfg(3, 2);
        let intervention = intervention_cfg(3);
        let now = Instant::now();

        state.flags.set_intervention_pending();
        apply_intervention_result(&mut state, &intervention, &pulse, true);
        assert!(state.flags.verifying());
        state.pending_code = None;
        state.flags.clear_code_needed();

        apply_pulse_result(&mut state, &pulse, false, now);
        assert!(!state.flags.verifying());
        assert_eq!(state.verify_remaining, 0);
        assert_eq!(state.recovery_streak, 0);
        // IncidentOpen was already true from the successful intervention, so
        // no second red is triggered here.
        assert_eq!(state.pending_code, None);
        assert!(state.flags.incident_open());
    }

    #[test]
    fn intervention_success_starts_verification_and_triggers_cyan() {
        let mut state = MonitorState::new("svc", true, false);
        let pulse = pulse_cfg(3, 2);
        let intervention = intervention_cfg(3);
        state.flags.set_intervention_pending();

        apply_intervention_result(&mut state, &intervention, &pulse, true);

        assert!(state.flags.verifying());
        assert!(state.flags.incident_open());
        assert_eq!(state.verify_remaining, 2);
        assert_eq!(state.intervention_failures, 0);
        assert_eq!(state.pending_code.as_deref(), Some("cyan"));
    }

    #[test]
    fn intervention_failure_escalates_to_red_immediately() {
        let mut state = MonitorState::new("svc", true, false);
        let pulse = pulse_cfg(3, 2);
        let intervention = intervention_cfg(2);

        state.flags.set_intervention_pending();
        apply_intervention_result(&mut state, &intervention, &pulse, false);

        assert_eq!(state.intervention_failures, 1);
        assert!(state.flags.incident_open());
        assert_eq!(state.pending_code.as_deref(), Some("red"));
    }

    #[test]
    fn second_intervention_failure_does_not_retrigger_red() {
        let mut state = MonitorState::new("svc", true, false);
        let pulse = pulse_cfg(3, 2);
        let intervention = intervention_cfg(2);

        state.flags.set_intervention_pending();
        apply_intervention_result(&mut state, &intervention, &pulse, false);
        state.pending_code = None;
        state.flags.clear_code_needed();

        state.flags.set_intervention_pending();
        apply_intervention_result(&mut state, &intervention, &pulse, false);
        assert_eq!(state.pending_code, None);
        assert_eq!(state.intervention_failures, 2);
    }

    #[test]
    fn failed_code_delivery_restores_pending_code_for_retry() {
        let mut state = MonitorState::new("svc", false, false);
        state.trigger_code("yellow");
        state.flags.clear_code_needed();
        state.flags.set_code_pending();

        apply_code_result(&mut state, "yellow".into(), false, Some("sink unreachable".into()));
        assert!(!state.flags.code_pending());
        assert!(state.flags.code_needed());
        assert_eq!(state.pending_code.as_deref(), Some("yellow"));
        assert_eq!(state.last_error.as_deref(), Some("sink unreachable"));
    }

    #[test]
    fn delivered_code_clears_pending_code() {
        let mut state = MonitorState::new("svc", false, false);
        state.trigger_code("yellow");
        state.flags.clear_code_needed();
        state.flags.set_code_pending();

        apply_code_result(&mut state, "yellow".into(), true, None);
        assert!(!state.flags.code_pending());
        assert!(!state.flags.code_needed());
        assert_eq!(state.pending_code, None);
    }
}
