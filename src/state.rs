//! The per-monitor hot record and its flag bitset.
//!
//! `MonitorState` is iterated every scheduler tick, so it stays a plain,
//! non-atomic struct: the redesign in spec §9 confines every mutation to the
//! single scheduler thread, so there is no need for the atomic bitfield the
//! teacher's original flows used when multiple threads could touch shared
//! state.

use std::time::Instant;

/// Bit positions within `MonitorState.flags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
enum Bit {
    Disabled = 1 << 0,
    PulseNeeded = 1 << 1,
    PulsePending = 1 << 2,
    PulseFirstCheck = 1 << 3,
    HasIntervention = 1 << 4,
    InterventionNeeded = 1 << 5,
    InterventionPending = 1 << 6,
    CodeNeeded = 1 << 7,
    CodePending = 1 << 8,
    IncidentOpen = 1 << 9,
    Verifying = 1 << 10,
}

/// Bitset over the monitor's transient and sticky flags.
///
/// Kept as a plain `u16` rather than reaching for a crate: the set is small,
/// fixed, and entirely internal, so a handful of `const` masks read better
/// than a macro-generated type here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u16);

impl Flags {
    #[inline]
    fn has(self, bit: Bit) -> bool {
        self.0 & (bit as u16) != 0
    }

    #[inline]
    fn set(&mut self, bit: Bit) {
        self.0 |= bit as u16;
    }

    #[inline]
    fn clear(&mut self, bit: Bit) {
        self.0 &= !(bit as u16);
    }

    pub fn disabled(self) -> bool {
        self.has(Bit::Disabled)
    }
    pub fn set_disabled(&mut self, v: bool) {
        if v { self.set(Bit::Disabled) } else { self.clear(Bit::Disabled) }
    }

    pub fn pulse_needed(self) -> bool {
        self.has(Bit::PulseNeeded)
    }
    pub fn set_pulse_needed(&mut self) {
        self.set(Bit::PulseNeeded)
    }
    pub fn clear_pulse_needed(&mut self) {
        self.clear(Bit::PulseNeeded)
    }

    pub fn pulse_pending(self) -> bool {
        self.has(Bit::PulsePending)
    }
    pub fn set_pulse_pending(&mut self) {
        self.set(Bit::PulsePending)
    }
    pub fn clear_pulse_pending(&mut self) {
        self.clear(Bit::PulsePending)
    }

    pub fn pulse_first_check(self) -> bool {
        self.has(Bit::PulseFirstCheck)
    }
    pub fn set_pulse_first_check(&mut self, v: bool) {
        if v { self.set(Bit::PulseFirstCheck) } else { self.clear(Bit::PulseFirstCheck) }
    }

    pub fn has_intervention(self) -> bool {
        self.has(Bit::HasIntervention)
    }
    pub fn set_has_intervention(&mut self, v: bool) {
        if v { self.set(Bit::HasIntervention) } else { self.clear(Bit::HasIntervention) }
    }

    pub fn intervention_needed(self) -> bool {
        self.has(Bit::InterventionNeeded)
    }
    pub fn set_intervention_needed(&mut self) {
        self.set(Bit::InterventionNeeded)
    }
    pub fn clear_intervention_needed(&mut self) {
        self.clear(Bit::InterventionNeeded)
    }

    pub fn intervention_pending(self) -> bool {
        self.has(Bit::InterventionPending)
    }
    pub fn set_intervention_pending(&mut self) {
        self.set(Bit::InterventionPending)
    }
    pub fn clear_intervention_pending(&mut self) {
        self.clear(Bit::InterventionPending)
    }

    pub fn code_needed(self) -> bool {
        self.has(Bit::CodeNeeded)
    }
    pub fn set_code_needed(&mut self) {
        self.set(Bit::CodeNeeded)
    }
    pub fn clear_code_needed(&mut self) {
        self.clear(Bit::CodeNeeded)
    }

    pub fn code_pending(self) -> bool {
        self.has(Bit::CodePending)
    }
    pub fn set_code_pending(&mut self) {
        self.set(Bit::CodePending)
    }
    pub fn clear_code_pending(&mut self) {
        self.clear(Bit::CodePending)
    }

    pub fn incident_open(self) -> bool {
        self.has(Bit::IncidentOpen)
    }
    pub fn set_incident_open(&mut self, v: bool) {
        if v { self.set(Bit::IncidentOpen) } else { self.clear(Bit::IncidentOpen) }
    }

    pub fn verifying(self) -> bool {
        self.has(Bit::Verifying)
    }
    pub fn set_verifying(&mut self, v: bool) {
        if v { self.set(Bit::Verifying) } else { self.clear(Bit::Verifying) }
    }

    /// A code is already in flight (either queued for dispatch or dispatched
    /// and awaiting a result): first-writer-wins on `trigger_code`.
    pub fn code_in_flight(self) -> bool {
        self.code_needed() || self.code_pending()
    }
}

/// The single hot record iterated every tick for one monitor.
#[derive(Debug, Clone)]
pub struct MonitorState {
    pub name: String,
    pub flags: Flags,

    pub last_check_time: Option<Instant>,
    pub last_success_time: Option<Instant>,
    pub next_check_time: Option<Instant>,

    pub pulse_failures: u32,
    pub intervention_failures: u32,
    pub recovery_streak: u32,
    pub verify_remaining: i32,

    pub pending_code: Option<String>,
    pub last_error: Option<String>,
}

impl MonitorState {
    pub fn new(name: impl Into<String>, has_intervention: bool, disabled: bool) -> Self {
        let mut flags = Flags::default();
        flags.set_has_intervention(has_intervention);
        flags.set_disabled(disabled);
        flags.set_pulse_first_check(!disabled);

        Self {
            name: name.into(),
            flags,
            last_check_time: None,
            last_success_time: None,
            next_check_time: None,
            pulse_failures: 0,
            intervention_failures: 0,
            recovery_streak: 0,
            verify_remaining: 0,
            pending_code: None,
            last_error: None,
        }
    }

    /// Assign `color` to `pending_code` and mark a code dispatch needed,
    /// unless one is already in flight (first-writer wins, spec §4.5).
    pub fn trigger_code(&mut self, color: &str) {
        if self.flags.code_in_flight() {
            return;
        }
        self.pending_code = Some(color.to_string());
        self.flags.set_code_needed();
    }

    /// Clear every transient pending flag, used when an entity is disabled
    /// mid-flight (spec §4.5 "Disable").
    pub fn clear_pending_on_disable(&mut self) {
        self.flags.clear_pulse_needed();
        self.flags.clear_intervention_needed();
        self.flags.clear_code_needed();
    }
}
