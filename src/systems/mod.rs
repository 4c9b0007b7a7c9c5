//! The six systems run in fixed order every scheduler tick (spec §4.4):
//! `PulseSchedule -> PulseDispatch -> InterventionDispatch -> CodeDispatch ->
//! {PulseResult, InterventionResult, CodeResult}`.
//!
//! Each system is a free function over `&mut ComponentStore` plus whatever
//! queues it touches, rather than a struct implementing a shared trait: the
//! six systems have different arity (some read one queue, some read one and
//! write another), so a uniform `System::run(&mut World)` trait would need
//! an awkward shared context type. The teacher's `State` transition table
//! (`state.rs`) is similarly a set of free functions over explicit
//! arguments rather than a trait object per transition.

pub mod dispatch;
pub mod result;
pub mod schedule;

/// Per-tick counters returned by a dispatch system, folded into
/// `SchedulerStats` (spec §4.4).
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchStats {
    pub considered: usize,
    pub enqueued: usize,
    pub rejected: usize,
}

/// Per-tick counters returned by a result system.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultStats {
    pub applied: usize,
    pub errors: usize,
}
