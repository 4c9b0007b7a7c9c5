//! Job and outcome payloads passed between the scheduler and worker pools.
//!
//! Grounded on the teacher's `ExecutionTask` / `ExecutionOutcome` pair
//! (`task.rs`): a small `id` plus an immutable payload going one way, a
//! `task_id`-correlated result coming back. Here the payload is a
//! three-variant enum instead of a bare language/code pair, since the three
//! pipelines (pulse, intervention, code) carry different data.

use crate::entity::Entity;
use crate::error::EngineError;
use crate::spec::{InterventionTarget, NotifySink, PulseTransport};

/// Monotonically increasing id assigned at enqueue time, used to correlate
/// an `Outcome` back to the `Job` that produced it.
pub type JobId = u64;

/// What kind of work a `Job` carries; mirrors the three dispatch systems in
/// spec §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Pulse,
    Intervention,
    Code,
}

/// Immutable unit of work handed to a worker thread. Workers only read
/// `payload`; they never touch the component store (spec §5).
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub entity: Entity,
    pub payload: JobPayload,
}

#[derive(Debug, Clone)]
pub enum JobPayload {
    Pulse { transport: PulseTransport, timeout: std::time::Duration },
    Intervention { target: InterventionTarget },
    Code { color: String, sink: NotifySink },
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self.payload {
            JobPayload::Pulse { .. } => JobKind::Pulse,
            JobPayload::Intervention { .. } => JobKind::Intervention,
            JobPayload::Code { .. } => JobKind::Code,
        }
    }
}

/// Result of running one `Job`, published by a worker onto the result
/// channel for its kind.
///
/// `color` carries the dispatched color for a code job regardless of
/// whether it succeeded or failed, since spec §6 requires the result
/// payload's color to survive an error so the result system can restore
/// `pending_code` for a retry; it is `None` for pulse/intervention outcomes.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub job_id: JobId,
    pub entity: Entity,
    pub color: Option<String>,
    pub result: Result<OutcomePayload, EngineError>,
}

#[derive(Debug, Clone)]
pub enum OutcomePayload {
    Pulse { healthy: bool },
    Intervention { recovered: bool },
    Code { delivered: bool },
}

impl Outcome {
    pub fn ok(job_id: JobId, entity: Entity, payload: OutcomePayload) -> Self {
        Self { job_id, entity, color: None, result: Ok(payload) }
    }

    pub fn err(job_id: JobId, entity: Entity, error: EngineError) -> Self {
        Self { job_id, entity, color: None, result: Err(error) }
    }

    /// Attach the dispatched color to a code outcome; a no-op for other
    /// outcome kinds since only code results need it restored on failure.
    pub fn with_color(mut self, color: Option<String>) -> Self {
        self.color = color;
        self
    }
}
