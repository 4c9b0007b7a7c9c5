//! Executor trait and reference in-memory implementation.
//!
//! Grounded on the teacher's `ExecutionBackend` trait (`backends/mod.rs`):
//! one trait, implemented per backend, dispatched on a `backend_type()`-style
//! discriminant. The engine's dispatch surface is synchronous (spec §1:
//! engine API carries no `async fn`), so `execute` returns its `Result`
//! directly instead of the teacher's `AsyncTask<ExecutionResult>` handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::EngineError;
use crate::job::{Job, JobPayload, OutcomePayload};
use crate::spec::{InterventionTarget, PulseTransport};

/// Runs one job to completion on the calling (worker) thread.
///
/// Implementations must be side-effect-isolated from the component store:
/// workers only see the immutable `Job` payload and return an
/// `OutcomePayload` or `EngineError` (spec §5).
pub trait Executor: Send + Sync + std::fmt::Debug {
    fn execute(&self, job: &Job) -> Result<OutcomePayload, EngineError>;

    /// Identifier used in logs and error messages.
    fn backend_type(&self) -> &'static str;
}

/// Reference pulse executor: resolves health from an in-memory table keyed
/// by transport-derived address rather than making real network calls. Test
/// scenarios (spec §8 S1-S6) populate the table to script outcomes.
#[derive(Debug, Default)]
pub struct SimulatedPulseExecutor {
    healthy: Mutex<std::collections::HashMap<String, bool>>,
}

impl SimulatedPulseExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_healthy(&self, key: impl Into<String>, healthy: bool) {
        self.healthy.lock().unwrap().insert(key.into(), healthy);
    }

    fn key(transport: &PulseTransport) -> String {
        match transport {
            PulseTransport::Http { url, .. } => url.clone(),
            PulseTransport::Tcp { host, port } => format!("{host}:{port}"),
            PulseTransport::Icmp { host, .. } => host.clone(),
        }
    }
}

impl Executor for SimulatedPulseExecutor {
    fn execute(&self, job: &Job) -> Result<OutcomePayload, EngineError> {
        let JobPayload::Pulse { transport, .. } = &job.payload else {
            return Err(EngineError::invariant_violation("pulse executor received non-pulse job"));
        };
        let key = Self::key(transport);
        let healthy = *self.healthy.lock().unwrap().get(&key).unwrap_or(&true);
        Ok(OutcomePayload::Pulse { healthy })
    }

    fn backend_type(&self) -> &'static str {
        "simulated-pulse"
    }
}

/// Reference intervention executor: records attempts and reports
/// recoverability from an in-memory counter, standing in for a real action
/// like restarting a container (spec §6 `InterventionTarget::Docker`).
#[derive(Debug, Default)]
pub struct SimulatedInterventionExecutor {
    succeeds: Mutex<std::collections::HashMap<String, bool>>,
    attempts: AtomicU64,
}

impl SimulatedInterventionExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_succeeds(&self, key: impl Into<String>, succeeds: bool) {
        self.succeeds.lock().unwrap().insert(key.into(), succeeds);
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    fn key(target: &InterventionTarget) -> &str {
        match target {
            InterventionTarget::Docker { container, .. } => container,
        }
    }
}

impl Executor for SimulatedInterventionExecutor {
    fn execute(&self, job: &Job) -> Result<OutcomePayload, EngineError> {
        let JobPayload::Intervention { target } = &job.payload else {
            return Err(EngineError::invariant_violation(
                "intervention executor received non-intervention job",
            ));
        };
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let key = Self::key(target);
        let recovered = *self.succeeds.lock().unwrap().get(key).unwrap_or(&true);
        Ok(OutcomePayload::Intervention { recovered })
    }

    fn backend_type(&self) -> &'static str {
        "simulated-intervention"
    }
}

/// Reference code executor: appends a line per delivered notification to an
/// in-memory log instead of calling out to Slack/PagerDuty/a file.
#[derive(Debug, Default)]
pub struct SimulatedCodeExecutor {
    deliveries: Mutex<Vec<(String, String)>>,
}

impl SimulatedCodeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<(String, String)> {
        self.deliveries.lock().unwrap().clone()
    }
}

impl Executor for SimulatedCodeExecutor {
    fn execute(&self, job: &Job) -> Result<OutcomePayload, EngineError> {
        let JobPayload::Code { color, sink } = &job.payload else {
            return Err(EngineError::invariant_violation("code executor received non-code job"));
        };
        self.deliveries.lock().unwrap().push((color.clone(), sink.sink_name().to_string()));
        Ok(OutcomePayload::Code { delivered: true })
    }

    fn backend_type(&self) -> &'static str {
        "simulated-code"
    }
}

/// Per-job-kind executor timeout used by the worker pool to bound a job's
/// wall-clock time before it's surfaced as a `Transport` timeout error
/// (spec §5).
pub fn default_timeout(payload: &JobPayload) -> Duration {
    match payload {
        JobPayload::Pulse { timeout, .. } => *timeout,
        JobPayload::Intervention { target } => match target {
            InterventionTarget::Docker { timeout, .. } => timeout.0,
        },
        JobPayload::Code { .. } => Duration::from_secs(5),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::spec::NotifySink;

    fn entity() -> Entity {
        Entity { index: 0, generation: 0 }
    }

    #[test]
    fn simulated_pulse_executor_defaults_healthy() {
        let exec = SimulatedPulseExecutor::new();
        let job = Job {
            id: 1,
            entity: entity(),
            payload: JobPayload::Pulse {
                transport: PulseTransport::Tcp { host: "localhost".into(), port: 80 },
                timeout: Duration::from_secs(1),
            },
        };
        let outcome = exec.execute(&job).unwrap();
        assert!(matches!(outcome, OutcomePayload::Pulse { healthy: true }));
    }

    #[test]
    fn simulated_pulse_executor_honors_scripted_failure() {
        let exec = SimulatedPulseExecutor::new();
        exec.set_healthy("localhost:80", false);
        let job = Job {
            id: 1,
            entity: entity(),
            payload: JobPayload::Pulse {
                transport: PulseTransport::Tcp { host: "localhost".into(), port: 80 },
                timeout: Duration::from_secs(1),
            },
        };
        let outcome = exec.execute(&job).unwrap();
        assert!(matches!(outcome, OutcomePayload::Pulse { healthy: false }));
    }

    #[test]
    fn simulated_code_executor_records_delivery() {
        let exec = SimulatedCodeExecutor::new();
        let job = Job {
            id: 1,
            entity: entity(),
            payload: JobPayload::Code {
                color: "red".into(),
                sink: NotifySink::Log { file: "/tmp/x".into() },
            },
        };
        exec.execute(&job).unwrap();
        assert_eq!(exec.deliveries(), vec![("red".to_string(), "log".to_string())]);
    }
}
