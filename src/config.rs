//! Runtime configuration for the monitor engine (spec §6).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Flat runtime configuration record for the engine.
///
/// Mirrors the teacher's `RamdiskConfig`: a plain `serde`-derived struct with
/// a `Default` carrying the suggested defaults, constructed via `with_*`
/// setters rather than field-by-field mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Scheduler tick period.
    #[serde(with = "duration_ms")]
    pub tick_period: Duration,

    pub pulse_queue_capacity: usize,
    pub intervention_queue_capacity: usize,
    pub code_queue_capacity: usize,

    pub worker_pool_min: usize,
    pub worker_pool_max: usize,
    pub worker_pool_scale_step: usize,
    #[serde(with = "duration_ms")]
    pub worker_pool_scale_interval: Duration,

    pub dispatch_batch_size: usize,

    /// Overrides the per-tick dispatch token budget computed from queue
    /// depth (spec §4.1); `None` uses the computed value.
    pub max_dispatch_override: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(100),
            pulse_queue_capacity: 65_536,
            intervention_queue_capacity: 65_536,
            code_queue_capacity: 65_536,
            worker_pool_min: 4,
            worker_pool_max: 2 * num_cpus::get(),
            worker_pool_scale_step: 2,
            worker_pool_scale_interval: Duration::from_secs(5),
            dispatch_batch_size: 1_000,
            max_dispatch_override: None,
        }
    }
}

impl EngineConfig {
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    pub fn with_queue_capacities(mut self, pulse: usize, intervention: usize, code: usize) -> Self {
        self.pulse_queue_capacity = pulse;
        self.intervention_queue_capacity = intervention;
        self.code_queue_capacity = code;
        self
    }

    pub fn with_worker_pool_bounds(mut self, min: usize, max: usize) -> Self {
        self.worker_pool_min = min;
        self.worker_pool_max = max.max(min);
        self
    }

    pub fn with_dispatch_batch_size(mut self, batch_size: usize) -> Self {
        self.dispatch_batch_size = batch_size;
        self
    }

    pub fn with_max_dispatch_override(mut self, max_dispatch: Option<usize>) -> Self {
        self.max_dispatch_override = max_dispatch;
        self
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
