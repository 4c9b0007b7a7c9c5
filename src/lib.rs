//! ============================================================================
//! pulsewatch: monitor state engine
//! ============================================================================
//!
//! A pulse/intervention/code dispatch pipeline over a bounded work-queue and
//! adaptive worker-pool core:
//! - Data-oriented component store keyed by generational `Entity` handles
//! - Bounded MPMC work queues with all-or-nothing batch enqueue
//! - Dynamic worker pools that scale between a min and max thread count
//! - A single-threaded cooperative scheduler driving six ordered systems
//! - A per-monitor state machine with first-writer-wins code dispatch
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pulsewatch::config::EngineConfig;
//! use pulsewatch::engine::MonitorEngine;
//! use pulsewatch::executors::{SimulatedCodeExecutor, SimulatedInterventionExecutor, SimulatedPulseExecutor};
//! use pulsewatch::spec::{CodeConfig, DurationSpec, MonitorSpec, PulseConfig, PulseTransport};
//!
//! let spec = MonitorSpec {
//!     name: "svc-a".into(),
//!     enabled: true,
//!     pulse: PulseConfig {
//!         transport: PulseTransport::Tcp { host: "localhost".into(), port: 8080 },
//!         interval: DurationSpec(std::time::Duration::from_secs(30)),
//!         timeout: DurationSpec(std::time::Duration::from_secs(2)),
//!         unhealthy_threshold: 3,
//!         healthy_threshold: 2,
//!     },
//!     intervention: None,
//!     codes: CodeConfig::new(),
//! };
//!
//! let mut engine = MonitorEngine::new(
//!     vec![spec],
//!     EngineConfig::default(),
//!     Arc::new(SimulatedPulseExecutor::new()),
//!     Arc::new(SimulatedInterventionExecutor::new()),
//!     Arc::new(SimulatedCodeExecutor::new()),
//! ).unwrap();
//!
//! engine.tick();
//! ```

pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod executors;
pub mod job;
pub mod loader;
pub mod queue;
pub mod scheduler;
pub mod spec;
pub mod state;
pub mod state_machine;
pub mod store;
pub mod systems;
pub mod worker_pool;

pub use config::EngineConfig;
pub use engine::{EngineStats, MonitorEngine};
pub use entity::Entity;
pub use error::{EngineError, EngineResult, ErrorKind, LoaderError, LoaderResult};
pub use job::{Job, JobId, JobKind, JobPayload, Outcome, OutcomePayload};
pub use scheduler::{Scheduler, SchedulerQueues, TickStats};
pub use spec::MonitorSpec;
pub use state::MonitorState;
pub use store::ComponentStore;
