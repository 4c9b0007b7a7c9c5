//! Error taxonomy for the monitor engine.
//!
//! `EngineError` covers everything that can go wrong once a monitor is live
//! in the component store (transport failures, backpressure, invariant
//! violations); `LoaderError` covers failures discovered while turning a
//! manifest's `MonitorSpec` values into entities. Neither crosses the
//! process boundary (spec §7): the engine logs and folds every error into
//! the state machine or a metric counter.

use thiserror::Error;

/// Coarse classification of an `EngineError`, carried alongside the message
/// so the state machine can branch on kind without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network/IO failure from a probe or remediation action.
    Transport,
    /// A spec referenced an unknown color, action, or pulse type.
    Configuration,
    /// Enqueue was refused because the destination queue is near full.
    Backpressure,
    /// An executor panicked or otherwise faulted; treated as `Transport` by
    /// the state machine.
    ExecutionFault,
    /// A result arrived for an entity that wasn't in the expected pending
    /// state.
    InvariantViolation,
}

/// Error produced by a job executor or by the engine's own bookkeeping.
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct EngineError {
    pub kind: ErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn backpressure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Backpressure, message)
    }

    pub fn execution_fault(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExecutionFault, message)
    }

    pub fn invariant_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvariantViolation, message)
    }

    /// A timed-out job is surfaced as a `Transport` error per spec §5.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, format!("timeout: {}", message.into()))
    }
}

/// Failures discovered while materializing `MonitorSpec` values into the
/// component store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoaderError {
    #[error("monitor name cannot be empty")]
    EmptyName,

    #[error("duplicate monitor name: {name}")]
    DuplicateName { name: String },

    #[error("unknown pulse type: {pulse_type}")]
    UnknownPulseType { pulse_type: String },

    #[error("unknown intervention action: {action}")]
    UnknownInterventionAction { action: String },

    #[error("unknown notify sink: {sink}")]
    UnknownNotifySink { sink: String },

    #[error("unknown color: {color}")]
    UnknownColor { color: String },

    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
pub type LoaderResult<T> = Result<T, LoaderError>;
