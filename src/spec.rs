//! Manifest-boundary types: what a loader hands the engine for one monitor.
//!
//! Shaped after the teacher's `Cylo` enum (`execution_env.rs`): a tagged
//! variant per backend/transport, a `validate()` that rejects malformed
//! configuration before anything is constructed, and a `backend_type`-style
//! discriminant string used for job routing and error messages.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LoaderError, LoaderResult};

/// Recognized pulse transports (spec §6). Concrete probing is external; the
/// engine only needs the discriminant and its transport-specific config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PulseTransport {
    Http { url: String, method: String, #[serde(default)] headers: HashMap<String, String> },
    Tcp { host: String, port: u16 },
    Icmp { host: String, count: u32 },
}

impl PulseTransport {
    pub fn type_name(&self) -> &'static str {
        match self {
            PulseTransport::Http { .. } => "http",
            PulseTransport::Tcp { .. } => "tcp",
            PulseTransport::Icmp { .. } => "icmp",
        }
    }
}

/// Recognized intervention actions (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InterventionTarget {
    Docker { container: String, timeout: DurationSpec },
}

impl InterventionTarget {
    pub fn action_name(&self) -> &'static str {
        match self {
            InterventionTarget::Docker { .. } => "docker",
        }
    }
}

/// Recognized code notification sinks (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NotifySink {
    Log { file: String },
    Slack { hook: String },
    Pagerduty { url: String },
}

impl NotifySink {
    pub fn sink_name(&self) -> &'static str {
        match self {
            NotifySink::Log { .. } => "log",
            NotifySink::Slack { .. } => "slack",
            NotifySink::Pagerduty { .. } => "pagerduty",
        }
    }
}

/// Recognized code colors (spec §6, glossary).
pub const COLORS: [&str; 5] = ["red", "yellow", "green", "cyan", "gray"];

pub fn is_recognized_color(color: &str) -> bool {
    COLORS.contains(&color)
}

/// An ISO-like human duration string (`"1s"`, `"500ms"`), parsed with
/// `humantime` at the manifest boundary (spec §6, SPEC_FULL §1.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DurationSpec(pub Duration);

impl TryFrom<String> for DurationSpec {
    type Error = LoaderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        humantime::parse_duration(&value)
            .map(DurationSpec)
            .map_err(|e| LoaderError::InvalidDuration { value, reason: e.to_string() })
    }
}

impl From<DurationSpec> for String {
    fn from(value: DurationSpec) -> Self {
        humantime::format_duration(value.0).to_string()
    }
}

/// Per-monitor pulse configuration (spec §3 `PulseConfig`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    pub transport: PulseTransport,
    pub interval: DurationSpec,
    pub timeout: DurationSpec,
    /// K₁: consecutive failures before escalation. Normalized to at least 1
    /// (spec §8 boundary behaviors).
    pub unhealthy_threshold: u32,
    /// K₂: consecutive successes for recovery, and the verification window
    /// length. Normalized to at least 2.
    pub healthy_threshold: u32,
}

impl PulseConfig {
    /// Apply spec §8's boundary normalization: `K1=0 -> 1`, `K2=0 -> 2`.
    pub fn normalized(mut self) -> Self {
        if self.unhealthy_threshold == 0 {
            self.unhealthy_threshold = 1;
        }
        if self.healthy_threshold == 0 {
            self.healthy_threshold = 2;
        }
        self
    }
}

/// Optional per-monitor remediation configuration (spec §3
/// `InterventionConfig`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionConfig {
    pub target: InterventionTarget,
    pub max_failures: u32,
}

/// One color's dispatch configuration within `CodeConfig` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeEntry {
    pub dispatch: bool,
    pub notify: NotifySink,
}

/// Per-monitor code configuration: color -> dispatch entry.
pub type CodeConfig = HashMap<String, CodeEntry>;

/// A monitor as described by a manifest, before it becomes an entity in the
/// component store (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSpec {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub pulse: PulseConfig,
    #[serde(default)]
    pub intervention: Option<InterventionConfig>,
    #[serde(default)]
    pub codes: CodeConfig,
}

fn default_true() -> bool {
    true
}

impl MonitorSpec {
    /// Validate cross-field requirements that aren't expressible in the
    /// wire schema itself: non-empty name and recognized code colors.
    ///
    /// Unknown pulse types / intervention actions / notify sinks can't occur
    /// here because `#[serde(tag = "type")]` already rejects them during
    /// deserialization; this validates specs built programmatically (as the
    /// test scenarios in spec §8 do) rather than only ones parsed from text.
    pub fn validate(&self) -> LoaderResult<()> {
        if self.name.is_empty() {
            return Err(LoaderError::EmptyName);
        }
        for color in self.codes.keys() {
            if !is_recognized_color(color) {
                return Err(LoaderError::UnknownColor { color: color.clone() });
            }
        }
        Ok(())
    }
}
