//! Human-in-the-loop configuration and approval contracts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// HITL operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlMode {
    /// Never require approval.
    Autonomous,
    /// Always require approval.
    Supervised,
    /// Require approval when any threshold condition triggers.
    Threshold,
}

/// Immutable HITL decision configuration, supplied at controller
/// construction. Nothing is re-read mid-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitlConfig {
    /// Operating mode.
    pub mode: HitlMode,

    /// Iterations beyond this count trigger approval.
    pub iteration_threshold: u32,

    /// Confidence below this floor triggers approval.
    pub confidence_floor: f32,

    /// Confidence at or above this ceiling skips approval, unless a
    /// critical file or the hard iteration ceiling is involved.
    pub auto_approve_ceiling: f32,

    /// Hard ceiling: reaching this iteration count always requires
    /// approval, regardless of confidence.
    pub max_auto_iterations: u32,

    /// Change counts above this threshold trigger approval.
    pub large_change_threshold: u32,

    /// Substring patterns marking critical files. A match always
    /// triggers approval and is never bypassed by the auto-approve
    /// ceiling.
    pub critical_file_patterns: Vec<String>,
}

impl HitlConfig {
    /// Most permissive preset: never ask a human.
    pub fn autonomous() -> Self {
        Self {
            mode: HitlMode::Autonomous,
            ..Self::threshold()
        }
    }

    /// Default threshold-based preset with production values.
    pub fn threshold() -> Self {
        Self {
            mode: HitlMode::Threshold,
            iteration_threshold: 2,
            confidence_floor: 0.6,
            auto_approve_ceiling: 0.9,
            max_auto_iterations: 5,
            large_change_threshold: 20,
            critical_file_patterns: vec![
                "secrets".to_string(),
                ".env".to_string(),
                "Cargo.lock".to_string(),
                "migrations/".to_string(),
            ],
        }
    }

    /// Tighter thresholds for production-adjacent pipelines.
    pub fn conservative() -> Self {
        Self {
            mode: HitlMode::Threshold,
            iteration_threshold: 1,
            confidence_floor: 0.8,
            auto_approve_ceiling: 0.95,
            max_auto_iterations: 3,
            large_change_threshold: 10,
            ..Self::threshold()
        }
    }

    /// Most conservative preset: every gated decision goes to a human.
    pub fn supervised() -> Self {
        Self {
            mode: HitlMode::Supervised,
            ..Self::threshold()
        }
    }

    /// Append a critical file pattern (builder pattern).
    pub fn with_critical_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.critical_file_patterns.push(pattern.into());
        self
    }
}

impl Default for HitlConfig {
    fn default() -> Self {
        Self::threshold()
    }
}

/// Request sent to the approval channel on escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Task this escalation belongs to.
    pub task_id: String,

    /// What kind of gate raised the escalation (e.g. "repair-acceptance").
    pub gate_type: String,

    /// Human-readable report of why approval is needed.
    pub report: String,

    /// How long the request stays open before the broker reports a
    /// timeout, in seconds. `None` means wait indefinitely.
    pub expires_after_secs: Option<u64>,
}

/// A reviewer's decision on an escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
    /// Punted; treated identically to rejection for the current run.
    Deferred,
}

impl ApprovalDecision {
    /// Whether this decision lets the run proceed.
    pub fn is_approval(self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// The recorded outcome of one approval request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub decision: ApprovalDecision,
    pub reviewer: String,
    pub justification: Option<String>,
    pub decided_at: DateTime<Utc>,
}
