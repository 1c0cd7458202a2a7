//! Run-level records: iteration bookkeeping, audit trail, and the final
//! report returned to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::confidence::ConfidenceBreakdown;
use crate::hitl::ApprovalDecision;
use crate::issue::Phase;
use crate::outcome::{Assessment, ValidationOutcome};

/// Bounds on the reroute loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationLimits {
    /// Maximum reroutes into any single phase.
    pub per_phase: u32,

    /// Maximum reroutes across all phases combined.
    pub total: u32,
}

impl Default for IterationLimits {
    fn default() -> Self {
        Self {
            per_phase: 3,
            total: 10,
        }
    }
}

/// Point-in-time copy of the iteration counters.
///
/// Carried by `MaxIterationsExceeded` so an operator can distinguish
/// oscillating feedback from a legitimately hard task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationSnapshot {
    pub planning: u32,
    pub design: u32,
    pub total: u32,
}

impl IterationSnapshot {
    /// Counter for one phase.
    pub fn for_phase(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Planning => self.planning,
            Phase::Design => self.design,
        }
    }
}

impl std::fmt::Display for IterationSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "planning={} design={} total={}",
            self.planning, self.design, self.total
        )
    }
}

/// Terminal status of one pipeline run.
///
/// Approval outcomes are statuses, not errors; only executor breakdowns
/// and iteration exhaustion surface as `PipelineError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Validation accepted the output (possibly with caveats).
    Accepted,
    /// A human rejected the escalated repair.
    ApprovalRejected,
    /// A human deferred the decision; not retried within this run.
    ApprovalDeferred,
    /// The approval channel timed out — no decision was made, which is
    /// recorded distinctly from denial.
    NoDecision,
}

impl RunStatus {
    /// Whether the run ended in acceptance.
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::ApprovalRejected => write!(f, "approval_rejected"),
            Self::ApprovalDeferred => write!(f, "approval_deferred"),
            Self::NoDecision => write!(f, "no_decision"),
        }
    }
}

/// One auditable event in a run's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    StageCompleted {
        phase: Phase,
        with_feedback: bool,
    },
    ValidationEvaluated {
        assessment: Assessment,
        issue_count: u32,
    },
    Rerouted {
        phase: Phase,
        issue_ids: Vec<Uuid>,
        reason: String,
    },
    /// Phase attribution was absent; routed to the immediately preceding
    /// stage by defensive fallback. Surfaced, never silent.
    FallbackRouting {
        issue_ids: Vec<Uuid>,
    },
    ConfidenceScored {
        breakdown: ConfidenceBreakdown,
        iteration: u32,
    },
    Escalated {
        reasons: Vec<String>,
    },
    ApprovalResolved {
        decision: ApprovalDecision,
        reviewer: String,
    },
    ApprovalTimedOut {
        waited_secs: u64,
    },
    /// The approval channel itself broke before any decision was made.
    ApprovalChannelFailed {
        message: String,
    },
}

/// A sequenced, timestamped audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub seq: u64,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AuditEvent,
}

/// The aggregate returned to the caller when a run terminates without a
/// fatal error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique id of this controller invocation.
    pub run_id: Uuid,

    /// Terminal status.
    pub status: RunStatus,

    /// The last validation outcome observed (present for every status;
    /// NeedsImprovement is handed back for the caller to inspect).
    pub outcome: Option<ValidationOutcome>,

    /// Final iteration counters.
    pub iterations: IterationSnapshot,

    /// Confidence breakdown per repair iteration, oldest first.
    pub confidence_history: Vec<ConfidenceBreakdown>,

    /// Complete audit trail, including the reason for every reroute.
    pub audit: Vec<AuditEntry>,

    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
}
