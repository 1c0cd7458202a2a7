//! Stagegate domain model.
//!
//! Pure value types shared by the orchestration engine and its callers:
//! validation issues and outcomes, confidence breakdowns, HITL
//! configuration and approval contracts, and run-level reports. Nothing
//! here performs I/O; everything is serde round-trippable and immutable
//! after construction.

pub mod confidence;
pub mod error;
pub mod hitl;
pub mod issue;
pub mod outcome;
pub mod run;

pub use confidence::{ConfidenceBreakdown, DiagnosisReport, FixChange, FixReport, TestReport};
pub use error::{PipelineError, Result};
pub use hitl::{
    ApprovalDecision, ApprovalRequest, ApprovalResponse, HitlConfig, HitlMode,
};
pub use issue::{AffectedPhase, Issue, Phase, Severity};
pub use outcome::{Assessment, SeverityCounts, ValidationOutcome};
pub use run::{
    AuditEntry, AuditEvent, IterationLimits, IterationSnapshot, RunReport, RunStatus,
};

/// Stagegate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
