//! Pipeline error taxonomy.
//!
//! Two-tier split: validation *failures* are ordinary
//! [`ValidationOutcome`](crate::outcome::ValidationOutcome) values
//! consumed by control flow; only stage breakdowns, classifier
//! breakdowns, and iteration exhaustion are errors. Approval rejection
//! and timeout are terminal run statuses, never errors.

use crate::issue::Phase;
use crate::outcome::ValidationOutcome;
use crate::run::{IterationLimits, IterationSnapshot};

/// Errors raised by the orchestration core.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The invoked stage could not produce any result. Distinct from
    /// producing a low-quality result; never retried by this core.
    #[error("stage {phase} execution failed: {message}")]
    StageExecution { phase: Phase, message: String },

    /// The review stage behind the validation gate itself failed to
    /// produce a classification.
    #[error("validation classification failed: {0}")]
    ValidationClassification(String),

    /// An iteration bound was crossed. Always fatal; carries the exact
    /// counters and the outcome that triggered the final reroute.
    #[error("max iterations exceeded ({iterations}; limits per_phase={} total={})", limits.per_phase, limits.total)]
    MaxIterationsExceeded {
        iterations: IterationSnapshot,
        limits: IterationLimits,
        last_outcome: Box<ValidationOutcome>,
    },

    /// Payload (de)serialization failure at a stage boundary.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
