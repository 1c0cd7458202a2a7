//! Validation issue model with phase attribution.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a validation issue.
///
/// Ordered so that `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Whether this severity alone is enough to fail a validation run.
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// A reroutable pipeline phase.
///
/// `Planning` is the earliest stage; rerouting to it invalidates all
/// downstream outputs. `Design` sits immediately before the validation
/// gate, so rerouting to it retains planning output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    Design,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Planning => write!(f, "planning"),
            Self::Design => write!(f, "design"),
        }
    }
}

/// Upstream phase an issue is attributed to.
///
/// `Both` is always explicit; reviewers never get it by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffectedPhase {
    Planning,
    Design,
    Both,
}

impl AffectedPhase {
    /// Whether this attribution implicates the given phase.
    pub fn involves(self, phase: Phase) -> bool {
        match self {
            Self::Both => true,
            Self::Planning => phase == Phase::Planning,
            Self::Design => phase == Phase::Design,
        }
    }
}

impl From<Phase> for AffectedPhase {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Planning => Self::Planning,
            Phase::Design => Self::Design,
        }
    }
}

/// A single validation finding.
///
/// Immutable once created; builder setters consume and return `self`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Unique issue id.
    pub id: Uuid,

    /// Free-form category (e.g. "consistency", "completeness").
    pub category: String,

    /// Severity level.
    pub severity: Severity,

    /// Human-readable description of the problem.
    pub description: String,

    /// Evidence snippet from the reviewed artifact.
    pub evidence: Option<String>,

    /// Expected impact if left unaddressed.
    pub impact: Option<String>,

    /// Which upstream phase is responsible for the defect.
    pub affected_phase: AffectedPhase,
}

impl Issue {
    /// Create a new issue attributed to the given phase.
    pub fn new(
        category: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
        affected_phase: AffectedPhase,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            category: category.into(),
            severity,
            description: description.into(),
            evidence: None,
            impact: None,
            affected_phase,
        }
    }

    /// Attach an evidence snippet.
    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }

    /// Attach an impact statement.
    pub fn with_impact(mut self, impact: impl Into<String>) -> Self {
        self.impact = Some(impact.into());
        self
    }
}
