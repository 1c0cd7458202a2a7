//! Stage executor contracts.
//!
//! Every unit of work in the pipeline is an opaque [`StageExecutor`]
//! behind one trait method; concrete stages are interchangeable
//! implementations injected at controller construction. The review stage
//! backing the validation gate has its own narrower contract,
//! [`ReviewExecutor`], because it returns findings rather than an
//! artifact.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use stagegate_domain::{
    AffectedPhase, DiagnosisReport, FixReport, Issue, Phase, Result, Severity, TestReport,
};

/// Input to a stage invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRequest {
    /// Task identifier shared by all stages of one run.
    pub task_id: String,

    /// What the pipeline is asked to produce.
    pub objective: String,

    /// Optional quality standard forwarded to the review stage.
    pub quality_standard: Option<String>,

    /// Output of the preceding stage, set by the controller for every
    /// stage after the first.
    pub upstream_artifact: Option<serde_json::Value>,
}

impl StageRequest {
    pub fn new(task_id: impl Into<String>, objective: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            objective: objective.into(),
            quality_standard: None,
            upstream_artifact: None,
        }
    }

    /// Attach a quality standard for validation.
    pub fn with_quality_standard(mut self, standard: impl Into<String>) -> Self {
        self.quality_standard = Some(standard.into());
        self
    }

    /// Attach the preceding stage's artifact.
    pub fn with_upstream_artifact(mut self, artifact: serde_json::Value) -> Self {
        self.upstream_artifact = Some(artifact);
        self
    }
}

/// Output of one stage invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResponse {
    /// Which phase produced this output.
    pub phase: Phase,

    /// The produced artifact, opaque to the orchestration core.
    pub artifact: serde_json::Value,

    /// Self-reported failure diagnosis, when the stage ran in repair
    /// mode.
    pub diagnosis: Option<DiagnosisReport>,

    /// Self-reported fix plan, when the stage ran in repair mode.
    pub fix: Option<FixReport>,

    /// Objective test evidence, when the stage ran any tests.
    pub tests: Option<TestReport>,
}

impl StageResponse {
    /// A bare artifact response with no repair evidence.
    pub fn artifact_only(phase: Phase, artifact: serde_json::Value) -> Self {
        Self {
            phase,
            artifact,
            diagnosis: None,
            fix: None,
            tests: None,
        }
    }
}

/// One ordered unit of work in the pipeline.
///
/// `feedback` is `None` on the first invocation within a run and
/// `Some` on reroute. Implementations must treat the two as genuinely
/// different code paths: feedback-aware regeneration differs from
/// first-pass generation.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// The phase this executor implements.
    fn phase(&self) -> Phase;

    /// Produce this stage's output, optionally regenerating against
    /// corrective feedback.
    async fn execute(
        &self,
        request: &StageRequest,
        feedback: Option<&[Issue]>,
    ) -> Result<StageResponse>;
}

/// A raw finding from the review stage, before gate normalization.
///
/// `affected_phase` may be absent in raw review output; the gate
/// defaults it to the phase under review, never leaves it unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewFinding {
    pub category: String,
    pub severity: Severity,
    pub description: String,
    pub evidence: Option<String>,
    pub impact: Option<String>,
    pub affected_phase: Option<AffectedPhase>,
}

impl ReviewFinding {
    pub fn new(
        category: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            severity,
            description: description.into(),
            evidence: None,
            impact: None,
            affected_phase: None,
        }
    }

    /// Attribute this finding to an upstream phase.
    pub fn with_affected_phase(mut self, phase: AffectedPhase) -> Self {
        self.affected_phase = Some(phase);
        self
    }

    /// Attach an evidence snippet.
    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }
}

/// The review stage backing the validation gate.
///
/// Consumes the artifact under review plus an optional quality-standard
/// string and returns raw findings. A failure here is a classification
/// error, never a validation failure.
#[async_trait]
pub trait ReviewExecutor: Send + Sync {
    async fn review(
        &self,
        artifact: &serde_json::Value,
        quality_standard: Option<&str>,
    ) -> Result<Vec<ReviewFinding>>;
}
