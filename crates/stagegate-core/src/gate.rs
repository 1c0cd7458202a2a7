//! Validation gate: normalizes raw review findings into a derived
//! [`ValidationOutcome`].

use std::sync::Arc;

use tracing::debug;

use stagegate_domain::{Issue, Phase, PipelineError, Result, ValidationOutcome};

use crate::executor::{ReviewExecutor, ReviewFinding};

/// Wraps the injected review stage and owns the outcome derivation.
///
/// A review-executor failure propagates as
/// [`PipelineError::ValidationClassification`](stagegate_domain::PipelineError)
/// and is never conflated with a `Fail` outcome.
pub struct ValidationGate {
    reviewer: Arc<dyn ReviewExecutor>,
    /// The phase whose output this gate reviews. Findings without phase
    /// attribution default to it.
    phase_under_review: Phase,
}

impl ValidationGate {
    pub fn new(reviewer: Arc<dyn ReviewExecutor>, phase_under_review: Phase) -> Self {
        Self {
            reviewer,
            phase_under_review,
        }
    }

    /// Review a stage output and derive the outcome from its findings.
    pub async fn review(
        &self,
        artifact: &serde_json::Value,
        quality_standard: Option<&str>,
    ) -> Result<ValidationOutcome> {
        // Any reviewer failure is a classification error at this
        // boundary, whatever variant the implementation raised.
        let findings = self
            .reviewer
            .review(artifact, quality_standard)
            .await
            .map_err(|e| PipelineError::ValidationClassification(e.to_string()))?;
        debug!(
            finding_count = findings.len(),
            phase = %self.phase_under_review,
            "review stage returned findings"
        );

        let issues: Vec<Issue> = findings
            .into_iter()
            .map(|f| self.normalize(f))
            .collect();

        Ok(ValidationOutcome::from_issues(issues))
    }

    fn normalize(&self, finding: ReviewFinding) -> Issue {
        let affected_phase = finding
            .affected_phase
            .unwrap_or_else(|| self.phase_under_review.into());

        let mut issue = Issue::new(
            finding.category,
            finding.severity,
            finding.description,
            affected_phase,
        );
        if let Some(evidence) = finding.evidence {
            issue = issue.with_evidence(evidence);
        }
        if let Some(impact) = finding.impact {
            issue = issue.with_impact(impact);
        }
        issue
    }
}
