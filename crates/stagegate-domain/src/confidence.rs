//! Confidence breakdown and the self-reported evidence records it is
//! scored from.

use serde::{Deserialize, Serialize};

/// Weight of the diagnostic sub-score in the overall confidence.
pub const DIAGNOSTIC_WEIGHT: f32 = 0.3;
/// Weight of the fix sub-score in the overall confidence.
pub const FIX_WEIGHT: f32 = 0.3;
/// Weight of objective test evidence; highest by design.
pub const TEST_COVERAGE_WEIGHT: f32 = 0.4;
/// Cap on the cumulative iteration penalty.
pub const MAX_ITERATION_PENALTY: f32 = 0.5;

/// Multi-factor confidence score for one pipeline iteration.
///
/// Sub-scores live in `[0, 1]`; `iteration_penalty` in `[0, 0.5]`.
/// `overall` is always recomputed from scratch, never incrementally
/// updated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub diagnostic: f32,
    pub fix: f32,
    pub test_coverage: f32,
    pub iteration_penalty: f32,
    pub overall: f32,
}

impl ConfidenceBreakdown {
    /// Compose the overall score from sub-scores.
    ///
    /// `overall = clamp01(0.3*diagnostic + 0.3*fix + 0.4*test_coverage
    /// - iteration_penalty)`.
    pub fn compose(diagnostic: f32, fix: f32, test_coverage: f32, iteration_penalty: f32) -> Self {
        let overall = clamp01(
            DIAGNOSTIC_WEIGHT * diagnostic + FIX_WEIGHT * fix
                + TEST_COVERAGE_WEIGHT * test_coverage
                - iteration_penalty,
        );
        Self {
            diagnostic,
            fix,
            test_coverage,
            iteration_penalty,
            overall,
        }
    }
}

/// Clamp a score into `[0, 1]`.
pub fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Self-reported diagnosis of a failure, produced by a repair-capable
/// stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisReport {
    /// The stage's own confidence in its diagnosis, in `[0, 1]`.
    pub self_confidence: f32,

    /// Files implicated by the diagnosis.
    pub affected_files: Vec<String>,

    /// Number of distinct fixes the diagnosis proposes.
    pub proposed_fixes: u32,

    /// Free-text explanation of the root cause.
    pub explanation: String,
}

/// One concrete change within a fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixChange {
    /// File the change applies to.
    pub file: String,

    /// Anchor text the change is located by. Longer, more specific
    /// anchors make the fix more trustworthy.
    pub search_text: String,
}

/// Self-reported fix plan produced by a repair-capable stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixReport {
    /// The stage's own confidence in the fix, in `[0, 1]`.
    pub self_confidence: f32,

    /// Concrete changes making up the fix.
    pub changes: Vec<FixChange>,
}

impl FixReport {
    /// Distinct files touched by this fix, in first-seen order.
    pub fn files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = Vec::new();
        for change in &self.changes {
            if !files.contains(&change.file.as_str()) {
                files.push(&change.file);
            }
        }
        files
    }
}

/// Parsed result of an objective test run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    /// Whether the raw test output parsed cleanly. A parse failure is
    /// itself evidence of reduced reliability.
    pub parse_ok: bool,

    /// Tests that passed.
    pub passed: u32,

    /// Tests that failed.
    pub failed: u32,

    /// Measured coverage percentage, when available.
    pub coverage_percent: Option<f32>,
}

impl TestReport {
    /// Total tests observed.
    pub fn total(&self) -> u32 {
        self.passed + self.failed
    }

    /// Pass rate in `[0, 1]`. Zero tests counts as 1.0 — absence of
    /// tests is non-failure, not failure.
    pub fn pass_rate(&self) -> f32 {
        let total = self.total();
        if total == 0 {
            1.0
        } else {
            self.passed as f32 / total as f32
        }
    }
}
