//! Confidence scoring: independent pure sub-scores composed into one
//! normalized signal.
//!
//! Every function here is stateless; the composed score is recomputed
//! from scratch each iteration, never incrementally updated, to avoid
//! drift.

use stagegate_domain::confidence::{clamp01, MAX_ITERATION_PENALTY};
use stagegate_domain::{ConfidenceBreakdown, DiagnosisReport, FixReport, TestReport};

/// Neutral score used when a sub-signal has no evidence to offer.
const NEUTRAL_SCORE: f32 = 0.5;

/// Score used when test output existed but could not be parsed; the
/// parse failure is itself evidence of reduced reliability.
const PARSE_FAILURE_SCORE: f32 = 0.4;

/// Confidence lost per prior failed fix attempt.
const PRIOR_ATTEMPT_PENALTY: f32 = 0.1;

/// Confidence in a failure diagnosis.
///
/// Starts from the stage's self-reported confidence and discounts for
/// breadth: more affected files, more proposed fixes, and a thin
/// explanation all reduce trust.
pub fn diagnostic_confidence(diagnosis: &DiagnosisReport) -> f32 {
    let file_factor = match diagnosis.affected_files.len() {
        0 | 1 => 1.0,
        2 | 3 => 0.9,
        _ => 0.8,
    };
    let fix_factor = match diagnosis.proposed_fixes {
        0 | 1 => 1.0,
        2 => 0.95,
        _ => 0.85,
    };
    let explanation_factor = match diagnosis.explanation.len() {
        n if n >= 100 => 1.0,
        n if n >= 50 => 0.95,
        _ => 0.9,
    };

    clamp01(diagnosis.self_confidence * file_factor * fix_factor * explanation_factor)
}

/// Confidence in a proposed fix.
///
/// Discounts for change volume, file spread, and vague anchor text, then
/// subtracts a flat penalty per prior failed attempt.
pub fn fix_confidence(fix: &FixReport, prior_failed_attempts: u32) -> f32 {
    let change_factor = match fix.changes.len() {
        0 | 1 => 1.0,
        2 | 3 => 0.95,
        _ => 0.85,
    };
    let file_factor = match fix.files().len() {
        0 | 1 => 1.0,
        2 => 0.95,
        _ => 0.85,
    };
    let anchor_factor = anchor_specificity(fix);

    let discounted = fix.self_confidence * change_factor * file_factor * anchor_factor;
    clamp01(discounted - PRIOR_ATTEMPT_PENALTY * prior_failed_attempts as f32)
}

/// Average anchor-text specificity multiplier: longer, more unique
/// search text locates a change more reliably.
fn anchor_specificity(fix: &FixReport) -> f32 {
    if fix.changes.is_empty() {
        return 1.0;
    }
    let sum: f32 = fix
        .changes
        .iter()
        .map(|c| match c.search_text.len() {
            n if n >= 80 => 1.0,
            n if n >= 30 => 0.95,
            _ => 0.85,
        })
        .sum();
    sum / fix.changes.len() as f32
}

/// Confidence from objective test evidence.
///
/// No test result at all scores a neutral 0.5; a parse failure scores
/// 0.4. Otherwise `0.7 * pass_rate + 0.3 * min(coverage/target, 1.0)`.
/// Zero tests counts as pass rate 1.0 so tasks with no meaningful tests
/// are not penalized.
pub fn test_coverage_confidence(report: Option<&TestReport>, target_coverage_percent: f32) -> f32 {
    let Some(report) = report else {
        return NEUTRAL_SCORE;
    };
    if !report.parse_ok {
        return PARSE_FAILURE_SCORE;
    }

    let coverage_ratio = match report.coverage_percent {
        Some(actual) if target_coverage_percent > 0.0 => {
            (actual / target_coverage_percent).min(1.0)
        }
        _ => 0.0,
    };

    clamp01(0.7 * report.pass_rate() + 0.3 * coverage_ratio)
}

/// Monotonic penalty for repeated iterations: zero through the first
/// iteration, then 5% per extra iteration, capped at 50%.
pub fn iteration_penalty(iteration: u32) -> f32 {
    if iteration <= 1 {
        0.0
    } else {
        (0.05 * (iteration - 1) as f32).min(MAX_ITERATION_PENALTY)
    }
}

/// Compose a full breakdown for one iteration.
///
/// Absent diagnosis/fix reports score a neutral 0.5, mirroring the
/// absent-test-report rule.
pub fn score_iteration(
    diagnosis: Option<&DiagnosisReport>,
    fix: Option<&FixReport>,
    tests: Option<&TestReport>,
    target_coverage_percent: f32,
    iteration: u32,
    prior_failed_attempts: u32,
) -> ConfidenceBreakdown {
    let diagnostic = diagnosis.map(diagnostic_confidence).unwrap_or(NEUTRAL_SCORE);
    let fix_score = fix
        .map(|f| fix_confidence(f, prior_failed_attempts))
        .unwrap_or(NEUTRAL_SCORE);
    let coverage = test_coverage_confidence(tests, target_coverage_percent);

    ConfidenceBreakdown::compose(diagnostic, fix_score, coverage, iteration_penalty(iteration))
}
