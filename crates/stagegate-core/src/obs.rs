//! Structured observability hooks for pipeline run lifecycle events.
//!
//! Events are emitted at `info!` level with an `event = "..."` field so
//! log aggregation can filter on event kind. All events inside one run
//! carry its run id via the span from [`run_span`], attached to the run
//! future with `tracing::Instrument`.

use tracing::{info, warn, Span};
use uuid::Uuid;

use stagegate_domain::{Assessment, Phase};

/// Span scoping all events of one run to its run id.
///
/// Attach with `Instrument` rather than entering a guard; an entered
/// guard held across an await point mis-attributes interleaved tasks
/// and makes the future `!Send`.
pub fn run_span(run_id: Uuid) -> Span {
    tracing::info_span!("stagegate.run", run_id = %run_id)
}

/// Emit event: run started for a task.
pub fn emit_run_started(run_id: Uuid, task_id: &str) {
    info!(event = "run.started", run_id = %run_id, task_id = %task_id);
}

/// Emit event: a stage produced its output.
pub fn emit_stage_finished(run_id: Uuid, phase: Phase, with_feedback: bool) {
    info!(
        event = "stage.finished",
        run_id = %run_id,
        phase = %phase,
        with_feedback = with_feedback,
    );
}

/// Emit event: the validation gate classified a stage output.
pub fn emit_validation_evaluated(run_id: Uuid, assessment: Assessment, issue_count: usize) {
    info!(
        event = "validation.evaluated",
        run_id = %run_id,
        assessment = %assessment,
        issue_count = issue_count,
    );
}

/// Emit event: corrective feedback routed backward to a phase.
pub fn emit_reroute(run_id: Uuid, phase: Phase, issue_count: usize, reason: &str) {
    info!(
        event = "route.reroute",
        run_id = %run_id,
        phase = %phase,
        issue_count = issue_count,
        reason = %reason,
    );
}

/// Emit event: phase attribution was absent and routing fell back to the
/// preceding stage (warning level; this is surfaced, not silent).
pub fn emit_fallback_routing(run_id: Uuid, issue_count: usize) {
    warn!(
        event = "route.fallback",
        run_id = %run_id,
        issue_count = issue_count,
    );
}

/// Emit event: run escalated to human approval.
pub fn emit_escalation(run_id: Uuid, confidence: f32, reason: &str) {
    info!(
        event = "hitl.escalated",
        run_id = %run_id,
        confidence = confidence,
        reason = %reason,
    );
}

/// Emit event: run reached a terminal status.
pub fn emit_run_finished(run_id: Uuid, status: &str, duration_ms: u64, total_reroutes: u32) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        status = %status,
        duration_ms = duration_ms,
        total_reroutes = total_reroutes,
    );
}
