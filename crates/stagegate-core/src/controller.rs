//! The pipeline state machine.
//!
//! One controller instance drives one run at a time: plan, design,
//! validate, and — on failure — route corrective feedback backward under
//! the iteration guard. Acceptance of a repaired run is gated by the
//! HITL policy; the broker decision becomes the run's terminal status.
//!
//! All collaborators are injected fully constructed; the controller
//! never creates hidden singletons and reads no configuration mid-run.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::Instrument;
use uuid::Uuid;

use stagegate_domain::{
    ApprovalDecision, ApprovalRequest, AuditEntry, AuditEvent, ConfidenceBreakdown, HitlConfig,
    Issue, IterationLimits, Phase, Result, RunReport, RunStatus, ValidationOutcome,
};

use crate::broker::{ApprovalBroker, BrokerError};
use crate::confidence::score_iteration;
use crate::executor::{ReviewExecutor, StageExecutor, StageRequest, StageResponse};
use crate::gate::ValidationGate;
use crate::guard::IterationGuard;
use crate::obs;
use crate::policy::requires_approval;
use crate::router::{PhaseRouter, RoutingDecision};

/// Alias kept for API clarity: the controller consumes the same request
/// shape it forwards to stages.
pub type PipelineRequest = StageRequest;

/// Sequenced audit trail owned by one run.
struct AuditTrail {
    entries: Vec<AuditEntry>,
    next_seq: u64,
}

impl AuditTrail {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 1,
        }
    }

    fn push(&mut self, event: AuditEvent) {
        self.entries.push(AuditEntry {
            seq: self.next_seq,
            at: Utc::now(),
            event,
        });
        self.next_seq += 1;
    }
}

/// Top-level orchestrator for one bounded, terminating pipeline run.
pub struct PipelineController {
    planner: Arc<dyn StageExecutor>,
    designer: Arc<dyn StageExecutor>,
    gate: ValidationGate,
    broker: Arc<dyn ApprovalBroker>,
    hitl: HitlConfig,
    limits: IterationLimits,
    target_coverage_percent: f32,
    approval_expiry_secs: Option<u64>,
}

impl PipelineController {
    /// Create a controller from fully-constructed collaborators.
    ///
    /// The gate reviews the design stage's output, so findings without
    /// phase attribution default to `Phase::Design`.
    pub fn new(
        planner: Arc<dyn StageExecutor>,
        designer: Arc<dyn StageExecutor>,
        reviewer: Arc<dyn ReviewExecutor>,
        broker: Arc<dyn ApprovalBroker>,
        hitl: HitlConfig,
        limits: IterationLimits,
    ) -> Self {
        Self {
            planner,
            designer,
            gate: ValidationGate::new(reviewer, Phase::Design),
            broker,
            hitl,
            limits,
            target_coverage_percent: 80.0,
            approval_expiry_secs: Some(300),
        }
    }

    /// Override the coverage target used by the confidence scorer.
    pub fn with_target_coverage(mut self, percent: f32) -> Self {
        self.target_coverage_percent = percent;
        self
    }

    /// Override how long escalations wait for a human decision.
    pub fn with_approval_expiry(mut self, secs: Option<u64>) -> Self {
        self.approval_expiry_secs = secs;
        self
    }

    /// Execute one bounded run.
    ///
    /// Returns `Ok(RunReport)` for every terminal status — including
    /// approval rejection and broker timeout, which are statuses, not
    /// errors. Stage breakdowns, classification failures, and iteration
    /// exhaustion propagate as [`PipelineError`](stagegate_domain::PipelineError).
    ///
    /// The returned future is `Send`; independent runs can be spawned
    /// onto a multi-threaded runtime.
    pub async fn run(&self, request: PipelineRequest) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        // Instrument rather than enter: an entered span guard held
        // across an await would make this future !Send.
        let span = obs::run_span(run_id);
        self.run_inner(run_id, request).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, request: PipelineRequest) -> Result<RunReport> {
        let start = Instant::now();

        obs::emit_run_started(run_id, &request.task_id);

        let mut audit = AuditTrail::new();
        let mut guard = IterationGuard::new(self.limits);
        let mut confidence_history = Vec::new();
        let mut prior_failed_fix_attempts = 0u32;

        // Init: run all stages in order up to the gated one.
        let planning_out = self.invoke(&*self.planner, &request, None, run_id, &mut audit).await?;
        let mut planning_artifact = planning_out.artifact;

        let design_request = request
            .clone()
            .with_upstream_artifact(planning_artifact.clone());
        let mut design_out = self
            .invoke(&*self.designer, &design_request, None, run_id, &mut audit)
            .await?;

        loop {
            // Validating.
            let outcome = self
                .gate
                .review(&design_out.artifact, request.quality_standard.as_deref())
                .await?;
            obs::emit_validation_evaluated(run_id, outcome.assessment, outcome.issues.len());
            audit.push(AuditEvent::ValidationEvaluated {
                assessment: outcome.assessment,
                issue_count: outcome.issues.len() as u32,
            });

            if outcome.assessment.is_acceptable() {
                return self
                    .accept(
                        run_id,
                        &request,
                        outcome,
                        &design_out,
                        &mut guard,
                        &mut audit,
                        &mut confidence_history,
                        prior_failed_fix_attempts,
                        start,
                    )
                    .await;
            }

            // A failed validation after a repair means the prior fix
            // attempt did not hold.
            if guard.total() > 0 {
                prior_failed_fix_attempts += 1;
            }

            // Rerouting.
            let (decision, fallback) = PhaseRouter::route(&outcome);
            if fallback {
                obs::emit_fallback_routing(run_id, decision.issues().len());
                audit.push(AuditEvent::FallbackRouting {
                    issue_ids: decision.issues().iter().map(|i| i.id).collect(),
                });
            }

            match decision {
                RoutingDecision::NoAction => {
                    // Fail always routes somewhere; nothing to re-invoke.
                    return self
                        .accept(
                            run_id,
                            &request,
                            outcome,
                            &design_out,
                            &mut guard,
                            &mut audit,
                            &mut confidence_history,
                            prior_failed_fix_attempts,
                            start,
                        )
                        .await;
                }
                RoutingDecision::Reroute {
                    phase: Phase::Planning,
                    issues,
                } => {
                    self.reroute_audit(run_id, Phase::Planning, &issues, "planning issues present", &mut audit);
                    guard.check_and_increment(Phase::Planning, &outcome)?;
                    // Planning is re-invoked with feedback; the design
                    // output it fed is invalidated and regenerated.
                    let replanned = self
                        .invoke(&*self.planner, &request, Some(&issues), run_id, &mut audit)
                        .await?;
                    planning_artifact = replanned.artifact;
                    let design_request = request
                        .clone()
                        .with_upstream_artifact(planning_artifact.clone());
                    design_out = self
                        .invoke(&*self.designer, &design_request, None, run_id, &mut audit)
                        .await?;
                }
                RoutingDecision::Reroute {
                    phase: Phase::Design,
                    issues,
                } => {
                    self.reroute_audit(run_id, Phase::Design, &issues, "design issues only", &mut audit);
                    guard.check_and_increment(Phase::Design, &outcome)?;
                    // Planning output is retained.
                    let design_request = request
                        .clone()
                        .with_upstream_artifact(planning_artifact.clone());
                    design_out = self
                        .invoke(&*self.designer, &design_request, Some(&issues), run_id, &mut audit)
                        .await?;
                }
                RoutingDecision::RerouteMultiPhase { issues, .. } => {
                    self.reroute_audit(
                        run_id,
                        Phase::Planning,
                        &issues,
                        "issues span planning and design",
                        &mut audit,
                    );
                    guard.check_and_increment(Phase::Planning, &outcome)?;
                    let replanned = self
                        .invoke(&*self.planner, &request, Some(&issues), run_id, &mut audit)
                        .await?;
                    planning_artifact = replanned.artifact;
                    // The regenerated design also sees the multi-phase
                    // issues as feedback.
                    let design_request = request
                        .clone()
                        .with_upstream_artifact(planning_artifact.clone());
                    design_out = self
                        .invoke(&*self.designer, &design_request, Some(&issues), run_id, &mut audit)
                        .await?;
                }
            }
        }
    }

    /// Terminal acceptance path, HITL-gated when inside a repair
    /// sub-flow.
    #[allow(clippy::too_many_arguments)]
    async fn accept(
        &self,
        run_id: Uuid,
        request: &PipelineRequest,
        outcome: ValidationOutcome,
        design_out: &StageResponse,
        guard: &mut IterationGuard,
        audit: &mut AuditTrail,
        confidence_history: &mut Vec<ConfidenceBreakdown>,
        prior_failed_fix_attempts: u32,
        start: Instant,
    ) -> Result<RunReport> {
        let iteration = guard.total();

        // First-pass clean runs never escalate.
        let status = if iteration == 0 {
            RunStatus::Accepted
        } else {
            let breakdown = score_iteration(
                design_out.diagnosis.as_ref(),
                design_out.fix.as_ref(),
                design_out.tests.as_ref(),
                self.target_coverage_percent,
                iteration,
                prior_failed_fix_attempts,
            );
            audit.push(AuditEvent::ConfidenceScored {
                breakdown,
                iteration,
            });
            confidence_history.push(breakdown);

            let files: Vec<String> = design_out
                .fix
                .as_ref()
                .map(|f| f.files().iter().map(|s| s.to_string()).collect())
                .unwrap_or_default();
            let change_count = design_out
                .fix
                .as_ref()
                .map(|f| f.changes.len() as u32)
                .unwrap_or(0);

            let requirement = requires_approval(
                &self.hitl,
                iteration,
                breakdown.overall,
                &files,
                change_count,
            );

            if requirement.required {
                obs::emit_escalation(run_id, breakdown.overall, &requirement.reason());
                audit.push(AuditEvent::Escalated {
                    reasons: requirement.reasons.clone(),
                });
                self.escalate(run_id, request, &requirement.reason(), breakdown.overall, guard, audit)
                    .await
            } else {
                RunStatus::Accepted
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        obs::emit_run_finished(run_id, &status.to_string(), duration_ms, guard.total());

        Ok(RunReport {
            run_id,
            status,
            outcome: Some(outcome),
            iterations: guard.snapshot(),
            confidence_history: confidence_history.clone(),
            audit: std::mem::take(&mut audit.entries),
            duration_ms,
        })
    }

    /// Block on the approval broker and map its answer to a terminal
    /// status. Timeout is recorded as "no decision", never as denial.
    async fn escalate(
        &self,
        _run_id: Uuid,
        request: &PipelineRequest,
        reason: &str,
        confidence: f32,
        guard: &IterationGuard,
        audit: &mut AuditTrail,
    ) -> RunStatus {
        let approval_request = ApprovalRequest {
            task_id: request.task_id.clone(),
            gate_type: "repair-acceptance".to_string(),
            report: format!(
                "approval required: {reason} (confidence {confidence:.2}, iterations {})",
                guard.snapshot()
            ),
            expires_after_secs: self.approval_expiry_secs,
        };

        match self.broker.request_approval(&approval_request).await {
            Ok(response) => {
                audit.push(AuditEvent::ApprovalResolved {
                    decision: response.decision,
                    reviewer: response.reviewer.clone(),
                });
                match response.decision {
                    ApprovalDecision::Approved => RunStatus::Accepted,
                    ApprovalDecision::Rejected => RunStatus::ApprovalRejected,
                    // Deferred work is not retried within this run.
                    ApprovalDecision::Deferred => RunStatus::ApprovalDeferred,
                }
            }
            Err(BrokerError::TimedOut { waited_secs }) => {
                audit.push(AuditEvent::ApprovalTimedOut { waited_secs });
                RunStatus::NoDecision
            }
            Err(BrokerError::Channel(message)) => {
                tracing::warn!(error = %message, "approval channel failed");
                audit.push(AuditEvent::ApprovalChannelFailed { message });
                RunStatus::NoDecision
            }
        }
    }

    async fn invoke(
        &self,
        stage: &dyn StageExecutor,
        request: &StageRequest,
        feedback: Option<&[Issue]>,
        run_id: Uuid,
        audit: &mut AuditTrail,
    ) -> Result<StageResponse> {
        let response = stage.execute(request, feedback).await?;
        obs::emit_stage_finished(run_id, stage.phase(), feedback.is_some());
        audit.push(AuditEvent::StageCompleted {
            phase: stage.phase(),
            with_feedback: feedback.is_some(),
        });
        Ok(response)
    }

    fn reroute_audit(
        &self,
        run_id: Uuid,
        phase: Phase,
        issues: &[Issue],
        reason: &str,
        audit: &mut AuditTrail,
    ) {
        obs::emit_reroute(run_id, phase, issues.len(), reason);
        audit.push(AuditEvent::Rerouted {
            phase,
            issue_ids: issues.iter().map(|i| i.id).collect(),
            reason: reason.to_string(),
        });
    }
}
