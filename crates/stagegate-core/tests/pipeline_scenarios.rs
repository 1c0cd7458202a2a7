//! End-to-end controller scenarios with scripted stages and brokers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use stagegate_core::{
    ApprovalBroker, BrokerError, PipelineController, ReviewExecutor, ReviewFinding,
    StageExecutor, StageRequest, StageResponse,
};
use stagegate_domain::{
    AffectedPhase, ApprovalDecision, ApprovalRequest, ApprovalResponse, Assessment, FixChange,
    FixReport, HitlConfig, Issue, IterationLimits, Phase, PipelineError, RunStatus, Severity,
    TestReport,
};

/// Stage stub recording whether each invocation carried feedback.
struct RecordingStage {
    phase: Phase,
    feedback_log: Mutex<Vec<bool>>,
    /// Repair evidence attached to feedback-driven invocations.
    repair_fix: Option<FixReport>,
    repair_tests: Option<TestReport>,
}

impl RecordingStage {
    fn new(phase: Phase) -> Self {
        Self {
            phase,
            feedback_log: Mutex::new(Vec::new()),
            repair_fix: None,
            repair_tests: None,
        }
    }

    fn with_repair_evidence(mut self, fix: FixReport, tests: TestReport) -> Self {
        self.repair_fix = Some(fix);
        self.repair_tests = Some(tests);
        self
    }

    fn invocations(&self) -> Vec<bool> {
        self.feedback_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl StageExecutor for RecordingStage {
    fn phase(&self) -> Phase {
        self.phase
    }

    async fn execute(
        &self,
        request: &StageRequest,
        feedback: Option<&[Issue]>,
    ) -> stagegate_domain::Result<StageResponse> {
        self.feedback_log.lock().unwrap().push(feedback.is_some());

        let mut response = StageResponse::artifact_only(
            self.phase,
            serde_json::json!({
                "task": request.task_id,
                "attempt": self.feedback_log.lock().unwrap().len(),
            }),
        );
        if feedback.is_some() {
            response.fix = self.repair_fix.clone();
            response.tests = self.repair_tests;
        }
        Ok(response)
    }
}

/// Stage that always fails to produce output.
struct BrokenStage(Phase);

#[async_trait]
impl StageExecutor for BrokenStage {
    fn phase(&self) -> Phase {
        self.0
    }

    async fn execute(
        &self,
        _request: &StageRequest,
        _feedback: Option<&[Issue]>,
    ) -> stagegate_domain::Result<StageResponse> {
        Err(PipelineError::StageExecution {
            phase: self.0,
            message: "model endpoint unreachable".into(),
        })
    }
}

/// Reviewer returning a scripted sequence of finding lists, then clean
/// passes once the script runs out.
struct ScriptedReviewer {
    script: Mutex<Vec<Vec<ReviewFinding>>>,
    calls: AtomicU32,
}

impl ScriptedReviewer {
    fn new(mut script: Vec<Vec<ReviewFinding>>) -> Self {
        // Stored reversed so each review pops from the back.
        script.reverse();
        Self {
            script: Mutex::new(script),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ReviewExecutor for ScriptedReviewer {
    async fn review(
        &self,
        _artifact: &serde_json::Value,
        _quality_standard: Option<&str>,
    ) -> stagegate_domain::Result<Vec<ReviewFinding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.lock().unwrap().pop().unwrap_or_default())
    }
}

/// Reviewer that fails every artifact with the same finding, forever.
struct AlwaysFailingReviewer(ReviewFinding);

#[async_trait]
impl ReviewExecutor for AlwaysFailingReviewer {
    async fn review(
        &self,
        _artifact: &serde_json::Value,
        _quality_standard: Option<&str>,
    ) -> stagegate_domain::Result<Vec<ReviewFinding>> {
        Ok(vec![self.0.clone()])
    }
}

/// Broker answering every escalation with a fixed decision.
struct FixedBroker(ApprovalDecision);

#[async_trait]
impl ApprovalBroker for FixedBroker {
    async fn request_approval(
        &self,
        _request: &ApprovalRequest,
    ) -> Result<ApprovalResponse, BrokerError> {
        Ok(ApprovalResponse {
            decision: self.0,
            reviewer: "reviewer-1".into(),
            justification: None,
            decided_at: Utc::now(),
        })
    }
}

/// Broker that never answers within the expiry.
struct TimeoutBroker;

#[async_trait]
impl ApprovalBroker for TimeoutBroker {
    async fn request_approval(
        &self,
        request: &ApprovalRequest,
    ) -> Result<ApprovalResponse, BrokerError> {
        Err(BrokerError::TimedOut {
            waited_secs: request.expires_after_secs.unwrap_or(0),
        })
    }
}

fn design_failure(severity: Severity) -> ReviewFinding {
    ReviewFinding::new("completeness", severity, "design misses an error path")
        .with_affected_phase(AffectedPhase::Design)
}

fn controller(
    planner: Arc<RecordingStage>,
    designer: Arc<RecordingStage>,
    reviewer: Arc<dyn ReviewExecutor>,
    broker: Arc<dyn ApprovalBroker>,
    hitl: HitlConfig,
    limits: IterationLimits,
) -> PipelineController {
    PipelineController::new(planner, designer, reviewer, broker, hitl, limits)
}

fn request() -> StageRequest {
    StageRequest::new("task-42", "add rate limiting to the API gateway")
}

#[tokio::test]
async fn simple_pass_accepts_with_zero_reroutes() {
    let planner = Arc::new(RecordingStage::new(Phase::Planning));
    let designer = Arc::new(RecordingStage::new(Phase::Design));
    let ctl = controller(
        planner.clone(),
        designer.clone(),
        Arc::new(ScriptedReviewer::new(vec![vec![]])),
        Arc::new(FixedBroker(ApprovalDecision::Approved)),
        HitlConfig::threshold(),
        IterationLimits::default(),
    );

    let report = ctl.run(request()).await.unwrap();

    assert_eq!(report.status, RunStatus::Accepted);
    assert_eq!(report.iterations.total, 0);
    assert_eq!(
        report.outcome.as_ref().unwrap().assessment,
        Assessment::Pass
    );
    // Both stages invoked exactly once, without feedback.
    assert_eq!(planner.invocations(), vec![false]);
    assert_eq!(designer.invocations(), vec![false]);
    assert!(report.confidence_history.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_future_is_send_and_spawnable() {
    let ctl = Arc::new(controller(
        Arc::new(RecordingStage::new(Phase::Planning)),
        Arc::new(RecordingStage::new(Phase::Design)),
        Arc::new(ScriptedReviewer::new(vec![vec![]])),
        Arc::new(FixedBroker(ApprovalDecision::Approved)),
        HitlConfig::threshold(),
        IterationLimits::default(),
    ));

    // Independent runs scale horizontally: the run future must be Send
    // so it can be spawned onto a multi-threaded runtime.
    let handle = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.run(request()).await }
    });

    let report = handle.await.unwrap().unwrap();
    assert_eq!(report.status, RunStatus::Accepted);
}

#[tokio::test]
async fn needs_improvement_is_accepted_with_caveats() {
    let reviewer = ScriptedReviewer::new(vec![vec![design_failure(Severity::Medium)]]);
    let ctl = controller(
        Arc::new(RecordingStage::new(Phase::Planning)),
        Arc::new(RecordingStage::new(Phase::Design)),
        Arc::new(reviewer),
        Arc::new(FixedBroker(ApprovalDecision::Approved)),
        HitlConfig::threshold(),
        IterationLimits::default(),
    );

    let report = ctl.run(request()).await.unwrap();

    assert_eq!(report.status, RunStatus::Accepted);
    let outcome = report.outcome.unwrap();
    assert_eq!(outcome.assessment, Assessment::NeedsImprovement);
    // The caveat is handed back, not auto-corrected.
    assert_eq!(outcome.issues.len(), 1);
    assert_eq!(report.iterations.total, 0);
}

#[tokio::test]
async fn design_failure_then_pass_reroutes_design_only() {
    let planner = Arc::new(RecordingStage::new(Phase::Planning));
    let designer = Arc::new(RecordingStage::new(Phase::Design).with_repair_evidence(
        FixReport {
            self_confidence: 0.95,
            changes: vec![FixChange {
                file: "design.md".into(),
                search_text: "## Error handling strategy for upstream timeouts".into(),
            }],
        },
        TestReport {
            parse_ok: true,
            passed: 12,
            failed: 0,
            coverage_percent: Some(85.0),
        },
    ));
    let reviewer = ScriptedReviewer::new(vec![vec![design_failure(Severity::High)], vec![]]);

    let ctl = controller(
        planner.clone(),
        designer.clone(),
        Arc::new(reviewer),
        Arc::new(FixedBroker(ApprovalDecision::Approved)),
        HitlConfig::autonomous(),
        IterationLimits::default(),
    );

    let report = ctl.run(request()).await.unwrap();

    assert_eq!(report.status, RunStatus::Accepted);
    assert_eq!(report.iterations.design, 1);
    assert_eq!(report.iterations.planning, 0);
    assert_eq!(report.iterations.total, 1);
    // Planner ran once without feedback; designer reran with feedback.
    assert_eq!(planner.invocations(), vec![false]);
    assert_eq!(designer.invocations(), vec![false, true]);
    // One confidence breakdown was scored for the repair iteration.
    assert_eq!(report.confidence_history.len(), 1);
}

#[tokio::test]
async fn planning_failure_regenerates_design() {
    let planner = Arc::new(RecordingStage::new(Phase::Planning));
    let designer = Arc::new(RecordingStage::new(Phase::Design));
    let finding = ReviewFinding::new("scope", Severity::Critical, "plan omits auth entirely")
        .with_affected_phase(AffectedPhase::Planning);
    let reviewer = ScriptedReviewer::new(vec![vec![finding], vec![]]);

    let ctl = controller(
        planner.clone(),
        designer.clone(),
        Arc::new(reviewer),
        Arc::new(FixedBroker(ApprovalDecision::Approved)),
        HitlConfig::autonomous(),
        IterationLimits::default(),
    );

    let report = ctl.run(request()).await.unwrap();

    assert_eq!(report.status, RunStatus::Accepted);
    assert_eq!(report.iterations.planning, 1);
    assert_eq!(report.iterations.design, 0);
    // Planner reran with feedback; the invalidated design regenerated
    // without feedback (its previous output was simply discarded).
    assert_eq!(planner.invocations(), vec![false, true]);
    assert_eq!(designer.invocations(), vec![false, false]);
}

#[tokio::test]
async fn both_phase_issue_routes_to_planning_first() {
    let planner = Arc::new(RecordingStage::new(Phase::Planning));
    let designer = Arc::new(RecordingStage::new(Phase::Design));
    let finding = ReviewFinding::new("consistency", Severity::High, "plan and design disagree")
        .with_affected_phase(AffectedPhase::Both);
    let reviewer = ScriptedReviewer::new(vec![vec![finding], vec![]]);

    let ctl = controller(
        planner.clone(),
        designer.clone(),
        Arc::new(reviewer),
        Arc::new(FixedBroker(ApprovalDecision::Approved)),
        HitlConfig::autonomous(),
        IterationLimits::default(),
    );

    let report = ctl.run(request()).await.unwrap();

    assert_eq!(report.status, RunStatus::Accepted);
    // The earlier, more expensive route was chosen.
    assert_eq!(report.iterations.planning, 1);
    assert_eq!(planner.invocations(), vec![false, true]);
    // Multi-phase feedback also reaches the regenerated design.
    assert_eq!(designer.invocations(), vec![false, true]);
}

#[tokio::test]
async fn always_failing_gate_terminates_with_max_iterations() {
    let limits = IterationLimits {
        per_phase: 3,
        total: 10,
    };
    let ctl = controller(
        Arc::new(RecordingStage::new(Phase::Planning)),
        Arc::new(RecordingStage::new(Phase::Design)),
        Arc::new(AlwaysFailingReviewer(design_failure(Severity::High))),
        Arc::new(FixedBroker(ApprovalDecision::Approved)),
        HitlConfig::autonomous(),
        limits,
    );

    let err = ctl.run(request()).await.unwrap_err();

    match err {
        PipelineError::MaxIterationsExceeded {
            iterations,
            limits: reported_limits,
            last_outcome,
        } => {
            // Design hit its per-phase bound; planning never implicated.
            assert_eq!(iterations.design, limits.per_phase);
            assert_eq!(iterations.planning, 0);
            assert_eq!(reported_limits, limits);
            assert_eq!(last_outcome.assessment, Assessment::Fail);
        }
        other => panic!("expected MaxIterationsExceeded, got {:?}", other),
    }
}

#[tokio::test]
async fn supervised_mode_escalates_repaired_run_and_accepts_on_approval() {
    let designer = Arc::new(RecordingStage::new(Phase::Design));
    let reviewer = ScriptedReviewer::new(vec![vec![design_failure(Severity::High)], vec![]]);

    let ctl = controller(
        Arc::new(RecordingStage::new(Phase::Planning)),
        designer,
        Arc::new(reviewer),
        Arc::new(FixedBroker(ApprovalDecision::Approved)),
        HitlConfig::supervised(),
        IterationLimits::default(),
    );

    let report = ctl.run(request()).await.unwrap();
    assert_eq!(report.status, RunStatus::Accepted);
    // The escalation and its resolution are both in the audit trail.
    let audit_json = serde_json::to_string(&report.audit).unwrap();
    assert!(audit_json.contains("escalated"));
    assert!(audit_json.contains("approval_resolved"));
}

#[tokio::test]
async fn rejection_and_deferral_are_terminal_non_accepted() {
    for (decision, expected) in [
        (ApprovalDecision::Rejected, RunStatus::ApprovalRejected),
        (ApprovalDecision::Deferred, RunStatus::ApprovalDeferred),
    ] {
        let reviewer = ScriptedReviewer::new(vec![vec![design_failure(Severity::High)], vec![]]);
        let ctl = controller(
            Arc::new(RecordingStage::new(Phase::Planning)),
            Arc::new(RecordingStage::new(Phase::Design)),
            Arc::new(reviewer),
            Arc::new(FixedBroker(decision)),
            HitlConfig::supervised(),
            IterationLimits::default(),
        );

        let report = ctl.run(request()).await.unwrap();
        assert_eq!(report.status, expected);
        assert!(!report.status.is_accepted());
    }
}

#[tokio::test]
async fn broker_timeout_records_no_decision_not_denial() {
    let reviewer = ScriptedReviewer::new(vec![vec![design_failure(Severity::High)], vec![]]);
    let ctl = controller(
        Arc::new(RecordingStage::new(Phase::Planning)),
        Arc::new(RecordingStage::new(Phase::Design)),
        Arc::new(reviewer),
        Arc::new(TimeoutBroker),
        HitlConfig::supervised(),
        IterationLimits::default(),
    );

    let report = ctl.run(request()).await.unwrap();
    assert_eq!(report.status, RunStatus::NoDecision);
    assert_ne!(report.status, RunStatus::ApprovalRejected);
    let audit_json = serde_json::to_string(&report.audit).unwrap();
    assert!(audit_json.contains("approval_timed_out"));
}

#[tokio::test]
async fn low_confidence_repair_escalates_under_threshold_mode() {
    // Repair evidence with a failing test run drives confidence below
    // the floor.
    let designer = Arc::new(RecordingStage::new(Phase::Design).with_repair_evidence(
        FixReport {
            self_confidence: 0.3,
            changes: vec![FixChange {
                file: "design.md".into(),
                search_text: "x".into(),
            }],
        },
        TestReport {
            parse_ok: true,
            passed: 1,
            failed: 9,
            coverage_percent: Some(10.0),
        },
    ));
    let reviewer = ScriptedReviewer::new(vec![vec![design_failure(Severity::High)], vec![]]);

    let ctl = controller(
        Arc::new(RecordingStage::new(Phase::Planning)),
        designer,
        Arc::new(reviewer),
        Arc::new(FixedBroker(ApprovalDecision::Rejected)),
        HitlConfig::threshold(),
        IterationLimits::default(),
    );

    let report = ctl.run(request()).await.unwrap();
    assert_eq!(report.status, RunStatus::ApprovalRejected);
    assert_eq!(report.confidence_history.len(), 1);
    assert!(report.confidence_history[0].overall < 0.6);
}

#[tokio::test]
async fn stage_breakdown_propagates_as_error() {
    let ctl = PipelineController::new(
        Arc::new(BrokenStage(Phase::Planning)),
        Arc::new(RecordingStage::new(Phase::Design)),
        Arc::new(ScriptedReviewer::new(vec![])),
        Arc::new(FixedBroker(ApprovalDecision::Approved)),
        HitlConfig::threshold(),
        IterationLimits::default(),
    );

    let err = ctl.run(request()).await.unwrap_err();
    assert!(matches!(err, PipelineError::StageExecution { phase: Phase::Planning, .. }));
}
