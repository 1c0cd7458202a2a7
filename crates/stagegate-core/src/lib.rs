//! Stagegate orchestration engine.
//!
//! Drives a small number of ordered stages (plan, design) through a
//! validation gate, routes corrective feedback backward to the phase that
//! injected a defect, enforces bounded iteration, and gates
//! low-confidence acceptance behind a human approval decision.
//!
//! The controller is single-threaded control flow: one state transition
//! in flight at a time, stage calls awaited sequentially. Independent
//! runs scale horizontally with no shared mutable state.

pub mod broker;
pub mod confidence;
pub mod controller;
pub mod executor;
pub mod gate;
pub mod guard;
pub mod obs;
pub mod policy;
pub mod router;
pub mod telemetry;

pub use broker::{ApprovalBroker, BrokerError, ChannelBroker, PendingApproval};
pub use confidence::{
    diagnostic_confidence, fix_confidence, iteration_penalty, score_iteration,
    test_coverage_confidence,
};
pub use controller::{PipelineController, PipelineRequest};
pub use executor::{ReviewExecutor, ReviewFinding, StageExecutor, StageRequest, StageResponse};
pub use gate::ValidationGate;
pub use guard::IterationGuard;
pub use obs::{
    emit_escalation, emit_fallback_routing, emit_reroute, emit_run_finished, emit_run_started,
    emit_stage_finished, emit_validation_evaluated, run_span,
};
pub use policy::{requires_approval, ApprovalRequirement};
pub use router::{partition_by_phase, IssuePartitions, PhaseRouter, RoutingDecision};
pub use telemetry::init_tracing;

// Re-export the domain model so engine consumers need a single import.
pub use stagegate_domain as domain;
