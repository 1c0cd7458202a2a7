//! Phase routing: deciding which stage must absorb corrective feedback.
//!
//! Routing encodes "fix a defect in the phase where it was injected".
//! Rerouting to an earlier phase invalidates all downstream outputs, so
//! the earlier route is only chosen when no narrower fix is possible.

use serde::{Deserialize, Serialize};
use tracing::warn;

use stagegate_domain::{Issue, Phase, ValidationOutcome};

/// Issues partitioned by the phase they implicate.
///
/// An issue tagged `Both` lands in both per-phase partitions and in
/// `multi_phase`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssuePartitions {
    pub planning: Vec<Issue>,
    pub design: Vec<Issue>,
    pub multi_phase: Vec<Issue>,
}

/// Partition an outcome's issues by affected phase.
pub fn partition_by_phase(outcome: &ValidationOutcome) -> IssuePartitions {
    let mut partitions = IssuePartitions::default();
    for issue in &outcome.issues {
        if issue.affected_phase.involves(Phase::Planning) {
            partitions.planning.push(issue.clone());
        }
        if issue.affected_phase.involves(Phase::Design) {
            partitions.design.push(issue.clone());
        }
        if issue.affected_phase == stagegate_domain::AffectedPhase::Both {
            partitions.multi_phase.push(issue.clone());
        }
    }
    partitions
}

/// Where corrective feedback must flow next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RoutingDecision {
    /// The run is accepted; NeedsImprovement is handed back to the
    /// caller, not auto-corrected.
    NoAction,
    /// Re-invoke one phase with the carried issues. Routing to
    /// `Planning` discards the design output; routing to `Design`
    /// retains planning output.
    Reroute { phase: Phase, issues: Vec<Issue> },
    /// Issues implicate several phases; the earliest listed phase is
    /// re-invoked first and downstream phases are regenerated.
    RerouteMultiPhase {
        phases: Vec<Phase>,
        issues: Vec<Issue>,
    },
}

impl RoutingDecision {
    /// The first phase to re-invoke, if any.
    pub fn target_phase(&self) -> Option<Phase> {
        match self {
            Self::NoAction => None,
            Self::Reroute { phase, .. } => Some(*phase),
            Self::RerouteMultiPhase { phases, .. } => phases.first().copied(),
        }
    }

    /// Issues carried to the rerouted phase, if any.
    pub fn issues(&self) -> &[Issue] {
        match self {
            Self::NoAction => &[],
            Self::Reroute { issues, .. } => issues,
            Self::RerouteMultiPhase { issues, .. } => issues,
        }
    }
}

/// Priority-ordered routing over a validation outcome.
pub struct PhaseRouter;

impl PhaseRouter {
    /// Decide where a failed outcome's feedback must go.
    ///
    /// First match wins:
    /// 1. Pass / NeedsImprovement → `NoAction`.
    /// 2. Any planning-implicated issue → reroute to planning (the more
    ///    expensive route; design output is regenerated).
    /// 3. Any design-implicated issue → reroute to design only.
    /// 4. No attribution at all → defensive fallback to the phase
    ///    immediately preceding the gate, carrying the full issue list,
    ///    logged and surfaced to the audit trail.
    pub fn route(outcome: &ValidationOutcome) -> (RoutingDecision, bool) {
        if outcome.assessment.is_acceptable() {
            return (RoutingDecision::NoAction, false);
        }

        let partitions = partition_by_phase(outcome);

        if !partitions.planning.is_empty() {
            if !partitions.multi_phase.is_empty() {
                return (
                    RoutingDecision::RerouteMultiPhase {
                        phases: vec![Phase::Planning, Phase::Design],
                        issues: partitions.planning,
                    },
                    false,
                );
            }
            return (
                RoutingDecision::Reroute {
                    phase: Phase::Planning,
                    issues: partitions.planning,
                },
                false,
            );
        }

        if !partitions.design.is_empty() {
            return (
                RoutingDecision::Reroute {
                    phase: Phase::Design,
                    issues: partitions.design,
                },
                false,
            );
        }

        // No phase attribution present. Route everything to the stage
        // immediately preceding the gate and surface the fallback.
        warn!(
            issue_count = outcome.issues.len(),
            "phase attribution absent; falling back to design-phase routing"
        );
        (
            RoutingDecision::Reroute {
                phase: Phase::Design,
                issues: outcome.issues.clone(),
            },
            true,
        )
    }
}
