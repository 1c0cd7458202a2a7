//! HITL approval policy: a pure decision function over immutable
//! configuration.
//!
//! Evaluating the policy twice with identical inputs yields identical
//! output; there is no hidden state and no randomness.

use serde::{Deserialize, Serialize};

use stagegate_domain::{HitlConfig, HitlMode};

/// The policy's answer: whether approval is mandatory and every reason
/// that triggered, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequirement {
    pub required: bool,
    pub reasons: Vec<String>,
}

impl ApprovalRequirement {
    fn not_required() -> Self {
        Self {
            required: false,
            reasons: Vec::new(),
        }
    }

    /// All triggered reasons joined for reporting.
    pub fn reason(&self) -> String {
        self.reasons.join("; ")
    }
}

/// Decide whether human approval is mandatory for the current iteration.
///
/// Threshold mode ORs five independent conditions and reports every one
/// that triggered. The auto-approve ceiling shortcut never bypasses a
/// critical-file match or the hard iteration ceiling.
pub fn requires_approval(
    config: &HitlConfig,
    iteration: u32,
    confidence: f32,
    files_to_modify: &[String],
    change_count: u32,
) -> ApprovalRequirement {
    match config.mode {
        HitlMode::Autonomous => ApprovalRequirement::not_required(),
        HitlMode::Supervised => ApprovalRequirement {
            required: true,
            reasons: vec!["Supervised mode".to_string()],
        },
        HitlMode::Threshold => evaluate_thresholds(
            config,
            iteration,
            confidence,
            files_to_modify,
            change_count,
        ),
    }
}

fn evaluate_thresholds(
    config: &HitlConfig,
    iteration: u32,
    confidence: f32,
    files_to_modify: &[String],
    change_count: u32,
) -> ApprovalRequirement {
    let mut reasons = Vec::new();
    // Conditions 3 and 5 are never bypassed by the auto-approve ceiling.
    let mut overriding = false;

    if iteration > config.iteration_threshold {
        reasons.push(format!(
            "iteration {} exceeds threshold {}",
            iteration, config.iteration_threshold
        ));
    }

    if confidence < config.confidence_floor {
        reasons.push(format!(
            "confidence {:.2} below floor {:.2}",
            confidence, config.confidence_floor
        ));
    }

    for file in files_to_modify {
        if let Some(pattern) = config
            .critical_file_patterns
            .iter()
            .find(|p| file.contains(p.as_str()))
        {
            reasons.push(format!(
                "critical file '{}' matches pattern '{}'",
                file, pattern
            ));
            overriding = true;
        }
    }

    if change_count > config.large_change_threshold {
        reasons.push(format!(
            "change count {} exceeds threshold {}",
            change_count, config.large_change_threshold
        ));
    }

    if iteration >= config.max_auto_iterations {
        reasons.push(format!(
            "iteration {} reached hard ceiling {}",
            iteration, config.max_auto_iterations
        ));
        overriding = true;
    }

    if reasons.is_empty() {
        return ApprovalRequirement::not_required();
    }

    // High confidence auto-approves borderline cases, but never overrides
    // a critical-file match or the hard ceiling.
    if !overriding && confidence >= config.auto_approve_ceiling {
        return ApprovalRequirement::not_required();
    }

    ApprovalRequirement {
        required: true,
        reasons,
    }
}
