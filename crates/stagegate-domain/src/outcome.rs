//! Validation outcomes derived from issue lists.

use serde::{Deserialize, Serialize};

use crate::issue::{Issue, Severity};

/// Overall verdict of one validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assessment {
    /// No issues at all.
    Pass,
    /// Only Medium/Low issues; accepted with caveats, not auto-corrected.
    NeedsImprovement,
    /// At least one Critical or High issue.
    Fail,
}

impl Assessment {
    /// Whether this verdict lets the run proceed without rerouting.
    pub fn is_acceptable(self) -> bool {
        matches!(self, Self::Pass | Self::NeedsImprovement)
    }
}

impl std::fmt::Display for Assessment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::NeedsImprovement => write!(f, "needs_improvement"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Per-severity issue tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl SeverityCounts {
    /// Total issues counted.
    pub fn total(&self) -> u32 {
        self.critical + self.high + self.medium + self.low
    }
}

/// Result of reviewing one stage output.
///
/// `assessment` and `severity_counts` are always derived from `issues`;
/// there is no constructor that accepts them independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub assessment: Assessment,
    pub issues: Vec<Issue>,
    pub severity_counts: SeverityCounts,
}

impl ValidationOutcome {
    /// Derive an outcome from a list of issues.
    ///
    /// Pass iff no issues; Fail iff any Critical or High issue; otherwise
    /// NeedsImprovement.
    pub fn from_issues(issues: Vec<Issue>) -> Self {
        let mut counts = SeverityCounts::default();
        for issue in &issues {
            match issue.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
            }
        }

        let assessment = if issues.is_empty() {
            Assessment::Pass
        } else if counts.critical > 0 || counts.high > 0 {
            Assessment::Fail
        } else {
            Assessment::NeedsImprovement
        };

        Self {
            assessment,
            issues,
            severity_counts: counts,
        }
    }

    /// A clean pass with no issues.
    pub fn pass() -> Self {
        Self::from_issues(Vec::new())
    }
}
