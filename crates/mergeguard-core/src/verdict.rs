//! Decision types and the coverage-enforcing aggregator.
//!
//! Aggregation is where the engine's two invariants are enforced:
//! every changed line must be covered by an enabled rule (or be excused by
//! the file-type's default action), and a single `manual_review` verdict
//! anywhere taints the whole merge request.

use serde::{Deserialize, Serialize};

use crate::config::DefaultAction;
use crate::lines::RangeSet;

/// The verdict for a rule invocation, a file, or a whole merge request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    ManualReview,
}

impl Decision {
    pub fn is_approve(self) -> bool {
        matches!(self, Decision::Approve)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Decision::Approve => "approve",
            Decision::ManualReview => "manual_review",
        })
    }
}

/// Outcome of one rule invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineValidationResult {
    pub rule: String,
    pub decision: Decision,
    pub reason: String,
    /// Line ranges the rule claims to cover; always a subset of the
    /// section range it ran under.
    pub covered: RangeSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Per-file verdict with the evidence that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileValidationSummary {
    pub path: String,
    /// Name of the matching file rule; `None` for unmatched files.
    pub file_rule: Option<String>,
    pub total_lines: usize,
    /// Union of all rules' claimed ranges in this file.
    pub covered: RangeSet,
    pub rule_results: Vec<LineValidationResult>,
    /// Changed ranges no enabled rule claimed.
    pub uncovered_changed: RangeSet,
    pub decision: Decision,
    pub reason: String,
}

impl FileValidationSummary {
    /// A summary for a file that short-circuited before rule dispatch
    /// (unmatched, fetch failure, deletion, timeout, ...).
    pub fn short_circuit(
        path: impl Into<String>,
        file_rule: Option<String>,
        decision: Decision,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            file_rule,
            total_lines: 0,
            covered: RangeSet::new(),
            rule_results: Vec::new(),
            uncovered_changed: RangeSet::new(),
            decision,
            reason: reason.into(),
        }
    }
}

/// The per-MR evaluation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub decision: Decision,
    pub reason: String,
    pub files: Vec<FileValidationSummary>,
    pub approved_files: usize,
    pub reviewed_files: usize,
    /// Files with changed lines outside every claimed range, plus
    /// unmatched files.
    pub uncovered_files: usize,
    pub duration_ms: u64,
}

/// Flags from the top-level config that tighten aggregation.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictnessFlags {
    pub require_full_coverage: bool,
    pub manual_review_on_uncovered: bool,
}

/// Combine one file's rule results under the coverage invariant.
#[allow(clippy::too_many_arguments)]
pub fn aggregate_file(
    path: impl Into<String>,
    file_rule: impl Into<String>,
    total_lines: usize,
    changed: &RangeSet,
    covered: RangeSet,
    rule_results: Vec<LineValidationResult>,
    default_action: DefaultAction,
    flags: StrictnessFlags,
) -> FileValidationSummary {
    let uncovered_changed = changed.subtract(&covered);

    let uncovered_forces_review = !uncovered_changed.is_empty()
        && (default_action == DefaultAction::ManualReview
            || flags.manual_review_on_uncovered
            || flags.require_full_coverage);

    let (decision, reason) = if uncovered_forces_review {
        (
            Decision::ManualReview,
            format!("uncovered changed lines: {uncovered_changed}"),
        )
    } else if rule_results
        .iter()
        .any(|r| r.decision == Decision::ManualReview)
    {
        let reasons: Vec<&str> = rule_results
            .iter()
            .filter(|r| r.decision == Decision::ManualReview)
            .map(|r| r.reason.as_str())
            .collect();
        (Decision::ManualReview, reasons.join("; "))
    } else if rule_results.is_empty() {
        (Decision::Approve, "no changed lines required review".to_string())
    } else {
        let reasons: Vec<&str> = rule_results.iter().map(|r| r.reason.as_str()).collect();
        (Decision::Approve, reasons.join("; "))
    };

    FileValidationSummary {
        path: path.into(),
        file_rule: Some(file_rule.into()),
        total_lines,
        covered,
        rule_results,
        uncovered_changed,
        decision,
        reason,
    }
}

/// Combine per-file summaries into the MR verdict: approve only when every
/// file approves.
pub fn aggregate_mr(files: Vec<FileValidationSummary>, duration_ms: u64) -> RuleEvaluation {
    let approved_files = files.iter().filter(|f| f.decision.is_approve()).count();
    let reviewed_files = files.len() - approved_files;
    let uncovered_files = files
        .iter()
        .filter(|f| !f.uncovered_changed.is_empty() || f.file_rule.is_none())
        .count();

    let all_approved = !files.is_empty() && files.iter().all(|f| f.decision.is_approve());
    let (decision, reason) = if all_approved {
        (Decision::Approve, format!("{approved_files} file(s) approved"))
    } else {
        let reasons: Vec<String> = files
            .iter()
            .filter(|f| !f.decision.is_approve())
            .map(|f| format!("{}: {}", f.path, f.reason))
            .collect();
        (Decision::ManualReview, reasons.join("; "))
    };

    RuleEvaluation {
        decision,
        reason,
        files,
        approved_files,
        reviewed_files,
        uncovered_files,
        duration_ms,
    }
}
