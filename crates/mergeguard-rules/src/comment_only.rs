//! Comment and blank lines carry no behaviour; edits to them are safe —
//! but only when the lines were comments or blanks before the change too.

use mergeguard_core::{
    Decision, LineRange, LineValidationResult, RangeSet, Rule, RuleContext,
};

const RULE_NAME: &str = "comment_only_rule";

/// Claims the blank and comment-only lines of the new file, and approves a
/// change only when the same lines were blank or comment-only in the
/// previous revision as well. Commenting out a live setting turns real
/// configuration into a comment; that is a semantic change and stays in
/// manual review.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentOnlyRule;

impl Rule for CommentOnlyRule {
    fn name(&self) -> &'static str {
        RULE_NAME
    }

    fn description(&self) -> &'static str {
        "edits that are comment-only in both revisions are auto-approved"
    }

    fn covered_lines(&self, _path: &str, content: &str) -> RangeSet {
        RangeSet::from_ranges(content.lines().enumerate().filter_map(|(idx, line)| {
            if is_inert(line) {
                Some(LineRange::single(idx + 1))
            } else {
                None
            }
        }))
    }

    fn validate(&self, ctx: &RuleContext<'_>) -> LineValidationResult {
        let Some(old_content) = ctx.old_content else {
            return verdict(
                Decision::ManualReview,
                "no previous revision to compare against".to_string(),
                ctx,
            );
        };

        // Changed lines are aligned by line number: the claim only covers
        // lines inside one section, and anything shifted by earlier
        // insertions or deletions fails the check conservatively.
        let old_lines: Vec<&str> = old_content.lines().collect();
        for range in ctx.changed.iter() {
            for line_no in range.start..=range.end {
                match old_lines.get(line_no - 1) {
                    Some(line) if is_inert(line) => {}
                    Some(_) => {
                        return verdict(
                            Decision::ManualReview,
                            format!("line {line_no} held configuration in the previous revision"),
                            ctx,
                        );
                    }
                    None => {
                        return verdict(
                            Decision::ManualReview,
                            format!("line {line_no} has no counterpart in the previous revision"),
                            ctx,
                        );
                    }
                }
            }
        }

        verdict(
            Decision::Approve,
            "only comments or blank lines changed in both revisions".to_string(),
            ctx,
        )
    }
}

fn is_inert(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn verdict(decision: Decision, detail: String, ctx: &RuleContext<'_>) -> LineValidationResult {
    LineValidationResult {
        rule: RULE_NAME.to_string(),
        decision,
        reason: format!("{RULE_NAME}: {detail}"),
        covered: ctx.changed.clone(),
        metadata: None,
    }
}
