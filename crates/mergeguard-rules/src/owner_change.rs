//! Ownership edits: any change to the owner field goes to a human.

use mergeguard_core::{
    Decision, LineValidationResult, RangeSet, Rule, RuleContext, parse_document,
};

const RULE_NAME: &str = "owner_change_rule";

/// Flags edits that alter the product owner; approves edits that leave the
/// owner value untouched (reformatting, surrounding changes).
#[derive(Debug, Clone)]
pub struct OwnerChangeRule {
    owner_path: &'static str,
}

impl OwnerChangeRule {
    pub fn new(owner_path: &'static str) -> Self {
        Self { owner_path }
    }
}

impl Default for OwnerChangeRule {
    fn default() -> Self {
        Self::new("spec.owner")
    }
}

impl Rule for OwnerChangeRule {
    fn name(&self) -> &'static str {
        RULE_NAME
    }

    fn description(&self) -> &'static str {
        "owner changes require human review"
    }

    fn covered_lines(&self, _path: &str, content: &str) -> RangeSet {
        parse_document(content)
            .ok()
            .and_then(|tree| tree.resolve(self.owner_path))
            .map(|range| RangeSet::from_ranges([range]))
            .unwrap_or_default()
    }

    fn validate(&self, ctx: &RuleContext<'_>) -> LineValidationResult {
        let new_owner = owner_value(ctx.new_content, self.owner_path);
        let old_owner = ctx
            .old_content
            .and_then(|old| owner_value(old, self.owner_path));

        let (decision, reason) = match (old_owner, new_owner) {
            (Some(old), Some(new)) if old == new => (
                Decision::Approve,
                format!("{RULE_NAME}: owner '{new}' unchanged"),
            ),
            (Some(old), Some(new)) => (
                Decision::ManualReview,
                format!("{RULE_NAME}: owner changed from '{old}' to '{new}'"),
            ),
            (None, Some(new)) => (
                Decision::ManualReview,
                format!("{RULE_NAME}: owner '{new}' was introduced"),
            ),
            (_, None) => (
                Decision::ManualReview,
                format!("{RULE_NAME}: owner value could not be read"),
            ),
        };

        LineValidationResult {
            rule: RULE_NAME.to_string(),
            decision,
            reason,
            covered: ctx.changed.clone(),
            metadata: None,
        }
    }
}

/// The scalar on the owner line, stripped of quoting and trailing comments.
fn owner_value(content: &str, owner_path: &str) -> Option<String> {
    let range = parse_document(content).ok()?.resolve(owner_path)?;
    let line = content.lines().nth(range.start - 1)?;
    let (_, value) = line.split_once(':')?;
    let value = value.split('#').next().unwrap_or("").trim();
    let value = value.trim_matches(|c| c == '"' || c == '\'');
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
