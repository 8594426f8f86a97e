//! Warehouse size changes: decreases are fine, increases need a human.

use mergeguard_core::{
    Decision, LineRange, LineValidationResult, RangeSet, Rule, RuleContext, parse_document,
};

const RULE_NAME: &str = "size_change_rule";

/// Known warehouse sizes, smallest first. Both `X-SMALL` and `XSMALL`
/// spellings are accepted, case-insensitively.
const SIZE_ORDER: &[&str] = &[
    "XSMALL", "SMALL", "MEDIUM", "LARGE", "XLARGE", "2XLARGE", "3XLARGE", "4XLARGE",
];

/// Approves warehouse size changes that do not increase spend: removals,
/// decreases, and no-ops pass; additions, increases, and anything the rule
/// cannot read are flagged for review.
#[derive(Debug, Clone, Default)]
pub struct SizeChangeRule;

impl Rule for SizeChangeRule {
    fn name(&self) -> &'static str {
        RULE_NAME
    }

    fn description(&self) -> &'static str {
        "warehouse size changes must be decreases"
    }

    fn covered_lines(&self, _path: &str, content: &str) -> RangeSet {
        warehouses_range(content)
            .map(|range| RangeSet::from_ranges([range]))
            .unwrap_or_default()
    }

    fn validate(&self, ctx: &RuleContext<'_>) -> LineValidationResult {
        let verdict = match ctx.old_content {
            None => Err("no previous revision to compare warehouse sizes against".to_string()),
            Some(old) => compare_sizes(old, ctx.new_content),
        };

        match verdict {
            Ok(summary) => LineValidationResult {
                rule: RULE_NAME.to_string(),
                decision: Decision::Approve,
                reason: format!("{RULE_NAME}: {summary}"),
                covered: ctx.changed.clone(),
                metadata: None,
            },
            Err(problem) => LineValidationResult {
                rule: RULE_NAME.to_string(),
                decision: Decision::ManualReview,
                reason: format!("{RULE_NAME}: {problem}"),
                covered: ctx.changed.clone(),
                metadata: None,
            },
        }
    }
}

fn warehouses_range(content: &str) -> Option<LineRange> {
    parse_document(content).ok()?.resolve("warehouses")
}

/// Ordered `size:` values inside the warehouses block.
fn warehouse_sizes(content: &str) -> Vec<String> {
    let Some(range) = warehouses_range(content) else {
        return Vec::new();
    };
    content
        .lines()
        .enumerate()
        .filter(|(idx, _)| idx + 1 >= range.start && idx + 1 <= range.end)
        .filter_map(|(_, line)| {
            let trimmed = line.trim_start().trim_start_matches("- ");
            let value = trimmed.strip_prefix("size:")?;
            Some(value.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        })
        .collect()
}

fn size_rank(size: &str) -> Option<usize> {
    let normalized: String = size
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .collect::<String>()
        .to_ascii_uppercase();
    SIZE_ORDER.iter().position(|s| *s == normalized)
}

fn compare_sizes(old: &str, new: &str) -> Result<String, String> {
    let old_sizes = warehouse_sizes(old);
    let new_sizes = warehouse_sizes(new);

    if new_sizes.len() > old_sizes.len() {
        return Err(format!(
            "{} warehouse(s) added; additions need review",
            new_sizes.len() - old_sizes.len()
        ));
    }

    for (index, (old_size, new_size)) in old_sizes.iter().zip(new_sizes.iter()).enumerate() {
        let old_rank = size_rank(old_size)
            .ok_or_else(|| format!("unrecognised warehouse size '{old_size}'"))?;
        let new_rank = size_rank(new_size)
            .ok_or_else(|| format!("unrecognised warehouse size '{new_size}'"))?;
        if new_rank > old_rank {
            return Err(format!(
                "warehouse {} size increased from {} to {}",
                index + 1,
                old_size,
                new_size
            ));
        }
    }

    Ok("warehouse sizes unchanged or decreased".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mergeguard_core::SectionDefinition;
    use mergeguard_core::SectionInstance;

    fn product(size: &str) -> String {
        format!("warehouses:\n  - type: user\n    size: {size}\n")
    }

    fn definition() -> SectionDefinition {
        SectionDefinition {
            name: "warehouses".to_string(),
            yaml_path: "warehouses".to_string(),
            required: false,
            auto_approve: false,
            rule_configs: Vec::new(),
            description: String::new(),
        }
    }

    fn run(old: Option<String>, new: &str) -> LineValidationResult {
        let definition = definition();
        let section = SectionInstance {
            definition: &definition,
            range: LineRange::new(1, 3),
            content: new.to_string(),
        };
        let changed = RangeSet::from_ranges([LineRange::new(3, 3)]);
        let ctx = RuleContext {
            path: "dataproducts/agg/foo/prod/product.yaml",
            new_content: new,
            old_content: old.as_deref(),
            changed: &changed,
            section: &section,
        };
        SizeChangeRule.validate(&ctx)
    }

    #[test]
    fn covered_lines_claims_the_warehouses_block() {
        let content = product("LARGE");
        let covered = SizeChangeRule.covered_lines("p.yaml", &content);
        assert_eq!(covered, RangeSet::from_ranges([LineRange::new(1, 3)]));
    }

    #[test]
    fn no_warehouses_block_claims_nothing() {
        let covered = SizeChangeRule.covered_lines("p.yaml", "name: x\n");
        assert!(covered.is_empty());
    }

    #[test]
    fn decrease_is_approved() {
        let result = run(Some(product("LARGE")), &product("MEDIUM"));
        assert_eq!(result.decision, Decision::Approve);
    }

    #[test]
    fn unchanged_size_is_approved() {
        let result = run(Some(product("SMALL")), &product("SMALL"));
        assert_eq!(result.decision, Decision::Approve);
    }

    #[test]
    fn increase_is_flagged() {
        let result = run(Some(product("SMALL")), &product("LARGE"));
        assert_eq!(result.decision, Decision::ManualReview);
        assert!(result.reason.contains("size_change_rule"));
        assert!(result.reason.contains("increased"));
    }

    #[test]
    fn hyphenated_spellings_are_understood() {
        let result = run(Some(product("X-LARGE")), &product("x-small"));
        assert_eq!(result.decision, Decision::Approve);
    }

    #[test]
    fn added_warehouse_is_flagged() {
        let old = product("SMALL");
        let new = format!("{}  - type: service\n    size: SMALL\n", product("SMALL"));
        let result = run(Some(old), &new);
        assert_eq!(result.decision, Decision::ManualReview);
        assert!(result.reason.contains("added"));
    }

    #[test]
    fn removed_warehouse_is_approved() {
        let old = format!("{}  - type: service\n    size: SMALL\n", product("SMALL"));
        let result = run(Some(old), &product("SMALL"));
        assert_eq!(result.decision, Decision::Approve);
    }

    #[test]
    fn unknown_size_is_flagged() {
        let result = run(Some(product("SMALL")), &product("GIGANTIC"));
        assert_eq!(result.decision, Decision::ManualReview);
        assert!(result.reason.contains("GIGANTIC"));
    }

    #[test]
    fn missing_old_revision_is_flagged() {
        let result = run(None, &product("SMALL"));
        assert_eq!(result.decision, Decision::ManualReview);
        assert!(result.reason.contains("previous revision"));
    }
}
