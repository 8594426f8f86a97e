//! The rule contract and the panic-isolating dispatcher.
//!
//! A rule is a named, CPU-only validator. It claims authority over line
//! ranges of a file (`covered_lines`) and judges the changed lines that
//! fall inside that claim (`validate`). Rules must not perform I/O inside
//! `validate`; anything they need beyond the file contents is supplied
//! through the [`RuleContext`] by the engine before dispatch.

use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::lines::RangeSet;
use crate::sections::SectionInstance;
use crate::verdict::{Decision, LineValidationResult};

/// Everything a rule sees for one invocation. All references are
/// immutable; rules produce results, they never mutate evaluation state.
pub struct RuleContext<'a> {
    /// Repository path of the changed file.
    pub path: &'a str,
    /// Full content of the file at the MR's source revision.
    pub new_content: &'a str,
    /// Full content at the target revision, when it exists there.
    pub old_content: Option<&'a str>,
    /// Changed lines intersected with this rule's claimed coverage.
    pub changed: &'a RangeSet,
    /// The section instance under which the rule was dispatched.
    pub section: &'a SectionInstance<'a>,
}

/// Contract every rule implementation must satisfy.
pub trait Rule: Send + Sync + 'static {
    /// Stable, unique rule name; referenced from configuration.
    fn name(&self) -> &'static str;

    /// Human-readable description of what the rule enforces.
    fn description(&self) -> &'static str;

    /// Line ranges this rule claims authority over in the given file.
    /// The union of claims across rules is the file's coverage.
    fn covered_lines(&self, path: &str, content: &str) -> RangeSet;

    /// Judge the changed lines inside this rule's claim.
    fn validate(&self, ctx: &RuleContext<'_>) -> LineValidationResult;
}

/// Invoke a rule, converting panics into `manual_review` results.
///
/// A rule that dies must not take the MR evaluation with it: the failure
/// is surfaced in the result's reason and the remaining rules still run.
pub fn run_rule(rule: &dyn Rule, ctx: &RuleContext<'_>) -> LineValidationResult {
    match catch_unwind(AssertUnwindSafe(|| rule.validate(ctx))) {
        Ok(result) => result,
        Err(payload) => LineValidationResult {
            rule: rule.name().to_string(),
            decision: Decision::ManualReview,
            reason: format!(
                "rule '{}' failed internally: {}",
                rule.name(),
                panic_message(payload.as_ref())
            ),
            covered: RangeSet::new(),
            metadata: None,
        },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SectionDefinition;
    use crate::lines::LineRange;

    struct PanickyRule;

    impl Rule for PanickyRule {
        fn name(&self) -> &'static str {
            "panicky_rule"
        }

        fn description(&self) -> &'static str {
            "always panics"
        }

        fn covered_lines(&self, _path: &str, _content: &str) -> RangeSet {
            RangeSet::whole_file(1)
        }

        fn validate(&self, _ctx: &RuleContext<'_>) -> LineValidationResult {
            panic!("index out of range");
        }
    }

    struct ApprovingRule;

    impl Rule for ApprovingRule {
        fn name(&self) -> &'static str {
            "approving_rule"
        }

        fn description(&self) -> &'static str {
            "approves everything it sees"
        }

        fn covered_lines(&self, _path: &str, content: &str) -> RangeSet {
            RangeSet::whole_file(content.lines().count())
        }

        fn validate(&self, ctx: &RuleContext<'_>) -> LineValidationResult {
            LineValidationResult {
                rule: self.name().to_string(),
                decision: Decision::Approve,
                reason: "looks fine".to_string(),
                covered: ctx.changed.clone(),
                metadata: None,
            }
        }
    }

    fn dummy_section(definition: &SectionDefinition) -> SectionInstance<'_> {
        SectionInstance {
            definition,
            range: LineRange::new(1, 1),
            content: "a: 1".to_string(),
        }
    }

    fn dummy_definition() -> SectionDefinition {
        SectionDefinition {
            name: "all".to_string(),
            yaml_path: ".".to_string(),
            required: false,
            auto_approve: false,
            rule_configs: Vec::new(),
            description: String::new(),
        }
    }

    #[test]
    fn panicking_rule_becomes_manual_review() {
        let definition = dummy_definition();
        let section = dummy_section(&definition);
        let changed = RangeSet::whole_file(1);
        let ctx = RuleContext {
            path: "a.yaml",
            new_content: "a: 1",
            old_content: None,
            changed: &changed,
            section: &section,
        };

        let result = run_rule(&PanickyRule, &ctx);
        assert_eq!(result.decision, Decision::ManualReview);
        assert!(result.reason.contains("panicky_rule"));
        assert!(result.reason.contains("index out of range"));
    }

    #[test]
    fn healthy_rule_result_passes_through() {
        let definition = dummy_definition();
        let section = dummy_section(&definition);
        let changed = RangeSet::whole_file(1);
        let ctx = RuleContext {
            path: "a.yaml",
            new_content: "a: 1",
            old_content: Some("a: 0"),
            changed: &changed,
            section: &section,
        };

        let result = run_rule(&ApprovingRule, &ctx);
        assert_eq!(result.decision, Decision::Approve);
        assert_eq!(result.rule, "approving_rule");
        assert_eq!(result.covered, changed);
    }
}
