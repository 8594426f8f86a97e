//! The rule engine: evaluation of one merge request.
//!
//! Evaluation is a pure function of `(config, registry, fetched state)`.
//! Files are processed in lexicographic order and rules in configured
//! order, so byte-identical inputs produce byte-identical results
//! (execution time aside). Failures inside one file never abort the MR:
//! they become `manual_review` summaries for that file and the remaining
//! files still run.

use std::time::Instant;

use tokio::time::Instant as TokioInstant;

use crate::config::{DefaultAction, FileRuleConfig, ParserKind, RuleConfig};
use crate::diff::{DiffAttribution, attribute_diff};
use crate::document::parse_document;
use crate::error::{ConfigError, FetchError, FetchResult};
use crate::fetch::{ChangeFetcher, FileChange};
use crate::lines::RangeSet;
use crate::matcher::CompiledRuleSet;
use crate::registry::RuleRegistry;
use crate::rules::{RuleContext, run_rule};
use crate::sections::resolve_sections;
use crate::verdict::{
    Decision, FileValidationSummary, LineValidationResult, RuleEvaluation, StrictnessFlags,
    aggregate_file, aggregate_mr,
};

/// Resource ceilings enforced per evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EngineLimits {
    /// Largest file content the engine will analyse.
    pub max_file_bytes: usize,
    /// Largest number of changed files in one MR.
    pub max_files: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: 1024 * 1024,
            max_files: 500,
        }
    }
}

/// Identity of the merge request under evaluation.
#[derive(Debug, Clone, Default)]
pub struct MergeRequest {
    pub project: u64,
    pub iid: u64,
    pub title: Option<String>,
    pub author: Option<String>,
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
}

impl MergeRequest {
    pub fn new(project: u64, iid: u64) -> Self {
        Self {
            project,
            iid,
            ..Default::default()
        }
    }
}

/// One-MR evaluator over a fetcher facade.
///
/// Construction validates the configuration against the registry and
/// pre-compiles all globs; an `Engine` that exists is one that can serve.
pub struct Engine<'a, F> {
    config: &'a RuleConfig,
    registry: &'a RuleRegistry,
    fetcher: &'a F,
    compiled: CompiledRuleSet,
    limits: EngineLimits,
}

impl<'a, F: ChangeFetcher> Engine<'a, F> {
    pub fn new(
        config: &'a RuleConfig,
        registry: &'a RuleRegistry,
        fetcher: &'a F,
    ) -> Result<Self, ConfigError> {
        config.validate(registry)?;
        let compiled = CompiledRuleSet::compile(config)?;
        Ok(Self {
            config,
            registry,
            fetcher,
            compiled,
            limits: EngineLimits::default(),
        })
    }

    pub fn with_limits(mut self, limits: EngineLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Evaluate one merge request.
    ///
    /// `deadline` bounds every fetch; when it expires, files not yet
    /// evaluated are recorded as timed out and the MR goes to manual
    /// review. Partial progress is kept, never discarded.
    pub async fn evaluate(
        &self,
        mr: &MergeRequest,
        deadline: Option<TokioInstant>,
    ) -> RuleEvaluation {
        let started = Instant::now();

        let mut changes = match self
            .bounded(self.fetcher.changes(mr.project, mr.iid), deadline)
            .await
        {
            Ok(changes) => changes,
            Err(err) => {
                return refusal(started, format!("could not analyse merge request: {err}"));
            }
        };

        if changes.is_empty() {
            return refusal(started, "empty MR".to_string());
        }
        if changes.len() > self.limits.max_files {
            return refusal(
                started,
                format!(
                    "merge request touches {} files, more than the limit of {}",
                    changes.len(),
                    self.limits.max_files
                ),
            );
        }
        if changes
            .iter()
            .all(|c| c.diff.trim().is_empty() && !c.new_file)
        {
            // Merge-conflict resolutions can leave no net change; approving
            // them silently would rubber-stamp whatever the merge did.
            return refusal(started, "empty MR".to_string());
        }

        changes.sort_by(|a, b| a.effective_path().cmp(b.effective_path()));

        let source_rev = match self
            .bounded(self.fetcher.source_revision(mr.project, mr.iid), deadline)
            .await
        {
            Ok(rev) => rev,
            Err(err) => {
                return refusal(started, format!("could not analyse merge request: {err}"));
            }
        };
        let target_rev = self
            .bounded(self.fetcher.target_revision(mr.project, mr.iid), deadline)
            .await
            .ok();

        let mut summaries = Vec::with_capacity(changes.len());
        let mut deadline_hit = false;
        for change in &changes {
            if deadline_hit {
                summaries.push(FileValidationSummary::short_circuit(
                    change.effective_path(),
                    None,
                    Decision::ManualReview,
                    "evaluation timed out before this file was analysed",
                ));
                continue;
            }
            match self
                .evaluate_file(mr, change, &source_rev, target_rev.as_deref(), deadline)
                .await
            {
                Ok(summary) => summaries.push(summary),
                Err(_timeout) => {
                    deadline_hit = true;
                    summaries.push(FileValidationSummary::short_circuit(
                        change.effective_path(),
                        None,
                        Decision::ManualReview,
                        "evaluation timed out while analysing this file",
                    ));
                }
            }
        }

        aggregate_mr(summaries, elapsed_ms(started))
    }

    /// Evaluate a single changed file. Only deadline expiry propagates;
    /// every other failure is folded into the returned summary.
    async fn evaluate_file(
        &self,
        mr: &MergeRequest,
        change: &FileChange,
        source_rev: &str,
        target_rev: Option<&str>,
        deadline: Option<TokioInstant>,
    ) -> Result<FileValidationSummary, FetchError> {
        let path = change.effective_path();

        let Some(file_rule) = self.compiled.match_path(self.config, path) else {
            return Ok(FileValidationSummary::short_circuit(
                path,
                None,
                Decision::ManualReview,
                "unmatched file: no file rule applies",
            ));
        };

        if change.deleted {
            return Ok(default_action_summary(path, file_rule, "file was deleted"));
        }
        if change.renamed && change.diff.trim().is_empty() {
            return Ok(default_action_summary(
                path,
                file_rule,
                "renamed without content changes",
            ));
        }

        let new_content = match self
            .bounded(
                self.fetcher.file_content(mr.project, source_rev, path),
                deadline,
            )
            .await
        {
            Ok(content) => content,
            Err(FetchError::Timeout) => return Err(FetchError::Timeout),
            Err(FetchError::NotFound { .. }) => {
                return Ok(FileValidationSummary::short_circuit(
                    path,
                    Some(file_rule.name.clone()),
                    Decision::ManualReview,
                    "file not found at the source revision",
                ));
            }
            Err(FetchError::Failed(_)) => {
                // Details go to logs, not to reviewers.
                return Ok(FileValidationSummary::short_circuit(
                    path,
                    Some(file_rule.name.clone()),
                    Decision::ManualReview,
                    "could not analyse this file (fetch failed)",
                ));
            }
        };

        if new_content.len() > self.limits.max_file_bytes {
            return Ok(FileValidationSummary::short_circuit(
                path,
                Some(file_rule.name.clone()),
                Decision::ManualReview,
                format!(
                    "file is {} bytes, larger than the {} byte analysis limit",
                    new_content.len(),
                    self.limits.max_file_bytes
                ),
            ));
        }

        let total_lines = new_content.lines().count();
        let attribution = if change.new_file {
            DiffAttribution {
                added: RangeSet::whole_file(total_lines),
                deletions_present: false,
            }
        } else {
            match attribute_diff(&change.diff) {
                Ok(attribution) => attribution,
                Err(err) => {
                    return Ok(FileValidationSummary::short_circuit(
                        path,
                        Some(file_rule.name.clone()),
                        Decision::ManualReview,
                        format!("diff attribution failed: {err}"),
                    ));
                }
            }
        };

        if attribution.added.is_empty() {
            if attribution.deletions_present {
                return Ok(default_action_summary(
                    path,
                    file_rule,
                    "change only removes lines",
                ));
            }
            return Ok(FileValidationSummary::short_circuit(
                path,
                Some(file_rule.name.clone()),
                Decision::Approve,
                "no changed lines",
            ));
        }

        let old_content = match (target_rev, change.new_file) {
            (Some(rev), false) => {
                let old_path = if change.old_path.is_empty() {
                    path
                } else {
                    &change.old_path
                };
                match self
                    .bounded(self.fetcher.file_content(mr.project, rev, old_path), deadline)
                    .await
                {
                    Ok(content) => Some(content),
                    Err(FetchError::Timeout) => return Err(FetchError::Timeout),
                    // Rules degrade to new-content-only when the previous
                    // revision is unavailable.
                    Err(_) => None,
                }
            }
            _ => None,
        };

        Ok(self.evaluate_content(
            path,
            file_rule,
            &new_content,
            old_content.as_deref(),
            attribution.added,
            total_lines,
        ))
    }

    /// The CPU-only tail of file evaluation: parse, resolve sections,
    /// compute coverage, dispatch rules, aggregate.
    fn evaluate_content(
        &self,
        path: &str,
        file_rule: &FileRuleConfig,
        new_content: &str,
        old_content: Option<&str>,
        changed: RangeSet,
        total_lines: usize,
    ) -> FileValidationSummary {
        let tree = match file_rule.parser_type {
            ParserKind::Yaml => parse_document(new_content),
        };
        let tree = match tree {
            Ok(tree) => tree,
            Err(err) => {
                return FileValidationSummary::short_circuit(
                    path,
                    Some(file_rule.name.clone()),
                    Decision::ManualReview,
                    err.to_string(),
                );
            }
        };

        let instances = match resolve_sections(&tree, new_content, &file_rule.sections) {
            Ok(instances) => instances,
            Err(err) => {
                return FileValidationSummary::short_circuit(
                    path,
                    Some(file_rule.name.clone()),
                    Decision::ManualReview,
                    format!("configuration mismatch: {err}"),
                );
            }
        };

        let mut covered = RangeSet::new();
        let mut results: Vec<LineValidationResult> = Vec::new();

        for section in &instances {
            let section_range = RangeSet::from_ranges([section.range]);
            let section_changed = changed.intersect_range(&section.range);
            let rule_names: Vec<&str> = section.definition.enabled_rules().collect();

            if rule_names.is_empty() {
                if section.definition.auto_approve {
                    // A deliberate exemption: the section counts as covered.
                    covered = covered.union(&section_range);
                    if !section_changed.is_empty() {
                        results.push(LineValidationResult {
                            rule: "auto_approve".to_string(),
                            decision: Decision::Approve,
                            reason: format!(
                                "section '{}' is configured to auto-approve",
                                section.definition.name
                            ),
                            covered: section_range.clone(),
                            metadata: None,
                        });
                    }
                } else if !section_changed.is_empty() {
                    results.push(LineValidationResult {
                        rule: "unreviewed_section".to_string(),
                        decision: Decision::ManualReview,
                        reason: format!(
                            "section '{}' changed but has no rules configured",
                            section.definition.name
                        ),
                        covered: RangeSet::new(),
                        metadata: None,
                    });
                }
                continue;
            }

            for rule_name in rule_names {
                let Some(rule) = self.registry.get(rule_name) else {
                    // Startup validation makes this unreachable; stay safe
                    // anyway rather than approving unreviewed lines.
                    results.push(LineValidationResult {
                        rule: rule_name.to_string(),
                        decision: Decision::ManualReview,
                        reason: format!("rule '{rule_name}' is not registered"),
                        covered: RangeSet::new(),
                        metadata: None,
                    });
                    continue;
                };

                let claimed = rule
                    .covered_lines(path, new_content)
                    .intersect_range(&section.range);
                covered = covered.union(&claimed);

                let rule_changed = section_changed.intersect(&claimed);
                if rule_changed.is_empty() {
                    continue;
                }

                let ctx = RuleContext {
                    path,
                    new_content,
                    old_content,
                    changed: &rule_changed,
                    section,
                };
                let mut result = run_rule(rule.as_ref(), &ctx);
                // Claimed ranges must stay inside the section that ran them.
                result.covered = result.covered.intersect_range(&section.range);
                results.push(result);
            }
        }

        aggregate_file(
            path,
            file_rule.name.clone(),
            total_lines,
            &changed,
            covered,
            results,
            file_rule.default_action(),
            self.flags(),
        )
    }

    fn flags(&self) -> StrictnessFlags {
        StrictnessFlags {
            require_full_coverage: self.config.require_full_coverage,
            manual_review_on_uncovered: self.config.manual_review_on_uncovered,
        }
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = FetchResult<T>> + Send,
        deadline: Option<TokioInstant>,
    ) -> FetchResult<T> {
        match deadline {
            None => fut.await,
            Some(deadline) => match tokio::time::timeout_at(deadline, fut).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout),
            },
        }
    }
}

fn default_action_summary(
    path: &str,
    file_rule: &FileRuleConfig,
    what: &str,
) -> FileValidationSummary {
    let (decision, reason) = match file_rule.default_action() {
        DefaultAction::AutoApprove => (Decision::Approve, format!("{what}; default action approves")),
        DefaultAction::ManualReview => (
            Decision::ManualReview,
            format!("{what}; default action requires review"),
        ),
    };
    FileValidationSummary::short_circuit(path, Some(file_rule.name.clone()), decision, reason)
}

fn refusal(started: Instant, reason: String) -> RuleEvaluation {
    RuleEvaluation {
        decision: Decision::ManualReview,
        reason,
        files: Vec::new(),
        approved_files: 0,
        reviewed_files: 0,
        uncovered_files: 0,
        duration_ms: elapsed_ms(started),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
