//! # mergeguard-core
//!
//! Rule engine core for merge-request auto-review.
//!
//! Given the changed files of a merge request, the engine:
//! - matches each file to at most one configured file rule,
//! - parses the new content into a line-addressed document tree,
//! - resolves configured sections to exact line ranges,
//! - attributes the unified diff to changed line ranges,
//! - dispatches the configured rules over the changed lines, and
//! - aggregates per-line verdicts into file and MR decisions under the
//!   coverage and unanimity invariants: every changed line must be claimed
//!   by an enabled rule, and one `manual_review` anywhere taints the MR.
//!
//! The engine talks to the hosting platform only through the
//! [`ChangeFetcher`] facade; everything else is pure computation. One MR
//! evaluation is an independent, stateless computation — configuration
//! and the rule registry are built once at startup and shared read-only.

/// Declarative rules document: parsing, validation, schema generation.
pub mod config;
/// Unified-diff attribution to new-file line ranges.
pub mod diff;
/// Structured-document parsing with line provenance.
pub mod document;
/// Per-MR evaluation orchestration.
pub mod engine;
/// Error taxonomy: startup config errors and fetch failures.
pub mod error;
/// Change-set fetcher facade and in-memory mock.
pub mod fetch;
/// Line-range algebra on 1-based inclusive intervals.
pub mod lines;
mod matcher;
/// Rule registry.
pub mod registry;
/// The rule contract.
pub mod rules;
/// Section resolution against concrete files.
pub mod sections;
/// Decision types and the coverage-enforcing aggregator.
pub mod verdict;

pub use config::{
    DefaultAction, FileRuleConfig, ParserKind, RuleConfig, SectionDefinition, SectionRuleRef,
    generate_schema,
};
pub use diff::{DiffAttribution, DiffError, attribute_diff};
pub use document::{DocumentError, DocumentTree, parse_document};
pub use engine::{Engine, EngineLimits, MergeRequest};
pub use error::{ConfigError, FetchError, FetchResult};
pub use fetch::{ChangeFetcher, FileChange, MockFetcher, ReviewActions};
pub use lines::{LineRange, RangeSet};
pub use registry::{RuleRegistry, RuleRegistryBuilder};
pub use rules::{Rule, RuleContext, run_rule};
pub use sections::{SectionError, SectionInstance};
pub use verdict::{
    Decision, FileValidationSummary, LineValidationResult, RuleEvaluation, StrictnessFlags,
};
