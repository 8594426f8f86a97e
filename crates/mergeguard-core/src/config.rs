//! The declarative rules document.
//!
//! Loaded once at process start and immutable afterwards; evaluations
//! share a read-only reference. Startup validation is strict — a config
//! the engine cannot honour completely means the process refuses to
//! serve, so misconfiguration can never silently weaken review.

use std::collections::HashSet;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::registry::RuleRegistry;

/// What happens to changed lines no enabled rule claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DefaultAction {
    ManualReview,
    AutoApprove,
}

/// Identifier of the structured-text parser used for a file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParserKind {
    /// Indentation tree with per-node line provenance.
    Yaml,
}

/// Reference to a registered rule from a section.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SectionRuleRef {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// A named, path-addressed region of a structured document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SectionDefinition {
    /// Unique within its file rule.
    pub name: String,
    /// Dotted path into the document, or `.` for the whole file.
    pub yaml_path: String,
    /// When set, a document where the path does not resolve fails review.
    #[serde(default)]
    pub required: bool,
    /// Approve the section when no enabled rule matches it.
    #[serde(default)]
    pub auto_approve: bool,
    #[serde(default)]
    pub rule_configs: Vec<SectionRuleRef>,
    #[serde(default)]
    pub description: String,
}

impl SectionDefinition {
    /// Names of the enabled rules, in declared order.
    pub fn enabled_rules(&self) -> impl Iterator<Item = &str> {
        self.rule_configs
            .iter()
            .filter(|r| r.enabled)
            .map(|r| r.name.as_str())
    }
}

/// Configuration for one file type.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileRuleConfig {
    pub name: String,
    /// Directory glob, e.g. `**/` or `dataproducts/**/`.
    pub path: String,
    /// Filename glob, e.g. `product.{yaml,yml}`.
    pub filename: String,
    pub parser_type: ParserKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Required when `sections` is empty; defaults to manual review for
    /// uncovered lines otherwise.
    #[serde(default)]
    pub default_action: Option<DefaultAction>,
    #[serde(default)]
    pub sections: Vec<SectionDefinition>,
}

impl FileRuleConfig {
    pub fn default_action(&self) -> DefaultAction {
        self.default_action.unwrap_or(DefaultAction::ManualReview)
    }
}

/// The top-level rules document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RuleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Unmatched and exempted files still force manual review.
    #[serde(default)]
    pub require_full_coverage: bool,
    /// Uncovered changed lines force manual review even under an
    /// `auto_approve` default action.
    #[serde(default)]
    pub manual_review_on_uncovered: bool,
    #[serde(default)]
    pub files: Vec<FileRuleConfig>,
}

fn default_true() -> bool {
    true
}

impl RuleConfig {
    /// Parse the YAML rules document.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load and parse the rules document from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Validate the document against the rule registry.
    ///
    /// Returns the first violation found. Must be called at startup;
    /// a rule name missing from the registry is a refuse-to-serve error,
    /// never a request-time one.
    pub fn validate(&self, registry: &RuleRegistry) -> Result<(), ConfigError> {
        let mut file_names: HashSet<&str> = HashSet::new();
        let mut globs: Vec<(&str, &str, &str)> = Vec::new();

        for file_rule in &self.files {
            if !file_names.insert(&file_rule.name) {
                return Err(ConfigError::DuplicateFileRule {
                    name: file_rule.name.clone(),
                });
            }

            if file_rule.sections.is_empty() && file_rule.default_action.is_none() {
                return Err(ConfigError::MissingDefaultAction {
                    name: file_rule.name.clone(),
                });
            }

            if file_rule.enabled {
                if let Some((first, _, _)) = globs
                    .iter()
                    .find(|(_, p, f)| *p == file_rule.path && *f == file_rule.filename)
                {
                    return Err(ConfigError::ShadowedFileRule {
                        first: first.to_string(),
                        second: file_rule.name.clone(),
                    });
                }
                globs.push((&file_rule.name, &file_rule.path, &file_rule.filename));
            }

            let mut section_names: HashSet<&str> = HashSet::new();
            for section in &file_rule.sections {
                if !section_names.insert(&section.name) {
                    return Err(ConfigError::DuplicateSection {
                        file_rule: file_rule.name.clone(),
                        section: section.name.clone(),
                    });
                }
                for rule_ref in &section.rule_configs {
                    if registry.get(&rule_ref.name).is_none() {
                        return Err(ConfigError::UnknownRule {
                            file_rule: file_rule.name.clone(),
                            section: section.name.clone(),
                            rule: rule_ref.name.clone(),
                        });
                    }
                }
            }
        }

        // Glob syntax is validated by compiling the matcher set.
        crate::matcher::CompiledRuleSet::compile(self).map(|_| ())
    }
}

/// Generate the JSON schema for the rules document.
pub fn generate_schema() -> String {
    let schema = schemars::schema_for!(RuleConfig);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
