//! File-rule matching: map a changed path to at most one file rule.
//!
//! Globs are compiled once when the engine is built, not per file. The
//! directory pattern and the filename pattern must both match; the first
//! enabled rule in declaration order wins. Only the filename extension is
//! matched case-insensitively, so `product.YAML` still hits
//! `product.{yaml,yml}` while the stem comparison stays exact.

use globset::{Glob, GlobBuilder, GlobMatcher};

use crate::config::{FileRuleConfig, RuleConfig};
use crate::error::ConfigError;

/// Matcher for the directory part of a path.
///
/// `**/` (match anywhere) is common enough to special-case: it must accept
/// the empty directory of top-level files, which a compiled glob will not.
#[derive(Debug)]
enum DirMatcher {
    Any,
    Glob(GlobMatcher),
}

impl DirMatcher {
    fn is_match(&self, dir: &str) -> bool {
        match self {
            DirMatcher::Any => true,
            DirMatcher::Glob(glob) => glob.is_match(dir),
        }
    }
}

/// Matcher for the basename of a path.
///
/// Patterns with an extension part are split at the last top-level dot:
/// the stem matches case-sensitively, the extension case-insensitively.
/// Patterns without one match the whole basename case-sensitively.
#[derive(Debug)]
enum FilenameMatcher {
    Whole(GlobMatcher),
    Split {
        /// `None` for dotfile patterns like `.gitignore`: the candidate's
        /// stem must be empty.
        stem: Option<GlobMatcher>,
        ext: GlobMatcher,
    },
}

impl FilenameMatcher {
    fn is_match(&self, filename: &str) -> bool {
        match self {
            FilenameMatcher::Whole(glob) => glob.is_match(filename),
            FilenameMatcher::Split { stem, ext } => {
                let Some((candidate_stem, candidate_ext)) = filename.rsplit_once('.') else {
                    return false;
                };
                let stem_ok = match stem {
                    Some(glob) => glob.is_match(candidate_stem),
                    None => candidate_stem.is_empty(),
                };
                stem_ok && ext.is_match(candidate_ext)
            }
        }
    }
}

#[derive(Debug)]
struct CompiledFileRule {
    index: usize,
    dir: DirMatcher,
    file: FilenameMatcher,
}

/// Pre-compiled matchers for every enabled file rule of a [`RuleConfig`].
#[derive(Debug)]
pub struct CompiledRuleSet {
    entries: Vec<CompiledFileRule>,
}

impl CompiledRuleSet {
    pub fn compile(config: &RuleConfig) -> Result<Self, ConfigError> {
        let mut entries = Vec::new();
        for (index, file_rule) in config.files.iter().enumerate() {
            if !file_rule.enabled {
                continue;
            }
            entries.push(CompiledFileRule {
                index,
                dir: compile_dir_glob(&file_rule.name, &file_rule.path)?,
                file: compile_filename_glob(&file_rule.name, &file_rule.filename)?,
            });
        }
        Ok(Self { entries })
    }

    /// Return the first enabled file rule matching `path`, if any.
    ///
    /// "No match" is a normal return; the engine records such files as
    /// unmatched rather than erroring.
    pub fn match_path<'a>(&self, config: &'a RuleConfig, path: &str) -> Option<&'a FileRuleConfig> {
        let (dir, filename) = split_path(path);
        self.entries
            .iter()
            .find(|entry| entry.dir.is_match(dir) && entry.file.is_match(filename))
            .map(|entry| &config.files[entry.index])
    }
}

fn compile_dir_glob(rule: &str, pattern: &str) -> Result<DirMatcher, ConfigError> {
    // Directory patterns are written with a trailing slash (`**/`,
    // `dataproducts/**/`); the candidate has none.
    let normalized = pattern.trim_end_matches('/');
    if normalized.is_empty() || normalized == "**" {
        return Ok(DirMatcher::Any);
    }
    // `dir/**` must also accept `dir` itself: files directly inside the
    // directory have no further components.
    let expanded = match normalized.strip_suffix("/**") {
        Some(base) if !base.contains('{') => format!("{{{base},{normalized}}}"),
        _ => normalized.to_string(),
    };
    build_glob(rule, pattern, &expanded, false).map(DirMatcher::Glob)
}

fn compile_filename_glob(rule: &str, pattern: &str) -> Result<FilenameMatcher, ConfigError> {
    match split_extension(pattern) {
        Some((stem, ext)) => {
            let stem = if stem.is_empty() {
                None
            } else {
                Some(build_glob(rule, pattern, stem, false)?)
            };
            Ok(FilenameMatcher::Split {
                stem,
                ext: build_glob(rule, pattern, ext, true)?,
            })
        }
        None => build_glob(rule, pattern, pattern, false).map(FilenameMatcher::Whole),
    }
}

/// Split a filename pattern at its last dot outside brace alternates, so
/// `product.{yaml,yml}` becomes `product` + `{yaml,yml}` while the dots
/// inside an alternate never count as extension separators.
fn split_extension(pattern: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    let mut split = None;
    for (i, b) in pattern.bytes().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b'.' if depth == 0 => split = Some(i),
            _ => {}
        }
    }
    split.map(|i| (&pattern[..i], &pattern[i + 1..]))
}

fn build_glob(
    rule: &str,
    original: &str,
    pattern: &str,
    case_insensitive: bool,
) -> Result<GlobMatcher, ConfigError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .case_insensitive(case_insensitive)
        .build()
        .map(|glob: Glob| glob.compile_matcher())
        .map_err(|e| ConfigError::InvalidGlob {
            file_rule: rule.to_string(),
            pattern: original.to_string(),
            message: e.to_string(),
        })
}

/// Split a repository path into its directory part and basename.
fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((dir, file)) => (dir, file),
        None => ("", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DefaultAction, FileRuleConfig, RuleConfig};

    fn file_rule(name: &str, path: &str, filename: &str, enabled: bool) -> FileRuleConfig {
        FileRuleConfig {
            name: name.to_string(),
            path: path.to_string(),
            filename: filename.to_string(),
            parser_type: crate::config::ParserKind::Yaml,
            enabled,
            default_action: Some(DefaultAction::ManualReview),
            sections: Vec::new(),
        }
    }

    fn config(files: Vec<FileRuleConfig>) -> (RuleConfig, CompiledRuleSet) {
        let config = RuleConfig {
            enabled: true,
            require_full_coverage: false,
            manual_review_on_uncovered: false,
            files,
        };
        let compiled = CompiledRuleSet::compile(&config).unwrap();
        (config, compiled)
    }

    #[test]
    fn matches_directory_and_filename_globs() {
        let (config, compiled) = config(vec![file_rule(
            "product",
            "**/",
            "product.{yaml,yml}",
            true,
        )]);
        let hit = compiled.match_path(&config, "dataproducts/agg/foo/prod/product.yaml");
        assert_eq!(hit.map(|r| r.name.as_str()), Some("product"));
        assert!(compiled.match_path(&config, "dataproducts/readme.md").is_none());
    }

    #[test]
    fn brace_alternation_covers_both_extensions() {
        let (config, compiled) = config(vec![file_rule("product", "**/", "product.{yaml,yml}", true)]);
        assert!(compiled.match_path(&config, "a/product.yml").is_some());
        assert!(compiled.match_path(&config, "a/product.yaml").is_some());
        assert!(compiled.match_path(&config, "a/product.json").is_none());
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let (config, compiled) = config(vec![file_rule("product", "**/", "product.{yaml,yml}", true)]);
        assert!(compiled.match_path(&config, "a/product.YAML").is_some());
        assert!(compiled.match_path(&config, "a/product.Yml").is_some());
    }

    #[test]
    fn stem_match_stays_case_sensitive() {
        let (config, compiled) = config(vec![file_rule("product", "**/", "product.{yaml,yml}", true)]);
        assert!(compiled.match_path(&config, "a/Product.yaml").is_none());
        assert!(compiled.match_path(&config, "a/PRODUCT.YAML").is_none());
    }

    #[test]
    fn extensionless_pattern_matches_whole_basename_exactly() {
        let (config, compiled) = config(vec![file_rule("docker", "**/", "Dockerfile", true)]);
        assert!(compiled.match_path(&config, "svc/Dockerfile").is_some());
        assert!(compiled.match_path(&config, "svc/dockerfile").is_none());
        assert!(compiled.match_path(&config, "svc/Dockerfile.dev").is_none());
    }

    #[test]
    fn dotfile_pattern_requires_empty_stem() {
        let (config, compiled) = config(vec![file_rule("ignore", "**/", ".gitignore", true)]);
        assert!(compiled.match_path(&config, "a/.gitignore").is_some());
        assert!(compiled.match_path(&config, "a/sub.gitignore").is_none());
    }

    #[test]
    fn top_level_file_matches_catch_all_directory() {
        let (config, compiled) = config(vec![file_rule("product", "**/", "product.yaml", true)]);
        assert!(compiled.match_path(&config, "product.yaml").is_some());
    }

    #[test]
    fn scoped_directory_glob_excludes_other_trees() {
        let (config, compiled) = config(vec![file_rule(
            "product",
            "dataproducts/**/",
            "product.yaml",
            true,
        )]);
        assert!(
            compiled
                .match_path(&config, "dataproducts/agg/prod/product.yaml")
                .is_some()
        );
        assert!(compiled.match_path(&config, "services/product.yaml").is_none());
    }

    #[test]
    fn first_declared_match_wins() {
        let (config, compiled) = config(vec![
            file_rule("first", "**/", "product.yaml", true),
            file_rule("second", "**/", "*.yaml", true),
        ]);
        let hit = compiled.match_path(&config, "x/product.yaml");
        assert_eq!(hit.map(|r| r.name.as_str()), Some("first"));
        let other = compiled.match_path(&config, "x/other.yaml");
        assert_eq!(other.map(|r| r.name.as_str()), Some("second"));
    }

    #[test]
    fn disabled_rules_never_match() {
        let (config, compiled) = config(vec![
            file_rule("off", "**/", "product.yaml", false),
            file_rule("on", "**/", "*.yaml", true),
        ]);
        let hit = compiled.match_path(&config, "x/product.yaml");
        assert_eq!(hit.map(|r| r.name.as_str()), Some("on"));
    }

    #[test]
    fn invalid_glob_is_a_config_error() {
        let config = RuleConfig {
            enabled: true,
            require_full_coverage: false,
            manual_review_on_uncovered: false,
            files: vec![file_rule("bad", "**/", "product.{yaml", true)],
        };
        let err = CompiledRuleSet::compile(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGlob { .. }));
    }
}
