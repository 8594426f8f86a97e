//! Unified-diff attribution: which lines of the new file did a hunk touch.
//!
//! The attributor walks hunk headers and bodies and collapses added lines
//! into canonical [`RangeSet`] form. Context and removed lines never
//! produce ranges in the new file; pure removals are recorded through the
//! `deletions_present` flag so the aggregator can apply the file-type's
//! default action to deletion-only changes.

use thiserror::Error;

use crate::lines::{LineRange, RangeSet};

/// Result of attributing one file's unified diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffAttribution {
    /// Lines of the new file that were added or modified.
    pub added: RangeSet,
    /// Whether any hunk removed lines from the old file.
    pub deletions_present: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiffError {
    #[error("binary diff cannot be attributed to lines")]
    Binary,

    #[error("malformed hunk header at diff line {line}: {text}")]
    MalformedHunk { line: usize, text: String },

    #[error("unexpected content at diff line {line}")]
    UnexpectedLine { line: usize },
}

/// Parse a unified diff and return the attribution for the new file.
///
/// An empty diff yields an empty attribution; the caller decides what an
/// empty change means (rename-only, empty MR, ...).
pub fn attribute_diff(diff: &str) -> Result<DiffAttribution, DiffError> {
    let mut added: Vec<LineRange> = Vec::new();
    let mut deletions_present = false;

    // Remaining line budget of the current hunk, per the header counts.
    let mut old_remaining = 0usize;
    let mut new_remaining = 0usize;
    let mut new_cursor = 0usize;
    let mut run_start: Option<usize> = None;

    for (idx, line) in diff.lines().enumerate() {
        let line_no = idx + 1;

        if line.starts_with("Binary files ") || line.starts_with("GIT binary patch") {
            return Err(DiffError::Binary);
        }

        if let Some(header) = line.strip_prefix("@@") {
            let (new_start, new_len, old_len) =
                parse_hunk_header(header).ok_or_else(|| DiffError::MalformedHunk {
                    line: line_no,
                    text: line.to_string(),
                })?;
            flush_run(&mut run_start, new_cursor, &mut added);
            new_cursor = new_start;
            new_remaining = new_len;
            old_remaining = old_len;
            continue;
        }

        let in_hunk = old_remaining > 0 || new_remaining > 0;
        if !in_hunk {
            // File headers, mode lines, and similar prose between hunks.
            continue;
        }

        match line.as_bytes().first() {
            Some(b'+') => {
                if new_remaining == 0 {
                    return Err(DiffError::UnexpectedLine { line: line_no });
                }
                if run_start.is_none() {
                    run_start = Some(new_cursor);
                }
                new_cursor += 1;
                new_remaining -= 1;
            }
            Some(b'-') => {
                if old_remaining == 0 {
                    return Err(DiffError::UnexpectedLine { line: line_no });
                }
                deletions_present = true;
                flush_run(&mut run_start, new_cursor, &mut added);
                old_remaining -= 1;
            }
            Some(b' ') | None => {
                if old_remaining == 0 || new_remaining == 0 {
                    return Err(DiffError::UnexpectedLine { line: line_no });
                }
                flush_run(&mut run_start, new_cursor, &mut added);
                new_cursor += 1;
                new_remaining -= 1;
                old_remaining -= 1;
            }
            Some(b'\\') => {
                // "\ No newline at end of file" — annotation, not content.
            }
            Some(_) => return Err(DiffError::UnexpectedLine { line: line_no }),
        }
    }

    flush_run(&mut run_start, new_cursor, &mut added);
    Ok(DiffAttribution {
        added: RangeSet::from_ranges(added),
        deletions_present,
    })
}

fn flush_run(run_start: &mut Option<usize>, new_cursor: usize, added: &mut Vec<LineRange>) {
    if let Some(start) = run_start.take() {
        added.push(LineRange::new(start, new_cursor - 1));
    }
}

/// Parse the `-a,b +c,d` part of a hunk header.
///
/// Returns `(new_start, new_len, old_len)`. Omitted lengths default to 1;
/// a zero-length new side (pure deletion) positions the cursor after the
/// preceding line, which never produces ranges because no `+` lines follow.
fn parse_hunk_header(header: &str) -> Option<(usize, usize, usize)> {
    let header = header.trim_start();
    let mut parts = header.split_whitespace();

    let old = parts.next()?.strip_prefix('-')?;
    let new = parts.next()?.strip_prefix('+')?;

    let (_, old_len) = parse_span(old)?;
    let (new_start, new_len) = parse_span(new)?;

    // A zero new-start only appears with a zero length.
    if new_start == 0 && new_len != 0 {
        return None;
    }
    Some((new_start.max(1), new_len, old_len))
}

fn parse_span(span: &str) -> Option<(usize, usize)> {
    match span.split_once(',') {
        Some((start, len)) => Some((start.parse().ok()?, len.parse().ok()?)),
        None => Some((span.parse().ok()?, 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(attribution: &DiffAttribution) -> Vec<(usize, usize)> {
        attribution.added.iter().map(|r| (r.start, r.end)).collect()
    }

    #[test]
    fn empty_diff_has_no_attribution() {
        let attribution = attribute_diff("").unwrap();
        assert!(attribution.added.is_empty());
        assert!(!attribution.deletions_present);
    }

    #[test]
    fn single_modified_line() {
        let diff = "@@ -1,3 +1,3 @@\n warehouses:\n-    size: LARGE\n+    size: MEDIUM\n   - type: user\n";
        let attribution = attribute_diff(diff).unwrap();
        assert_eq!(ranges(&attribution), vec![(2, 2)]);
        assert!(attribution.deletions_present);
    }

    #[test]
    fn consecutive_additions_collapse_into_one_range() {
        let diff = "@@ -1,2 +1,5 @@\n a\n+b\n+c\n+d\n e\n";
        let attribution = attribute_diff(diff).unwrap();
        assert_eq!(ranges(&attribution), vec![(2, 4)]);
        assert!(!attribution.deletions_present);
    }

    #[test]
    fn multiple_hunks_merge_into_canonical_set() {
        let diff = "@@ -1,2 +1,3 @@\n a\n+new\n b\n@@ -10,2 +11,3 @@\n j\n+tail\n k\n";
        let attribution = attribute_diff(diff).unwrap();
        assert_eq!(ranges(&attribution), vec![(2, 2), (12, 12)]);
    }

    #[test]
    fn pure_deletion_sets_flag_without_ranges() {
        let diff = "@@ -3,2 +2,0 @@\n-gone\n-also gone\n";
        let attribution = attribute_diff(diff).unwrap();
        assert!(attribution.added.is_empty());
        assert!(attribution.deletions_present);
    }

    #[test]
    fn file_headers_are_ignored() {
        let diff = "--- a/product.yaml\n+++ b/product.yaml\n@@ -1,1 +1,2 @@\n a\n+b\n";
        let attribution = attribute_diff(diff).unwrap();
        assert_eq!(ranges(&attribution), vec![(2, 2)]);
    }

    #[test]
    fn no_newline_marker_is_ignored() {
        let diff = "@@ -1,1 +1,1 @@\n-a\n+b\n\\ No newline at end of file\n";
        let attribution = attribute_diff(diff).unwrap();
        assert_eq!(ranges(&attribution), vec![(1, 1)]);
    }

    #[test]
    fn omitted_lengths_default_to_one() {
        let diff = "@@ -4 +4 @@\n-x\n+y\n";
        let attribution = attribute_diff(diff).unwrap();
        assert_eq!(ranges(&attribution), vec![(4, 4)]);
    }

    #[test]
    fn binary_diff_is_an_error() {
        let diff = "Binary files a/logo.png and b/logo.png differ\n";
        assert_eq!(attribute_diff(diff), Err(DiffError::Binary));
    }

    #[test]
    fn malformed_header_is_an_error() {
        let err = attribute_diff("@@ not a header @@\n").unwrap_err();
        assert!(matches!(err, DiffError::MalformedHunk { line: 1, .. }));
    }

    #[test]
    fn surplus_body_line_is_an_error() {
        let diff = "@@ -1,1 +1,1 @@\n-a\n+b\n+c\n";
        let err = attribute_diff(diff).unwrap_err();
        assert!(matches!(err, DiffError::UnexpectedLine { line: 4 }));
    }

    #[test]
    fn new_file_hunk_counts_from_line_one() {
        let diff = "@@ -0,0 +1,3 @@\n+a\n+b\n+c\n";
        let attribution = attribute_diff(diff).unwrap();
        assert_eq!(ranges(&attribution), vec![(1, 3)]);
        assert!(!attribution.deletions_present);
    }
}
