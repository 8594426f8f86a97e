//! Line-range arithmetic on 1-based inclusive intervals.
//!
//! All coverage accounting in the engine is exact integer arithmetic on
//! [`LineRange`] values. [`RangeSet`] is the canonical form of a set of
//! ranges: sorted, pairwise disjoint, and non-abutting, so that equality
//! of sets is equality of their representations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A closed interval `[start, end]` of 1-based line numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    /// Create a range. `start` must be at least 1 and `end` at least `start`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start >= 1, "line numbers are 1-based");
        assert!(end >= start, "range end must not precede start");
        Self { start, end }
    }

    /// Single-line range.
    pub fn single(line: usize) -> Self {
        Self::new(line, line)
    }

    /// Number of lines in the range.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, line: usize) -> bool {
        line >= self.start && line <= self.end
    }

    /// Intersection with another range, if non-empty.
    pub fn intersect(&self, other: &LineRange) -> Option<LineRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start <= end {
            Some(LineRange { start, end })
        } else {
            None
        }
    }

    /// Whether the two ranges overlap or touch (`[1,3]` abuts `[4,5]`).
    fn mergeable(&self, other: &LineRange) -> bool {
        self.start.max(other.start) <= self.end.min(other.end).saturating_add(1)
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.start, self.end)
    }
}

/// A canonical set of line ranges: sorted, disjoint, non-abutting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RangeSet {
    ranges: Vec<LineRange>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a canonical set from arbitrary ranges.
    pub fn from_ranges(ranges: impl IntoIterator<Item = LineRange>) -> Self {
        let mut ranges: Vec<LineRange> = ranges.into_iter().collect();
        ranges.sort();
        let mut canonical: Vec<LineRange> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match canonical.last_mut() {
                Some(last) if last.mergeable(&range) => {
                    last.end = last.end.max(range.end);
                }
                _ => canonical.push(range),
            }
        }
        Self { ranges: canonical }
    }

    /// The whole-file set `[1, total_lines]`, or empty for an empty file.
    pub fn whole_file(total_lines: usize) -> Self {
        if total_lines == 0 {
            Self::new()
        } else {
            Self::from_ranges([LineRange::new(1, total_lines)])
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LineRange> {
        self.ranges.iter()
    }

    /// Total number of lines covered by the set.
    pub fn total_lines(&self) -> usize {
        self.ranges.iter().map(LineRange::len).sum()
    }

    pub fn contains_line(&self, line: usize) -> bool {
        self.ranges.iter().any(|r| r.contains(line))
    }

    /// Union of two canonical sets; commutative and associative.
    pub fn union(&self, other: &RangeSet) -> RangeSet {
        RangeSet::from_ranges(self.ranges.iter().chain(other.ranges.iter()).copied())
    }

    /// Intersection of two canonical sets.
    pub fn intersect(&self, other: &RangeSet) -> RangeSet {
        let mut out = Vec::new();
        for a in &self.ranges {
            for b in &other.ranges {
                if let Some(r) = a.intersect(b) {
                    out.push(r);
                }
            }
        }
        RangeSet::from_ranges(out)
    }

    /// Intersection with a single range.
    pub fn intersect_range(&self, range: &LineRange) -> RangeSet {
        RangeSet::from_ranges(self.ranges.iter().filter_map(|r| r.intersect(range)))
    }

    /// Lines in `self` that are not in `other`.
    pub fn subtract(&self, other: &RangeSet) -> RangeSet {
        let mut out = Vec::new();
        for range in &self.ranges {
            let mut cursor = range.start;
            for hole in &other.ranges {
                if hole.end < cursor {
                    continue;
                }
                if hole.start > range.end {
                    break;
                }
                if hole.start > cursor {
                    out.push(LineRange::new(cursor, hole.start - 1));
                }
                cursor = hole.end.saturating_add(1);
                if cursor > range.end {
                    break;
                }
            }
            if cursor <= range.end {
                out.push(LineRange::new(cursor, range.end));
            }
        }
        RangeSet::from_ranges(out)
    }

    /// Whether every line of `other` is contained in `self`.
    pub fn covers(&self, other: &RangeSet) -> bool {
        other.subtract(self).is_empty()
    }
}

impl fmt::Display for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for range in &self.ranges {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{range}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromIterator<LineRange> for RangeSet {
    fn from_iter<T: IntoIterator<Item = LineRange>>(iter: T) -> Self {
        Self::from_ranges(iter)
    }
}
