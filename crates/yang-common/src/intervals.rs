//! Range/length interval parsing and subset composition.
//!
//! YANG `range` and `length` restrictions share one grammar:
//! `part ("|" part)*` where `part` is `bound` or `bound ".." bound`, and a
//! bound is `"min"`, `"max"`, or a decimal literal. This module parses that
//! grammar into a sorted, non-overlapping `IntervalSet` over `i128` (wide
//! enough to hold both `int64::MIN` and `uint64::MAX`) and checks the
//! subset relation the type compiler needs when composing a derived type's
//! restriction against its base.

use std::fmt;

/// A closed interval `[min, max]`. `min`/`max` keywords resolve to the
/// domain's bounds before an `Interval` is constructed, so by the time one
/// exists it is always a concrete numeric range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval {
    pub min: i128,
    pub max: i128,
}

impl Interval {
    pub const fn new(min: i128, max: i128) -> Self {
        Interval { min, max }
    }

    pub const fn point(value: i128) -> Self {
        Interval { min: value, max: value }
    }

    fn is_subset_of(&self, other: &Interval) -> bool {
        self.min >= other.min && self.max <= other.max
    }

    fn overlaps_or_touches(&self, other: &Interval) -> bool {
        self.min <= other.max.saturating_add(1) && other.min <= self.max.saturating_add(1)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}..{}", self.min, self.max)
        }
    }
}

/// A union of intervals, kept sorted and coalesced (touching/overlapping
/// intervals merge) so subset checks are a simple linear scan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

/// Error parsing a `range`/`length` restriction string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntervalParseError(pub String);

impl fmt::Display for IntervalParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid range/length expression: {}", self.0)
    }
}

impl IntervalSet {
    pub fn single(interval: Interval) -> Self {
        IntervalSet { intervals: vec![interval] }
    }

    pub fn from_sorted(intervals: Vec<Interval>) -> Self {
        let mut set = IntervalSet { intervals };
        set.normalize();
        set
    }

    /// Parse `"2..10|15"`-style text against a domain `[domain_min,
    /// domain_max]` used to resolve bare `min`/`max` keywords.
    pub fn parse(text: &str, domain_min: i128, domain_max: i128) -> Result<Self, IntervalParseError> {
        let mut intervals = Vec::new();
        for part in text.split('|') {
            let part = part.trim();
            if part.is_empty() {
                return Err(IntervalParseError(text.to_string()));
            }
            let interval = if let Some((lo, hi)) = part.split_once("..") {
                let lo = parse_bound(lo.trim(), domain_min, domain_max)?;
                let hi = parse_bound(hi.trim(), domain_min, domain_max)?;
                if lo > hi {
                    return Err(IntervalParseError(format!("{lo}..{hi} has min > max")));
                }
                Interval::new(lo, hi)
            } else {
                let value = parse_bound(part, domain_min, domain_max)?;
                Interval::point(value)
            };
            intervals.push(interval);
        }
        intervals.sort_by_key(|i| i.min);
        for pair in intervals.windows(2) {
            if pair[0].max >= pair[1].min {
                return Err(IntervalParseError(format!(
                    "overlapping parts {} and {}",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(IntervalSet { intervals })
    }

    fn normalize(&mut self) {
        self.intervals.sort_by_key(|i| i.min);
        let mut merged: Vec<Interval> = Vec::with_capacity(self.intervals.len());
        for interval in self.intervals.drain(..) {
            if let Some(last) = merged.last_mut() {
                if last.overlaps_or_touches(&interval) {
                    last.max = last.max.max(interval.max);
                    continue;
                }
            }
            merged.push(interval);
        }
        self.intervals = merged;
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn contains(&self, value: i128) -> bool {
        self.intervals.iter().any(|i| value >= i.min && value <= i.max)
    }

    /// Child restrictions must form a subset of parent restrictions.
    /// Every interval of `self` must be wholly contained in some interval
    /// of `parent` (parent intervals never overlap, so containment in the
    /// union reduces to: no point of `self` falls in a gap of `parent`).
    pub fn is_subset_of(&self, parent: &IntervalSet) -> bool {
        self.intervals.iter().all(|child| {
            parent.intervals.iter().any(|p| child.is_subset_of(p))
        })
    }

    pub fn lower_bound(&self) -> Option<i128> {
        self.intervals.first().map(|i| i.min)
    }

    pub fn upper_bound(&self) -> Option<i128> {
        self.intervals.last().map(|i| i.max)
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.intervals.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join("|"))
    }
}

fn parse_bound(text: &str, domain_min: i128, domain_max: i128) -> Result<i128, IntervalParseError> {
    match text {
        "min" => Ok(domain_min),
        "max" => Ok(domain_max),
        _ => text
            .parse::<i128>()
            .map_err(|_| IntervalParseError(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_union_of_ranges() {
        let set = IntervalSet::parse("2..10|15", -100, 100).unwrap();
        assert_eq!(set.intervals(), &[Interval::new(2, 10), Interval::point(15)]);
    }

    #[test]
    fn resolves_min_max_keywords() {
        let set = IntervalSet::parse("min..max", -5, 5).unwrap();
        assert_eq!(set.intervals(), &[Interval::new(-5, 5)]);
    }

    #[test]
    fn subset_check_s1_scenario() {
        // Typedef T = int32 { range "-100..100" }
        let parent = IntervalSet::parse("-100..100", i32::MIN as i128, i32::MAX as i128).unwrap();
        // leaf x : T { range "-25..50|100..200" } must NOT be a subset.
        let child = IntervalSet::parse("-25..50|100..200", i32::MIN as i128, i32::MAX as i128).unwrap();
        assert!(!child.is_subset_of(&parent));

        // Widening the parent to -200..200 makes it a subset.
        let wider_parent = IntervalSet::parse("-200..200", i32::MIN as i128, i32::MAX as i128).unwrap();
        assert!(child.is_subset_of(&wider_parent));
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(IntervalSet::parse("10..5", -100, 100).is_err());
    }

    #[test]
    fn rejects_overlapping_parts() {
        assert!(IntervalSet::parse("1..5|3..8", -100, 100).is_err());
    }

    #[test]
    fn leaflist_bounds_s3_scenario() {
        // min-elements 3; max-elements 5 is a valid interval.
        let ok = Interval::new(3, 5);
        assert!(ok.min <= ok.max);
        // min-elements 6; max-elements 5 is not.
        let bad = Interval::new(6, 5);
        assert!(bad.min > bad.max);
    }
}
