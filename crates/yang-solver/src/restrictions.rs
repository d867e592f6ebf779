//! Restriction records and their composition rules.
//!
//! A `Restriction` holds every restriction kind that might apply to a single
//! compiled type. Most base types only ever populate one or two of these
//! fields (a `string` carries `length`/`patterns`; an `enumeration` carries
//! `enum_values`), but keeping them on one struct rather than a
//! kind-specific enum lets `compose` merge a derived type's restrictions
//! into its base's in one pass regardless of base type.

use yang_binder::ModuleId;
use yang_common::{Atom, Diagnostic, DiagnosticKind, IntervalSet};

use crate::types::TypeId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternRestriction {
    pub pattern: String,
    /// `modifier "invert-match"` (YANG 1.1, RFC 7950 §9.4.6).
    pub inverted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnumValue {
    pub name: Atom,
    pub value: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitValue {
    pub name: Atom,
    pub position: u32,
}

/// `type leafref { path ...; require-instance ...; }`. The path itself is
/// resolved lazily by `yang-checker`'s final validation pass; the
/// solver only records the parsed path text and the flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafrefRestriction {
    pub path_text: String,
    pub require_instance: bool,
}

/// The full set of restrictions that may narrow a base type, accumulated
/// along a typedef chain via `compose`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Restriction {
    pub range: Option<IntervalSet>,
    pub length: Option<IntervalSet>,
    pub patterns: Vec<PatternRestriction>,
    pub enum_values: Option<Vec<EnumValue>>,
    pub bit_values: Option<Vec<BitValue>>,
    pub fraction_digits: Option<u8>,
    pub leafref: Option<LeafrefRestriction>,
    pub identity_bases: Option<Vec<(ModuleId, Atom)>>,
    pub require_instance: Option<bool>,
    pub union_members: Option<Vec<TypeId>>,
}

impl Restriction {
    pub fn is_empty(&self) -> bool {
        *self == Restriction::default()
    }
}

fn semantic_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::Semantic, "<type restriction>", detail.into())
}

/// Compose a `child` restriction onto its `parent`, enforcing the 
/// subset rule for every restriction kind that both specify. Kinds the
/// child leaves unset inherit the parent's value unchanged; kinds the
/// child does set replace the parent's value once the subset check
/// passes (patterns compose by union — every constraint applies — rather
/// than subset, matching RFC 7950 §9.4.6: multiple patterns are ANDed).
pub fn compose_range(parent: Option<&IntervalSet>, child: Option<&IntervalSet>) -> Result<Option<IntervalSet>, Diagnostic> {
    match (parent, child) {
        (_, None) => Ok(parent.cloned()),
        (None, Some(c)) => Ok(Some(c.clone())),
        (Some(p), Some(c)) => {
            if c.is_subset_of(p) {
                Ok(Some(c.clone()))
            } else {
                Err(semantic_error(format!("range {c} is not a subset of base range {p}")))
            }
        }
    }
}

pub fn compose_length(parent: Option<&IntervalSet>, child: Option<&IntervalSet>) -> Result<Option<IntervalSet>, Diagnostic> {
    match (parent, child) {
        (_, None) => Ok(parent.cloned()),
        (None, Some(c)) => Ok(Some(c.clone())),
        (Some(p), Some(c)) => {
            if c.is_subset_of(p) {
                Ok(Some(c.clone()))
            } else {
                Err(semantic_error(format!("length {c} is not a subset of base length {p}")))
            }
        }
    }
}

/// Patterns accumulate: every pattern in the chain, parent and child alike,
/// must match (RFC 7950 §9.4.6 — multiple `pattern` statements are ANDed,
/// and that holds across a typedef chain too).
pub fn compose_patterns(parent: &[PatternRestriction], child: &[PatternRestriction]) -> Vec<PatternRestriction> {
    let mut combined = parent.to_vec();
    combined.extend_from_slice(child);
    combined
}

/// `enum` may only be restricted by omission (a derived enumeration type
/// without its own `enum` statements inherits the base's set unchanged);
/// once a derived type declares its own `enum` set it must be a subset of
/// the base's by name, and any `value` it restates must match the base
/// assignment.
pub fn compose_enum(parent: Option<&[EnumValue]>, child: Option<Vec<EnumValue>>) -> Result<Option<Vec<EnumValue>>, Diagnostic> {
    match (parent, child) {
        (_, None) => Ok(parent.map(|p| p.to_vec())),
        (None, Some(c)) => {
            assign_enum_values(c).map(Some)
        }
        (Some(p), Some(c)) => {
            let assigned = assign_enum_values(c)?;
            for value in &assigned {
                let base = p.iter().find(|b| b.name == value.name).ok_or_else(|| {
                    semantic_error("derived enumeration member is not present in the base type")
                })?;
                if base.value != value.value {
                    return Err(semantic_error("derived enum member's value disagrees with the base type"));
                }
            }
            Ok(Some(assigned))
        }
    }
}

/// `yang-checker` resolves the RFC 7950 §9.6.4.2 auto-increment rule (first
/// unassigned member is `0`, later ones are one more than the running
/// maximum) before handing a member list to the solver, so every
/// `EnumValue` here already carries its final value; this only rejects
/// duplicates, which auto-increment alone cannot introduce but an explicit
/// `value` restatement can.
fn assign_enum_values(members: Vec<EnumValue>) -> Result<Vec<EnumValue>, Diagnostic> {
    let mut seen = std::collections::HashSet::new();
    for member in &members {
        if !seen.insert(member.value) {
            return Err(semantic_error(format!("duplicate enum value {}", member.value)));
        }
    }
    Ok(members)
}

pub fn compose_bits(parent: Option<&[BitValue]>, child: Option<Vec<BitValue>>) -> Result<Option<Vec<BitValue>>, Diagnostic> {
    match (parent, child) {
        (_, None) => Ok(parent.map(|p| p.to_vec())),
        (None, Some(c)) => check_bit_positions(c).map(Some),
        (Some(p), Some(c)) => {
            let checked = check_bit_positions(c)?;
            for bit in &checked {
                let base = p
                    .iter()
                    .find(|b| b.name == bit.name)
                    .ok_or_else(|| semantic_error("derived bits member is not present in the base type"))?;
                if base.position != bit.position {
                    return Err(semantic_error("derived bit's position disagrees with the base type"));
                }
            }
            Ok(Some(checked))
        }
    }
}

fn check_bit_positions(bits: Vec<BitValue>) -> Result<Vec<BitValue>, Diagnostic> {
    let mut seen = std::collections::HashSet::new();
    for bit in &bits {
        if !seen.insert(bit.position) {
            return Err(semantic_error(format!("duplicate bit position {}", bit.position)));
        }
    }
    Ok(bits)
}

/// `fraction-digits` may be set exactly once along a typedef chain (RFC
/// 7950: "the fraction-digits statement...MUST NOT be specified in
/// a type statement that refers to the typedef if `type` is based on a
/// typedef that already constrains it"). Here: child may repeat the same
/// value, but may not change it once set.
pub fn compose_fraction_digits(parent: Option<u8>, child: Option<u8>) -> Result<Option<u8>, Diagnostic> {
    match (parent, child) {
        (_, None) => Ok(parent),
        (None, Some(c)) => Ok(Some(c)),
        (Some(p), Some(c)) if p == c => Ok(Some(p)),
        (Some(_), Some(_)) => Err(semantic_error("fraction-digits cannot be redefined once fixed by a base type")),
    }
}

/// `union` member composition: the flattened membership is the
/// child's own `type` branches (unions do not inherit a base union's
/// membership the way ranges inherit a base range — a derived union
/// replaces the member list entirely, matching RFC 7950's treatment of
/// union as a plain container of alternatives rather than a restrictable
/// base). `allow_leafref_and_empty_members` gates the YANG 1.1 rule that
/// a union may not contain `empty` or `leafref` before 1.1.
pub fn compose_union(members: Vec<TypeId>, member_bases: &[crate::BaseType], is_yang_1_1: bool) -> Result<Vec<TypeId>, Diagnostic> {
    if !is_yang_1_1 {
        for base in member_bases {
            if matches!(base, crate::BaseType::Empty | crate::BaseType::Leafref) {
                return Err(semantic_error(format!(
                    "union member of base type {base} requires yang-version 1.1"
                )));
            }
        }
    }
    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yang_common::Interval;

    fn ivl(min: i128, max: i128) -> IntervalSet {
        IntervalSet::from_sorted(vec![Interval::new(min, max)])
    }

    #[test]
    fn range_composition_rejects_widening() {
        let parent = ivl(-100, 100);
        let child = ivl(-200, 50);
        assert!(compose_range(Some(&parent), Some(&child)).is_err());
    }

    #[test]
    fn range_composition_accepts_narrowing() {
        let parent = ivl(-100, 100);
        let child = ivl(-25, 50);
        let result = compose_range(Some(&parent), Some(&child)).unwrap();
        assert_eq!(result, Some(child));
    }

    #[test]
    fn patterns_accumulate_across_the_chain() {
        let parent = vec![PatternRestriction { pattern: "[a-z]+".into(), inverted: false }];
        let child = vec![PatternRestriction { pattern: "^a".into(), inverted: false }];
        let combined = compose_patterns(&parent, &child);
        assert_eq!(combined.len(), 2);
    }

    #[test]
    fn fraction_digits_cannot_be_redefined() {
        assert!(compose_fraction_digits(Some(2), Some(3)).is_err());
        assert!(compose_fraction_digits(Some(2), Some(2)).is_ok());
    }

    #[test]
    fn enum_rejects_duplicate_values() {
        let a = Atom::EMPTY;
        let members = vec![EnumValue { name: a, value: 0 }, EnumValue { name: a, value: 0 }];
        assert!(compose_enum(None, Some(members)).is_err());
    }

    #[test]
    fn bits_rejects_duplicate_positions() {
        let a = Atom::EMPTY;
        let bits = vec![BitValue { name: a, position: 1 }, BitValue { name: a, position: 1 }];
        assert!(compose_bits(None, Some(bits)).is_err());
    }

    #[test]
    fn union_rejects_empty_member_before_yang_1_1() {
        let result = compose_union(vec![], &[crate::BaseType::Empty], false);
        assert!(result.is_err());
        let result = compose_union(vec![], &[crate::BaseType::Empty], true);
        assert!(result.is_ok());
    }
}
