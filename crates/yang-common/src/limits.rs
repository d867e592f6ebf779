//! Centralized limits and thresholds for the schema compiler.
//!
//! Centralizing these values documents the rationale for each bound in one
//! place and keeps the fix-point/recursion guards in `yang-binder` and
//! `yang-checker` from drifting apart.

/// Upper bound on typedef-chain depth before the type compiler assumes a
/// cycle rather than a very deep (but finite) derivation chain. A true
/// cycle is caught before this by the typedef dependency graph's own
/// `cycle` error; this is a backstop.
pub const MAX_TYPEDEF_CHAIN_DEPTH: u32 = 256;

/// Upper bound on grouping nesting depth reachable through `uses` before
/// the expander assumes runaway recursion (legitimate recursive
/// `uses` must be broken by a `when`, which bounds real usage far below
/// this).
pub const MAX_USES_NESTING_DEPTH: u32 = 256;

/// Upper bound on schema-tree depth walked while resolving a node-id or
/// leafref path.
pub const MAX_PATH_WALK_DEPTH: u32 = 512;

/// A bounded fix-point (at most `n²` iterations for `n` modules) resolves
/// ordering cycles that cross modules: the cap is
/// `n² * FIXPOINT_ITERATIONS_PER_MODULE_PAIR`, clamped to this ceiling so a
/// pathological module count cannot turn a bug into an unbounded loop.
pub const MAX_FIXPOINT_ITERATIONS: u32 = 10_000;

/// Per-module-pair allowance feeding `MAX_FIXPOINT_ITERATIONS`'s derivation.
pub const FIXPOINT_ITERATIONS_PER_MODULE_PAIR: u32 = 4;

/// Compute the fix-point iteration cap for a context with `module_count`
/// modules, per the `N modules²` rule.
pub fn fixpoint_cap(module_count: usize) -> u32 {
    let n = module_count as u64;
    let computed = n.saturating_mul(n).saturating_mul(FIXPOINT_ITERATIONS_PER_MODULE_PAIR as u64);
    computed.min(MAX_FIXPOINT_ITERATIONS as u64) as u32
}

/// Maximum number of identity bases a single identity may declare before
/// the compiler suspects a malformed module rather than a legitimately
/// wide multiple-inheritance lattice.
pub const MAX_IDENTITY_BASES: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixpoint_cap_grows_quadratically_then_clamps() {
        assert_eq!(fixpoint_cap(1), 4);
        assert_eq!(fixpoint_cap(10), 400);
        assert_eq!(fixpoint_cap(10_000), MAX_FIXPOINT_ITERATIONS);
    }
}
