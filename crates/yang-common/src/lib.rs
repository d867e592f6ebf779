//! Common types and utilities for the YANG schema compiler.
//!
//! This crate provides foundational types used across all `yang-*` crates:
//! - String interning (`Atom`, `Interner`)
//! - Source spans for diagnostics (`Span`, `Spanned`)
//! - Compiler-wide limits and thresholds (`limits`)
//! - The diagnostic taxonomy and message catalog (`diagnostics`)
//! - Numeric-range / length-interval parsing used by the type compiler

pub mod interner;
pub use interner::{Atom, Interner};

pub mod span;
pub use span::{Span, Spanned};

pub mod limits;

pub mod diagnostics;
pub use diagnostics::{CompileError, Diagnostic, DiagnosticKind, Diagnostics, Severity};

pub mod intervals;
pub use intervals::{Interval, IntervalSet};

pub mod options;
pub use options::{CompileOptions, YangVersion};
