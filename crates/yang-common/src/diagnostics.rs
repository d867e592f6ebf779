//! Diagnostic taxonomy and accumulation for the schema compiler.
//!
//! A closed `DiagnosticKind` enum, a `Severity`, and a `Diagnostic` carrying a
//! rendered path, message, and optional module/revision metadata. Fatal
//! diagnostics are also wrapped as `CompileError` so pass functions can use
//! `?` while still making a full diagnostic available to the caller.

use crate::span::Span;
use std::fmt;

/// The closed taxonomy of compile-time diagnostics, per spec.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Malformed restriction syntax, malformed path syntax, etc.
    Syntax,
    /// Unknown name or unresolved prefix.
    Reference,
    /// Disallowed by a schema rule (status, context, augment target kind).
    Denied,
    /// Duplicate name within a namespace partition.
    Exists,
    /// A referenced module/typedef/grouping/identity does not exist.
    NotFound,
    /// An invariant was violated (range not a subset, bad key leaf, ...).
    Semantic,
    /// A dependency cycle was detected (typedef, grouping, feature, leafref).
    Cycle,
    /// Two deviations from different modules conflict.
    Conflict,
    /// An extension plugin rejected instantiation.
    Extension,
    /// Allocation or arena capacity failure.
    Memory,
    /// A compiler invariant was violated; indicates a bug in the compiler.
    Internal,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::Syntax => "syntax",
            DiagnosticKind::Reference => "reference",
            DiagnosticKind::Denied => "denied",
            DiagnosticKind::Exists => "exists",
            DiagnosticKind::NotFound => "not-found",
            DiagnosticKind::Semantic => "semantic",
            DiagnosticKind::Cycle => "cycle",
            DiagnosticKind::Conflict => "conflict",
            DiagnosticKind::Extension => "extension",
            DiagnosticKind::Memory => "memory",
            DiagnosticKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Diagnostic severity. Errors abort the compile; warnings accumulate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A single diagnostic: kind, rendered path, human message, and the
/// source span it points at (if any P-node was available).
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// Rendered schema-node-id or description of the failing construct.
    pub path: String,
    pub message: String,
    pub span: Span,
    pub module: Option<String>,
    pub revision: Option<String>,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
            span: Span::synthetic(),
            module: None,
            revision: None,
        }
    }

    pub fn warning(kind: DiagnosticKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(kind, path, message)
        }
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>, revision: Option<String>) -> Self {
        self.module = Some(module.into());
        self.revision = revision;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.path, self.message)
    }
}

/// The first fatal diagnostic of a failed compile, usable with `?`.
/// Wraps a `Diagnostic` so callers that only care about "did it fail, and
/// why" don't need to thread a whole `Diagnostics` sink through.
#[derive(Clone, Debug)]
pub struct CompileError(pub Diagnostic);

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for CompileError {}

impl From<Diagnostic> for CompileError {
    fn from(d: Diagnostic) -> Self {
        CompileError(d)
    }
}

/// Accumulates warnings across a compile while the first fatal error
/// (if any) propagates through `Result`. Per: "the compiler fails fast
/// per module-compile call, returning the first fatal error while
/// accumulating warnings."
#[derive(Default, Debug, Clone)]
pub struct Diagnostics {
    warnings: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn push_warning(&mut self, diagnostic: Diagnostic) {
        debug_assert_eq!(diagnostic.severity, Severity::Warning);
        self.warnings.push(diagnostic);
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn clear(&mut self) {
        self.warnings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display_includes_kind_and_path() {
        let d = Diagnostic::error(DiagnosticKind::Semantic, "/if:top/if:x", "range not a subset");
        assert_eq!(format!("{d}"), "[semantic] /if:top/if:x: range not a subset");
    }

    #[test]
    fn diagnostics_sink_accumulates_warnings_only() {
        let mut sink = Diagnostics::new();
        sink.push_warning(Diagnostic::warning(DiagnosticKind::Reference, "/a", "unused import"));
        assert_eq!(sink.warnings().len(), 1);
    }
}
