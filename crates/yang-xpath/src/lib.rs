//! The XPath compiler boundary ("XPath dependency").
//!
//! `must`/`when`/leafref-path compilation is treated as an outbound call to
//! an XPath compiler: the interface is `(expression text, axis schema-node)
//! -> compiled expression | diagnostic`. This crate is exactly that
//! interface — a trait the final validation pass (C9, in `yang-checker`)
//! calls — plus a small reference implementation that does enough
//! syntactic validation to make the compiler's tests meaningful without
//! pulling in a full XPath engine.

use yang_common::Span;

/// Describes the schema location an XPath expression is evaluated from,
/// i.e. its context node. Kept abstract (a rendered node-id plus a couple
/// of booleans) so this crate never needs to depend on `yang-checker`'s
/// concrete schema-node type.
#[derive(Clone, Debug)]
pub struct XPathAxis {
    /// Rendered schema node-id of the context node, for diagnostics.
    pub context_path: String,
    /// Whether the context node (or an ancestor) is config `false`;
    /// `must`/`when` on state data may reference a wider node set.
    pub is_state: bool,
}

/// A successfully compiled expression. Opaque beyond `source`: the real
/// evaluator (an external collaborator per spec) is the only thing that
/// ever needs to look inside.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledXPath {
    pub source: String,
}

/// A syntactic diagnostic raised while compiling an XPath expression.
#[derive(Clone, Debug)]
pub struct XPathDiagnostic {
    pub message: String,
    pub span: Span,
}

/// The compiler-facing contract. `yang-checker`'s final validation pass
/// holds a `Box<dyn XPathCompiler>` (or any `impl XPathCompiler`) and never
/// matches on expression internals itself.
pub trait XPathCompiler {
    fn compile(&self, expression: &str, axis: &XPathAxis) -> Result<CompiledXPath, XPathDiagnostic>;
}

/// A minimal reference compiler: rejects empty expressions and unbalanced
/// brackets/parens/quotes, otherwise accepts the text verbatim. Sufficient
/// to drive C9's `must`/`when`/leafref-path compilation step in tests; a
/// production host is expected to supply a real XPath 1.0 engine.
#[derive(Default)]
pub struct DefaultXPathCompiler;

impl XPathCompiler for DefaultXPathCompiler {
    fn compile(&self, expression: &str, axis: &XPathAxis) -> Result<CompiledXPath, XPathDiagnostic> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(XPathDiagnostic {
                message: format!("empty XPath expression at {}", axis.context_path),
                span: Span::synthetic(),
            });
        }
        check_balanced(trimmed).map_err(|message| XPathDiagnostic {
            message: format!("{message} in `{trimmed}` at {}", axis.context_path),
            span: Span::synthetic(),
        })?;
        Ok(CompiledXPath {
            source: trimmed.to_string(),
        })
    }
}

fn check_balanced(expr: &str) -> Result<(), String> {
    let mut stack = Vec::new();
    let mut in_quote: Option<char> = None;
    for ch in expr.chars() {
        if let Some(q) = in_quote {
            if ch == q {
                in_quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => in_quote = Some(ch),
            '(' | '[' => stack.push(ch),
            ')' => {
                if stack.pop() != Some('(') {
                    return Err("unbalanced ')'".into());
                }
            }
            ']' => {
                if stack.pop() != Some('[') {
                    return Err("unbalanced ']'".into());
                }
            }
            _ => {}
        }
    }
    if in_quote.is_some() {
        return Err("unterminated quote".into());
    }
    if !stack.is_empty() {
        return Err("unbalanced bracket".into());
    }
    Ok(())
}
