//! Feature declarations and `if-feature` expression evaluation.

use rustc_hash::FxHashSet;
use yang_binder::{Context, FeatureState, ModuleId};
use yang_common::{Atom, Diagnostic, DiagnosticKind};

/// A parsed `if-feature` boolean expression:
/// `name | "not" E | E1 "and" E2 | E1 "or" E2 | "(" E ")"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IfFeatureExpr {
    Name(Atom),
    Not(Box<IfFeatureExpr>),
    And(Box<IfFeatureExpr>, Box<IfFeatureExpr>),
    Or(Box<IfFeatureExpr>, Box<IfFeatureExpr>),
}

fn syntax_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::Syntax, "<if-feature>", detail.into())
}

/// A minimal recursive-descent parser over the grammar above, tokenizing on
/// whitespace and parens (feature names are plain YANG identifiers, so no
/// escaping concerns arise at this layer).
pub fn parse_if_feature(text: &str, ctx: &mut Context) -> Result<IfFeatureExpr, Diagnostic> {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return Err(syntax_error("empty if-feature expression"));
    }
    let mut pos = 0;
    let expr = parse_or(&tokens, &mut pos, ctx)?;
    if pos != tokens.len() {
        return Err(syntax_error(format!("unexpected trailing tokens in: {text}")));
    }
    Ok(expr)
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '(' | ')' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(c.to_string());
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn parse_or(tokens: &[String], pos: &mut usize, ctx: &mut Context) -> Result<IfFeatureExpr, Diagnostic> {
    let mut lhs = parse_and(tokens, pos, ctx)?;
    while tokens.get(*pos).map(String::as_str) == Some("or") {
        *pos += 1;
        let rhs = parse_and(tokens, pos, ctx)?;
        lhs = IfFeatureExpr::Or(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_and(tokens: &[String], pos: &mut usize, ctx: &mut Context) -> Result<IfFeatureExpr, Diagnostic> {
    let mut lhs = parse_unary(tokens, pos, ctx)?;
    while tokens.get(*pos).map(String::as_str) == Some("and") {
        *pos += 1;
        let rhs = parse_unary(tokens, pos, ctx)?;
        lhs = IfFeatureExpr::And(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_unary(tokens: &[String], pos: &mut usize, ctx: &mut Context) -> Result<IfFeatureExpr, Diagnostic> {
    match tokens.get(*pos).map(String::as_str) {
        Some("not") => {
            *pos += 1;
            let inner = parse_unary(tokens, pos, ctx)?;
            Ok(IfFeatureExpr::Not(Box::new(inner)))
        }
        Some("(") => {
            *pos += 1;
            let inner = parse_or(tokens, pos, ctx)?;
            if tokens.get(*pos).map(String::as_str) != Some(")") {
                return Err(syntax_error("unbalanced parentheses in if-feature expression"));
            }
            *pos += 1;
            Ok(inner)
        }
        Some(name) => {
            let atom = ctx.intern(name);
            *pos += 1;
            Ok(IfFeatureExpr::Name(atom))
        }
        None => Err(syntax_error("unexpected end of if-feature expression")),
    }
}

/// Evaluate `expr` against `module`'s feature state in `ctx`. A feature
/// name with a prefix would resolve in another module; this solver's
/// prefix lookup happens upstream (the node compiler resolves each `Name`
/// atom's qualifying module before calling here) — callers with a
/// cross-module `if-feature` pass the already-resolved `(module, name)`
/// through `resolve` rather than reusing `module` for every leaf.
pub fn eval_if_feature(expr: &IfFeatureExpr, ctx: &Context, module: ModuleId) -> bool {
    match expr {
        IfFeatureExpr::Name(name) => ctx.feature_state(module, *name) == FeatureState::Enabled,
        IfFeatureExpr::Not(inner) => !eval_if_feature(inner, ctx, module),
        IfFeatureExpr::And(a, b) => eval_if_feature(a, ctx, module) && eval_if_feature(b, ctx, module),
        IfFeatureExpr::Or(a, b) => eval_if_feature(a, ctx, module) || eval_if_feature(b, ctx, module),
    }
}

/// Detect a cycle in the feature dependency DAG built from each feature's
/// own `if-feature` guards ("features form a DAG; cycles -> cycle").
pub fn check_feature_dag(edges: &rustc_hash::FxHashMap<Atom, Vec<Atom>>) -> Result<(), Diagnostic> {
    let mut visiting = FxHashSet::default();
    let mut done = FxHashSet::default();
    for &start in edges.keys() {
        visit(start, edges, &mut visiting, &mut done)?;
    }
    Ok(())
}

fn visit(
    node: Atom,
    edges: &rustc_hash::FxHashMap<Atom, Vec<Atom>>,
    visiting: &mut FxHashSet<Atom>,
    done: &mut FxHashSet<Atom>,
) -> Result<(), Diagnostic> {
    if done.contains(&node) {
        return Ok(());
    }
    if !visiting.insert(node) {
        return Err(Diagnostic::error(DiagnosticKind::Cycle, "<feature>", "feature dependency graph contains a cycle"));
    }
    if let Some(deps) = edges.get(&node) {
        for &dep in deps {
            visit(dep, edges, visiting, done)?;
        }
    }
    visiting.remove(&node);
    done.insert(node);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use yang_common::CompileOptions;

    #[test]
    fn parses_and_or_not_with_precedence() {
        let mut ctx = Context::new(CompileOptions::default());
        let expr = parse_if_feature("a and b or not c", &mut ctx).unwrap();
        // `and` binds tighter than `or`: (a and b) or (not c)
        match expr {
            IfFeatureExpr::Or(lhs, rhs) => {
                assert!(matches!(*lhs, IfFeatureExpr::And(_, _)));
                assert!(matches!(*rhs, IfFeatureExpr::Not(_)));
            }
            other => panic!("expected Or at top level, got {other:?}"),
        }
    }

    #[test]
    fn parens_override_precedence() {
        let mut ctx = Context::new(CompileOptions::default());
        let expr = parse_if_feature("a and (b or c)", &mut ctx).unwrap();
        match expr {
            IfFeatureExpr::And(_, rhs) => assert!(matches!(*rhs, IfFeatureExpr::Or(_, _))),
            other => panic!("expected And at top level, got {other:?}"),
        }
    }

    #[test]
    fn evaluates_against_feature_state() {
        let mut ctx = Context::new(CompileOptions::default());
        let id = ctx.next_module_id();
        let f = ctx.intern("f");
        let expr = IfFeatureExpr::Name(f);
        assert!(!eval_if_feature(&expr, &ctx, id));
        ctx.set_feature(id, f, true);
        assert!(eval_if_feature(&expr, &ctx, id));
    }

    #[test]
    fn detects_feature_dependency_cycle() {
        let mut interner = yang_common::Interner::new();
        let a = interner.intern("a");
        let b = interner.intern("b");
        let mut edges = rustc_hash::FxHashMap::default();
        edges.insert(a, vec![b]);
        edges.insert(b, vec![a]);
        assert!(check_feature_dag(&edges).is_err());
    }
}
