//! Augment & deviation application (C6).
//!
//! Top-level `augment` targets an absolute schema-node-id and runs once
//! all modules' bodies are compiled, so it can freely cross module
//! boundaries. Inline `augment` (a substatement of `uses`) targets a
//! path relative to the `uses` site and runs immediately after that
//! grouping's body is inlined, from `uses::expand_uses`.

use yang_ast::{Keyword, NodeIndex};
use yang_binder::{schema_tree::resolve_node_id, ModuleId, NodeTypeMask};
use yang_common::{Diagnostic, DiagnosticKind};

use crate::compile::{InheritedState, NodeCompiler};
use crate::node::{CNode, CNodeId, NodeKind};

fn not_found_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::NotFound, "<augment>", detail.into())
}

fn denied_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::Denied, "<augment>", detail.into())
}

fn semantic_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::Semantic, "<deviation>", detail.into())
}

fn conflict_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::Conflict, "<deviation>", detail.into())
}

/// Walk `path` (plain `/`-separated local names, prefixes stripped) from
/// `roots` downward. Used by both inline-augment and refine target
/// resolution, where the target is always inside a subtree this compiler
/// itself just inlined — matching by local name only is sufficient there
/// and sidesteps re-deriving each segment's owning module.
pub(crate) fn find_by_local_path(nc: &NodeCompiler, roots: &[CNodeId], path: &str) -> Option<CNodeId> {
    let mut pool = roots.to_vec();
    let mut found = None;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let local = segment.rsplit(':').next().unwrap_or(segment);
        let next = pool.iter().copied().find(|&id| nc.ctx.resolve(nc.schema.arena.get(id).name) == local)?;
        found = Some(next);
        pool = nc.schema.arena.get(next).children.to_vec();
    }
    found
}

/// Apply one `augment` nested inside a `uses` statement, targeting a node
/// relative to the `uses` site (`anchor`, or the freshly inlined top-level
/// set when the `uses` itself sits at module top level).
pub fn apply_inline_augment(
    nc: &mut NodeCompiler,
    module: ModuleId,
    augment: NodeIndex,
    anchor: Option<CNodeId>,
    inlined: &[CNodeId],
    state: InheritedState,
) -> Result<(), Diagnostic> {
    let path_text = nc
        .ctx
        .module(module)
        .parsed
        .arena
        .get(augment)
        .argument
        .map(|a| nc.ctx.resolve(a).to_string())
        .unwrap_or_default();
    let roots: Vec<CNodeId> = match anchor {
        Some(p) => nc.schema.arena.get(p).children.to_vec(),
        None => inlined.to_vec(),
    };
    let target = find_by_local_path(nc, &roots, &path_text).ok_or_else(|| not_found_error(format!("augment target '{path_text}' not found")))?;
    apply_children_at(nc, module, augment, target, state)
}

/// Apply every top-level `augment` statement across already-compiled
/// modules. Runs once, after every module's data tree is built, since a
/// target may live in a different module than the augment's own —
/// cross-module augment is only permitted from implemented modules.
pub fn apply_all_top_level_augments(nc: &mut NodeCompiler, modules: &[ModuleId]) -> Result<(), Diagnostic> {
    for &module in modules {
        let root = nc.ctx.module(module).parsed.root;
        let augments: Vec<NodeIndex> = nc.ctx.module(module).parsed.arena.children_of_kind(root, Keyword::Augment).collect();
        for augment in augments {
            apply_top_level_augment(nc, module, augment)?;
        }
    }
    Ok(())
}

fn apply_top_level_augment(nc: &mut NodeCompiler, module: ModuleId, augment: NodeIndex) -> Result<(), Diagnostic> {
    if !nc.passes_if_feature(module, augment)? {
        return Ok(());
    }
    let path_text = nc
        .ctx
        .module(module)
        .parsed
        .arena
        .get(augment)
        .argument
        .map(|a| nc.ctx.resolve(a).to_string())
        .unwrap_or_default();
    let parsed = yang_binder::path::parse_node_id(&path_text, nc.ctx.dictionary_mut())
        .map_err(|_| semantic_error(format!("malformed augment target: {path_text}")))?;
    let target = resolve_node_id(&*nc.schema, &*nc.ctx, module, &parsed, None, NodeTypeMask::AUGMENT_TARGETS)?;

    let existing_names: Vec<(yang_common::Atom, ModuleId)> =
        nc.schema.arena.get(target).children.iter().map(|&c| (nc.schema.arena.get(c).name, nc.schema.arena.get(c).module)).collect();
    let new_children: Vec<NodeIndex> = nc
        .ctx
        .module(module)
        .parsed
        .arena
        .children(augment)
        .iter()
        .copied()
        .filter(|&c| !matches!(nc.ctx.module(module).parsed.arena.get(c).keyword, Keyword::When | Keyword::Description | Keyword::Reference | Keyword::IfFeature))
        .collect();
    for &child in &new_children {
        if let Some(name) = nc.ctx.module(module).parsed.arena.get(child).argument {
            if existing_names.contains(&(name, module)) {
                return Err(Diagnostic::error(
                    DiagnosticKind::Exists,
                    "<augment>",
                    format!("augment adds a sibling that already exists under '{path_text}'"),
                ));
            }
        }
    }

    let target_state = InheritedState { config: nc.schema.arena.get(target).flags.config, status: nc.schema.arena.get(target).flags.status };
    apply_children_at(nc, module, augment, target, target_state)
}

fn apply_children_at(nc: &mut NodeCompiler, module: ModuleId, augment: NodeIndex, target: CNodeId, state: InheritedState) -> Result<(), Diagnostic> {
    let children: Vec<NodeIndex> = nc.ctx.module(module).parsed.arena.children(augment).to_vec();
    for child in children {
        let kw = nc.ctx.module(module).parsed.arena.get(child).keyword;
        if matches!(kw, Keyword::When | Keyword::Description | Keyword::Reference | Keyword::IfFeature) {
            continue;
        }
        if kw == Keyword::Case && matches!(nc.schema.arena.get(target).kind, NodeKind::Choice) {
            nc.compile_statement(module, child, Some(target), state)?;
            continue;
        }
        // Augmenting a `choice` with bare data nodes implicitly wraps each
        // one in its own case (RFC 7950 §7.9.3), same as choice's own body.
        if matches!(nc.schema.arena.get(target).kind, NodeKind::Choice) && kw != Keyword::Case {
            if !nc.passes_if_feature(module, child)? {
                continue;
            }
            let name = nc.ctx.module(module).parsed.arena.get(child).argument.unwrap_or(yang_common::Atom::EMPTY);
            let case_node = CNode::new(NodeKind::Case, name, module, Some(target));
            let case_id = nc.schema.arena.push(case_node);
            nc.schema.arena.add_child(target, case_id);
            nc.compile_statement(module, child, Some(case_id), state)?;
            continue;
        }
        nc.compile_statement(module, child, Some(target), state)?;
    }
    Ok(())
}

/// One `deviate` operation inside a `deviation` statement.
#[derive(Clone, Copy, PartialEq, Eq)]
enum DeviateOp {
    NotSupported,
    Add,
    Replace,
    Delete,
}

/// Apply every `deviation` statement across the given modules. Processed
/// in the order given (module load order), after augments and before the
/// final validation pass.
///
/// Open question resolved here: two deviations from different deviator
/// modules both `replace`-ing the same property of the same target is a
/// hard `conflict` — this compiler does not pick a "winner" by load order,
/// since that would make compilation output depend on incidental import
/// ordering rather than on the deviations' own content.
pub fn apply_all_deviations(nc: &mut NodeCompiler, modules: &[ModuleId]) -> Result<(), Diagnostic> {
    let mut replaced: std::collections::HashMap<(CNodeId, &'static str), ModuleId> = std::collections::HashMap::new();
    for &module in modules {
        let root = nc.ctx.module(module).parsed.root;
        let deviations: Vec<NodeIndex> = nc.ctx.module(module).parsed.arena.children_of_kind(root, Keyword::Deviation).collect();
        for deviation in deviations {
            apply_deviation(nc, module, deviation, &mut replaced)?;
        }
    }
    Ok(())
}

fn apply_deviation(
    nc: &mut NodeCompiler,
    module: ModuleId,
    deviation: NodeIndex,
    replaced: &mut std::collections::HashMap<(CNodeId, &'static str), ModuleId>,
) -> Result<(), Diagnostic> {
    let path_text = nc
        .ctx
        .module(module)
        .parsed
        .arena
        .get(deviation)
        .argument
        .map(|a| nc.ctx.resolve(a).to_string())
        .unwrap_or_default();
    let parsed = yang_binder::path::parse_node_id(&path_text, nc.ctx.dictionary_mut())
        .map_err(|_| semantic_error(format!("malformed deviation target: {path_text}")))?;
    let target = resolve_node_id(&*nc.schema, &*nc.ctx, module, &parsed, None, NodeTypeMask::ALL)?;

    let deviates: Vec<NodeIndex> = nc.ctx.module(module).parsed.arena.children_of_kind(deviation, Keyword::Deviate).collect();
    for deviate in deviates {
        let arg = nc.ctx.module(module).parsed.arena.get(deviate).argument.map(|a| nc.ctx.resolve(a).to_string()).unwrap_or_default();
        let op = match arg.as_str() {
            "not-supported" => DeviateOp::NotSupported,
            "add" => DeviateOp::Add,
            "replace" => DeviateOp::Replace,
            "delete" => DeviateOp::Delete,
            other => return Err(semantic_error(format!("invalid deviate operation: {other}"))),
        };
        apply_deviate(nc, module, deviate, target, op, replaced)?;
    }
    Ok(())
}

fn apply_deviate(
    nc: &mut NodeCompiler,
    module: ModuleId,
    deviate: NodeIndex,
    target: CNodeId,
    op: DeviateOp,
    replaced: &mut std::collections::HashMap<(CNodeId, &'static str), ModuleId>,
) -> Result<(), Diagnostic> {
    if op == DeviateOp::NotSupported {
        // Idempotent and overriding: strip the node from its parent's
        // child list. A second `not-supported` on the same target is a
        // harmless no-op since the target is already detached.
        if let Some(parent) = nc.schema.arena.get(target).parent {
            let siblings = &mut nc.schema.arena.get_mut(parent).children;
            siblings.retain(|c| *c != target);
        }
        return Ok(());
    }

    let fields: Vec<NodeIndex> = nc.ctx.module(module).parsed.arena.children(deviate).to_vec();
    for field in fields {
        let p = nc.ctx.module(module).parsed.arena.get(field);
        let kw = p.keyword;
        let arg = p.argument;
        let property: &'static str = match kw {
            Keyword::Config => "config",
            Keyword::Default => "default",
            Keyword::Mandatory => "mandatory",
            Keyword::MinElements => "min-elements",
            Keyword::MaxElements => "max-elements",
            Keyword::Type => "type",
            Keyword::Unique => "unique",
            Keyword::Must => "must",
            _ => continue,
        };

        if op == DeviateOp::Replace {
            if let Some(&owner) = replaced.get(&(target, property)) {
                if owner != module {
                    return Err(conflict_error(format!(
                        "conflicting 'replace' deviations for '{property}' on the same target from different modules"
                    )));
                }
            }
            replaced.insert((target, property), module);
        }

        match (op, kw) {
            (DeviateOp::Add, Keyword::Must) | (DeviateOp::Replace, Keyword::Must) => {
                let text = arg.map(|a| nc.ctx.resolve(a).to_string()).unwrap_or_default();
                if op == DeviateOp::Replace {
                    nc.schema.arena.get_mut(target).must.clear();
                }
                nc.schema.arena.get_mut(target).must.push(crate::node::XPathAttachment { text, compiled: None });
            }
            (DeviateOp::Delete, Keyword::Must) => {
                let text = arg.map(|a| nc.ctx.resolve(a).to_string()).unwrap_or_default();
                nc.schema.arena.get_mut(target).must.retain(|m| m.text != text);
            }
            (_, Keyword::Config) => {
                if let Some(a) = arg {
                    nc.schema.arena.get_mut(target).flags.config = nc.ctx.resolve(a) == "true";
                }
            }
            (_, Keyword::Default) => {
                if op == DeviateOp::Delete {
                    nc.schema.arena.get_mut(target).default = None;
                } else {
                    nc.schema.arena.get_mut(target).default = arg;
                }
            }
            (_, Keyword::Mandatory) => {
                if let Some(a) = arg {
                    nc.schema.arena.get_mut(target).flags.mandatory = nc.ctx.resolve(a) == "true";
                }
            }
            (_, Keyword::MinElements) => {
                if let Some(a) = arg {
                    let text = nc.ctx.resolve(a).to_string();
                    nc.schema.arena.get_mut(target).min_elements =
                        text.parse().map_err(|_| semantic_error(format!("invalid min-elements in deviation: {text}")))?;
                }
            }
            (_, Keyword::MaxElements) => {
                if let Some(a) = arg {
                    let text = nc.ctx.resolve(a).to_string();
                    nc.schema.arena.get_mut(target).max_elements =
                        if text == "unbounded" { None } else { Some(text.parse().map_err(|_| semantic_error(format!("invalid max-elements in deviation: {text}")))?) };
                }
            }
            (DeviateOp::Add, Keyword::Unique) | (DeviateOp::Replace, Keyword::Unique) => {
                let text = arg.map(|a| nc.ctx.resolve(a).to_string()).unwrap_or_default();
                if op == DeviateOp::Replace {
                    nc.schema.arena.get_mut(target).unique_tags.clear();
                }
                nc.schema.arena.get_mut(target).unique_tags.push(text);
            }
            (DeviateOp::Delete, Keyword::Unique) => {
                let text = arg.map(|a| nc.ctx.resolve(a).to_string()).unwrap_or_default();
                nc.schema.arena.get_mut(target).unique_tags.retain(|t| *t != text);
            }
            (_, Keyword::Type) => {
                let mut tc = yang_solver::TypeCompileContext { ctx: &*nc.ctx, store: &mut nc.schema.types };
                let type_id = yang_solver::compile_type(yang_solver::RawTypeRef { module, node: field }, &mut tc)?;
                nc.schema.arena.get_mut(target).type_id = Some(type_id);
            }
            _ => {}
        }
    }
    Ok(())
}
