//! Final validation pass (C9): everything that can only be checked once
//! the whole compiled tree exists — leafref targets, `unique`/key leaf
//! pointers, and `must`/`when` XPath compilation.

use rustc_hash::FxHashSet;
use yang_binder::{ModuleId, SchemaTreeView};
use yang_common::{Diagnostic, DiagnosticKind};
use yang_solver::BaseType;
use yang_xpath::{XPathAxis, XPathCompiler};

use crate::compile::NodeCompiler;
use crate::node::{CNodeId, NodeKind};

fn not_found_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::NotFound, "<validate>", detail.into())
}

fn reference_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::Reference, "<validate>", detail.into())
}

fn denied_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::Denied, "<validate>", detail.into())
}

fn semantic_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::Semantic, "<validate>", detail.into())
}

fn cycle_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::Cycle, "<validate>", detail.into())
}

pub fn run_final_validation(nc: &mut NodeCompiler, xpath: &dyn XPathCompiler) -> Result<(), Diagnostic> {
    compile_xpath_attachments(nc, xpath)?;
    resolve_leafrefs(nc)?;
    check_list_keys_and_uniques(nc)?;
    Ok(())
}

fn rendered_path(nc: &NodeCompiler, node: CNodeId) -> String {
    let mut segments = Vec::new();
    let mut current = Some(node);
    while let Some(id) = current {
        segments.push(nc.ctx.resolve(nc.schema.arena.get(id).name).to_string());
        current = nc.schema.arena.get(id).parent;
    }
    segments.reverse();
    format!("/{}", segments.join("/"))
}

fn compile_xpath_attachments(nc: &mut NodeCompiler, xpath: &dyn XPathCompiler) -> Result<(), Diagnostic> {
    let ids: Vec<CNodeId> = nc.schema.arena.ids().collect();
    for id in ids {
        let path = rendered_path(nc, id);
        let is_state = !nc.schema.arena.get(id).flags.config;
        let axis = XPathAxis { context_path: path.clone(), is_state };

        if let Some(when) = nc.schema.arena.get(id).when.clone() {
            if when.compiled.is_none() {
                let compiled = xpath.compile(&when.text, &axis).map_err(|d| semantic_error(d.message))?;
                nc.schema.arena.get_mut(id).when = Some(crate::node::XPathAttachment { text: when.text, compiled: Some(compiled) });
            }
        }
        let musts: Vec<usize> = (0..nc.schema.arena.get(id).must.len()).filter(|&i| nc.schema.arena.get(id).must[i].compiled.is_none()).collect();
        for i in musts {
            let text = nc.schema.arena.get(id).must[i].text.clone();
            let compiled = xpath.compile(&text, &axis).map_err(|d| semantic_error(d.message))?;
            nc.schema.arena.get_mut(id).must[i].compiled = Some(compiled);
        }
    }
    Ok(())
}

/// Walk every leaf/leaf-list whose type resolves to `leafref`, resolving
/// its path against the compiled tree. A union member that is itself a
/// leafref is resolved the same way — the union's own composition
/// already flattened membership, so no separate fix-point is needed here
/// beyond walking each member type once. A leafref whose target is itself
/// a leafref is chased transitively, guarding against two nodes that
/// forward-reference each other.
fn resolve_leafrefs(nc: &mut NodeCompiler) -> Result<(), Diagnostic> {
    let ids: Vec<CNodeId> = nc.schema.arena.ids().collect();
    for id in ids {
        let Some(type_id) = nc.schema.arena.get(id).type_id else { continue };
        for leafref_type in leafref_members(nc, type_id) {
            let compiled = nc.schema.types.resolve(leafref_type);
            let Some(restriction) = compiled.map(|c| c.restriction.leafref.clone()) else { continue };
            let Some(leafref) = restriction else { continue };
            let mut resolving = FxHashSet::default();
            chase_leafref_chain(nc, id, &leafref.path_text, &mut resolving)?;
        }
    }
    Ok(())
}

/// Resolve `path_text` from `leaf` and, if the target is itself a leafref,
/// follow its path too — `resolving` carries every leaf visited so far in
/// this chain, so a target that loops back to a leaf already on the
/// chain fails as a cycle rather than resolving twice.
fn chase_leafref_chain(
    nc: &mut NodeCompiler,
    leaf: CNodeId,
    path_text: &str,
    resolving: &mut FxHashSet<CNodeId>,
) -> Result<CNodeId, Diagnostic> {
    if !resolving.insert(leaf) {
        return Err(cycle_error(format!("leafref path resolution forms a cycle at '{path_text}'")));
    }
    let module = nc.schema.arena.get(leaf).module;
    let parsed = yang_binder::path::parse_data_path(path_text, nc.ctx.dictionary_mut(), yang_binder::PrefixPolicy::Optional)
        .map_err(|_| semantic_error(format!("malformed leafref path: {path_text}")))?;
    let target = resolve_leafref_target(nc, leaf, module, &parsed)?;
    let target_kind = nc.schema.arena.get(target).kind;
    if !matches!(target_kind, NodeKind::Leaf | NodeKind::LeafList) {
        return Err(denied_error(format!("leafref '{path_text}' does not resolve to a leaf or leaf-list")));
    }
    if let Some(target_type) = nc.schema.arena.get(target).type_id {
        for inner in leafref_members(nc, target_type) {
            let compiled = nc.schema.types.resolve(inner);
            let inner_leafref = compiled.and_then(|c| c.restriction.leafref.clone());
            if let Some(inner_leafref) = inner_leafref {
                chase_leafref_chain(nc, target, &inner_leafref.path_text, resolving)?;
            }
        }
    }
    Ok(target)
}

fn leafref_members(nc: &NodeCompiler, type_id: yang_solver::TypeId) -> Vec<yang_solver::TypeId> {
    let Some(compiled) = nc.schema.types.resolve(type_id) else { return Vec::new() };
    if compiled.base == BaseType::Leafref {
        return vec![type_id];
    }
    if compiled.base == BaseType::Union {
        if let Some(members) = &compiled.restriction.union_members {
            return members.iter().flat_map(|&m| leafref_members(nc, m)).collect();
        }
    }
    Vec::new()
}

fn resolve_leafref_target(
    nc: &NodeCompiler,
    leaf: CNodeId,
    leaf_module: ModuleId,
    parsed: &yang_binder::ParsedDataPath,
) -> Result<CNodeId, Diagnostic> {
    let mut current: Option<CNodeId> = if parsed.absolute { None } else { Some(leaf) };
    let mut active_module = leaf_module;

    for segment in &parsed.segments {
        if segment.current {
            current = Some(leaf);
            continue;
        }
        if segment.ascend {
            let cur = current.ok_or_else(|| semantic_error("leafref path ascends past the schema root"))?;
            current = nc.schema.arena.get(cur).parent;
            continue;
        }
        let name = segment.name.ok_or_else(|| semantic_error("leafref path segment missing a name"))?;
        let module = match segment.prefix {
            Some(prefix) => nc
                .ctx
                .module(active_module)
                .resolve_prefix(prefix)
                .ok_or_else(|| reference_error("unresolved prefix in leafref path"))?,
            None => active_module,
        };
        let pool: Vec<CNodeId> = match current {
            None => nc.schema.module_top_level(module),
            Some(c) => nc.schema.effective_children(c),
        };
        let found = pool
            .into_iter()
            .find(|&n| nc.schema.arena.get(n).name == name && nc.schema.arena.get(n).module == module)
            .ok_or_else(|| reference_error("leafref path segment does not resolve"))?;
        active_module = nc.schema.arena.get(found).module;
        current = Some(found);
    }

    current.ok_or_else(|| semantic_error("leafref path has no segments"))
}

/// /: a list's `key` leaves must exist as direct children; each key leaf
/// is implicitly mandatory and may not be of type `empty` (RFC 7950
/// §7.8.2). `unique` tags resolve to descendant leaves that don't cross
/// into a further nested list (crossing a list boundary makes "unique
/// across one instance" ambiguous, so it's rejected rather than silently
/// scoped).
fn check_list_keys_and_uniques(nc: &mut NodeCompiler) -> Result<(), Diagnostic> {
    let list_ids: Vec<CNodeId> = nc.schema.arena.ids().filter(|&id| matches!(nc.schema.arena.get(id).kind, NodeKind::List)).collect();
    for list in list_ids {
        let keys = nc.schema.arena.get(list).key.clone();
        for key_name in &keys {
            let children = nc.schema.arena.get(list).children.clone();
            let found = children
                .iter()
                .copied()
                .find(|&c| nc.schema.arena.get(c).name == *key_name && matches!(nc.schema.arena.get(c).kind, NodeKind::Leaf))
                .ok_or_else(|| not_found_error(format!("list key '{}' is not a direct leaf child", nc.ctx.resolve(*key_name))))?;

            let base = nc.schema.arena.get(found).type_id.and_then(|t| nc.schema.types.resolve(t)).map(|c| c.base);
            if base == Some(BaseType::Empty) {
                return Err(semantic_error(format!("list key '{}' may not be of type empty", nc.ctx.resolve(*key_name))));
            }
            nc.schema.arena.get_mut(found).flags.mandatory = true;
        }

        let unique_tags = nc.schema.arena.get(list).unique_tags.clone();
        for tag in &unique_tags {
            for descendant_path in tag.split_whitespace() {
                resolve_unique_leaf(nc, list, descendant_path)?;
            }
        }
    }
    Ok(())
}

fn resolve_unique_leaf(nc: &NodeCompiler, list: CNodeId, path: &str) -> Result<CNodeId, Diagnostic> {
    let mut current = list;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let local = segment.rsplit(':').next().unwrap_or(segment);
        if matches!(nc.schema.arena.get(current).kind, NodeKind::List) && current != list {
            return Err(denied_error(format!("unique path '{path}' crosses into a nested list")));
        }
        let children = nc.schema.arena.get(current).children.clone();
        let next = children
            .iter()
            .copied()
            .find(|&c| nc.ctx.resolve(nc.schema.arena.get(c).name) == local)
            .ok_or_else(|| not_found_error(format!("unique path '{path}' does not resolve")))?;
        current = next;
    }
    if !matches!(nc.schema.arena.get(current).kind, NodeKind::Leaf) {
        return Err(denied_error(format!("unique path '{path}' does not resolve to a leaf")));
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::PluginRegistry;
    use crate::node::{CNode, CompiledSchema, XPathAttachment};
    use std::sync::Arc;
    use yang_ast::{NodeArena, PNode, ParsedModule};
    use yang_binder::{Context, NamedEntityTable};
    use yang_common::{Atom, CompileOptions, Span};
    use yang_xpath::DefaultXPathCompiler;

    fn bare_context() -> (Context, ModuleId) {
        let mut ctx = Context::new(CompileOptions::default());
        let id = ctx.next_module_id();
        let name = ctx.intern("m");
        let ns = ctx.intern("urn:m");
        let prefix = ctx.intern("m");
        let mut arena = NodeArena::new();
        let root = arena.push(PNode::new(yang_ast::Keyword::Module, Some(name), Span::synthetic()));
        let module = yang_binder::Module {
            id,
            name,
            namespace: ns,
            revision: None,
            own_prefix: prefix,
            imports: Vec::new(),
            includes: Vec::new(),
            belongs_to: None,
            implemented: true,
            latest_revision: true,
            yang_version: yang_common::YangVersion::V1_0,
            typedefs: NamedEntityTable::new(),
            groupings: NamedEntityTable::new(),
            identities: NamedEntityTable::new(),
            features: NamedEntityTable::new(),
            extensions: NamedEntityTable::new(),
            parsed: Arc::new(ParsedModule::new(arena, root)),
        };
        ctx.register_module(module).unwrap();
        (ctx, id)
    }

    #[test]
    fn compiles_must_and_when_attachments() {
        let (mut ctx, module) = bare_context();
        let mut schema = CompiledSchema::new();
        let node = schema.arena.push(CNode::new(NodeKind::Leaf, Atom::EMPTY, module, None));
        schema.arena.get_mut(node).must.push(XPathAttachment { text: "1 = 1".to_string(), compiled: None });
        schema.arena.get_mut(node).when = Some(XPathAttachment { text: ". != ''".to_string(), compiled: None });

        let registry = PluginRegistry::with_builtins();
        let mut nc = NodeCompiler { ctx: &mut ctx, schema: &mut schema, registry: &registry };
        let compiler = DefaultXPathCompiler;
        run_final_validation(&mut nc, &compiler).unwrap();

        assert!(schema.arena.get(node).must[0].compiled.is_some());
        assert!(schema.arena.get(node).when.as_ref().unwrap().compiled.is_some());
    }

    #[test]
    fn list_key_must_be_a_direct_leaf_child() {
        let (mut ctx, module) = bare_context();
        let mut schema = CompiledSchema::new();
        let list = schema.arena.push(CNode::new(NodeKind::List, Atom::EMPTY, module, None));
        let key_name = ctx.intern("id");
        schema.arena.get_mut(list).key = vec![key_name];

        let registry = PluginRegistry::with_builtins();
        let mut nc = NodeCompiler { ctx: &mut ctx, schema: &mut schema, registry: &registry };
        let compiler = DefaultXPathCompiler;
        let result = run_final_validation(&mut nc, &compiler);
        assert!(result.is_err());
    }

    #[test]
    fn list_key_leaf_becomes_implicitly_mandatory() {
        let (mut ctx, module) = bare_context();
        let mut schema = CompiledSchema::new();
        let list = schema.arena.push(CNode::new(NodeKind::List, Atom::EMPTY, module, None));
        let key_name = ctx.intern("id");
        let key_leaf = schema.arena.push(CNode::new(NodeKind::Leaf, key_name, module, Some(list)));
        schema.arena.get_mut(key_leaf).type_id = Some(schema.types.builtin(yang_solver::BaseType::String));
        schema.arena.add_child(list, key_leaf);
        schema.arena.get_mut(list).key = vec![key_name];

        let registry = PluginRegistry::with_builtins();
        let mut nc = NodeCompiler { ctx: &mut ctx, schema: &mut schema, registry: &registry };
        let compiler = DefaultXPathCompiler;
        run_final_validation(&mut nc, &compiler).unwrap();
        assert!(schema.arena.get(key_leaf).flags.mandatory);
    }

    #[test]
    fn list_key_leaf_rejects_empty_type() {
        let (mut ctx, module) = bare_context();
        let mut schema = CompiledSchema::new();
        let list = schema.arena.push(CNode::new(NodeKind::List, Atom::EMPTY, module, None));
        let key_name = ctx.intern("id");
        let key_leaf = schema.arena.push(CNode::new(NodeKind::Leaf, key_name, module, Some(list)));
        schema.arena.get_mut(key_leaf).type_id = Some(schema.types.builtin(yang_solver::BaseType::Empty));
        schema.arena.add_child(list, key_leaf);
        schema.arena.get_mut(list).key = vec![key_name];

        let registry = PluginRegistry::with_builtins();
        let mut nc = NodeCompiler { ctx: &mut ctx, schema: &mut schema, registry: &registry };
        let compiler = DefaultXPathCompiler;
        let result = run_final_validation(&mut nc, &compiler);
        assert!(result.is_err());
    }

    #[test]
    fn mutual_leafref_targets_are_a_cycle() {
        let (mut ctx, module) = bare_context();
        let mut schema = CompiledSchema::new();
        let a_name = ctx.intern("a");
        let b_name = ctx.intern("b");

        let a = schema.arena.push(CNode::new(NodeKind::Leaf, a_name, module, None));
        let a_type = schema
            .types
            .alloc(yang_solver::CompiledType {
                base: yang_solver::BaseType::Leafref,
                restriction: yang_solver::Restriction {
                    leafref: Some(yang_solver::LeafrefRestriction { path_text: "/m:b".to_string(), require_instance: true }),
                    ..Default::default()
                },
                span: Span::synthetic(),
            });
        schema.arena.get_mut(a).type_id = Some(a_type);

        let b = schema.arena.push(CNode::new(NodeKind::Leaf, b_name, module, None));
        let b_type = schema
            .types
            .alloc(yang_solver::CompiledType {
                base: yang_solver::BaseType::Leafref,
                restriction: yang_solver::Restriction {
                    leafref: Some(yang_solver::LeafrefRestriction { path_text: "/m:a".to_string(), require_instance: true }),
                    ..Default::default()
                },
                span: Span::synthetic(),
            });
        schema.arena.get_mut(b).type_id = Some(b_type);

        schema.module_mut(module).top_level.push(a);
        schema.module_mut(module).top_level.push(b);

        let registry = PluginRegistry::with_builtins();
        let mut nc = NodeCompiler { ctx: &mut ctx, schema: &mut schema, registry: &registry };
        let compiler = DefaultXPathCompiler;
        let result = run_final_validation(&mut nc, &compiler);
        assert!(result.is_err());
    }

    #[test]
    fn unique_path_crossing_nested_list_is_denied() {
        let (mut ctx, module) = bare_context();
        let mut schema = CompiledSchema::new();
        let list = schema.arena.push(CNode::new(NodeKind::List, Atom::EMPTY, module, None));
        let inner_name = ctx.intern("inner");
        let inner_list = schema.arena.push(CNode::new(NodeKind::List, inner_name, module, Some(list)));
        schema.arena.add_child(list, inner_list);
        let leaf_name = ctx.intern("x");
        let leaf = schema.arena.push(CNode::new(NodeKind::Leaf, leaf_name, module, Some(inner_list)));
        schema.arena.add_child(inner_list, leaf);
        schema.arena.get_mut(list).unique_tags = vec!["inner/x".to_string()];

        let registry = PluginRegistry::with_builtins();
        let mut nc = NodeCompiler { ctx: &mut ctx, schema: &mut schema, registry: &registry };
        let compiler = DefaultXPathCompiler;
        let result = run_final_validation(&mut nc, &compiler);
        assert!(result.is_err());
    }
}
