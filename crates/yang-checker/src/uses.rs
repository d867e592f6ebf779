//! Grouping/uses expansion (C5): inlining a grouping's body at a `uses`
//! site, then applying `refine` and inline-`augment` overlays to the
//! freshly inlined copy only.
//!
//! Grouping lookup resolves through the module-level name table, the same
//! way the type compiler resolves typedefs — `NamedEntityTable` carries no
//! scope information, so this compiler treats grouping names as unique
//! per module rather than walking lexical ancestor scopes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use yang_ast::{Keyword, NodeIndex};
use yang_binder::{ModuleId, NamedKind};
use yang_common::{limits, Diagnostic, DiagnosticKind};

use crate::augment::{apply_inline_augment, find_by_local_path};
use crate::compile::{InheritedState, NodeCompiler};
use crate::node::{ChildList, CNodeId, GroupingTemplate, OverlayFingerprint, TemplateNode, UsesCacheKey};

fn cycle_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::Cycle, "<uses>", detail.into())
}

fn not_found_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::NotFound, "<uses>", detail.into())
}

fn semantic_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::Semantic, "<uses>", detail.into())
}

pub fn expand_uses(
    nc: &mut NodeCompiler,
    module: ModuleId,
    p_node: NodeIndex,
    parent: Option<CNodeId>,
    state: InheritedState,
) -> Result<(), Diagnostic> {
    let mut chain = Vec::new();
    expand_uses_at_depth(nc, module, p_node, parent, state, &mut chain)
}

fn expand_uses_at_depth(
    nc: &mut NodeCompiler,
    module: ModuleId,
    p_node: NodeIndex,
    parent: Option<CNodeId>,
    state: InheritedState,
    chain: &mut Vec<NodeIndex>,
) -> Result<(), Diagnostic> {
    if chain.len() as u32 > limits::MAX_USES_NESTING_DEPTH {
        return Err(cycle_error("uses nesting exceeds the maximum grouping depth"));
    }
    if !nc.passes_if_feature(module, p_node)? {
        return Ok(());
    }

    let name_text = nc
        .ctx
        .module(module)
        .parsed
        .arena
        .get(p_node)
        .argument
        .map(|a| nc.ctx.resolve(a).to_string())
        .ok_or_else(|| semantic_error("uses statement missing a grouping name"))?;

    let (target_module, grouping_node) = resolve_grouping(nc, module, &name_text)?;

    let has_when = nc.ctx.module(module).parsed.arena.children_of_kind(p_node, Keyword::When).next().is_some();
    if chain.contains(&grouping_node) && !has_when {
        return Err(cycle_error(format!(
            "grouping '{name_text}' is used recursively without a when guard breaking the cycle"
        )));
    }

    let refines: Vec<NodeIndex> = nc.ctx.module(module).parsed.arena.children_of_kind(p_node, Keyword::Refine).collect();
    let augments: Vec<NodeIndex> = nc.ctx.module(module).parsed.arena.children_of_kind(p_node, Keyword::Augment).collect();

    let fingerprint = overlay_fingerprint(nc, module, &refines, &augments);
    let cache_key: UsesCacheKey = (target_module, grouping_node, fingerprint);

    if let Some(template) = nc.schema.uses_cache.get(&cache_key).cloned() {
        let produced = instantiate_template(nc, &template, parent);
        for &id in &produced {
            nc.check_sibling_uniqueness(id)?;
            if parent.is_none() {
                nc.register_top_level(module, id);
            }
        }
        return Ok(());
    }

    chain.push(grouping_node);
    let body_children: Vec<NodeIndex> = nc.ctx.module(target_module).parsed.arena.children(grouping_node).to_vec();
    let mut inlined = Vec::new();
    for child in body_children {
        let keyword = nc.ctx.module(target_module).parsed.arena.get(child).keyword;
        if matches!(
            keyword,
            Keyword::Typedef | Keyword::Grouping | Keyword::Description | Keyword::Reference | Keyword::Status
        ) {
            continue;
        }
        if keyword == Keyword::Uses {
            expand_uses_at_depth(nc, target_module, child, parent, state, chain)?;
            continue;
        }
        if let Some(id) = nc.compile_statement(target_module, child, parent, state)? {
            if parent.is_none() {
                nc.register_top_level(module, id);
            }
            inlined.push(id);
        }
    }
    chain.pop();

    for &refine in &refines {
        apply_refine(nc, module, refine, parent, &inlined)?;
    }
    for &augment in &augments {
        apply_inline_augment(nc, module, augment, parent, &inlined, state)?;
    }

    let template = capture_template(nc, &inlined);
    nc.schema.uses_cache.insert(cache_key, template);
    Ok(())
}

/// Hashes the full statement subtree of every overlay (`refine`/inline
/// `augment`) attached at a `uses` site, so two sites with textually
/// identical overlays (including none at all) share one cache entry.
fn overlay_fingerprint(nc: &NodeCompiler, module: ModuleId, refines: &[NodeIndex], augments: &[NodeIndex]) -> OverlayFingerprint {
    let mut hasher = DefaultHasher::new();
    for &refine in refines {
        hash_statement(nc, module, refine, &mut hasher);
    }
    0xAAu8.hash(&mut hasher);
    for &augment in augments {
        hash_statement(nc, module, augment, &mut hasher);
    }
    hasher.finish()
}

fn hash_statement(nc: &NodeCompiler, module: ModuleId, node: NodeIndex, hasher: &mut DefaultHasher) {
    let p = nc.ctx.module(module).parsed.arena.get(node);
    p.keyword.hash(hasher);
    p.argument.map(|a| nc.ctx.resolve(a).to_string()).hash(hasher);
    let children: Vec<NodeIndex> = nc.ctx.module(module).parsed.arena.children(node).to_vec();
    for child in children {
        hash_statement(nc, module, child, hasher);
    }
}

/// Records `id`'s compiled subtree as a detached template, relative to no
/// particular parent — `instantiate_template` re-parents a clone of it at
/// a later `uses` site instead of recompiling the grouping body.
fn capture_template(nc: &NodeCompiler, roots: &[CNodeId]) -> GroupingTemplate {
    let mut nodes = Vec::new();
    let mut root_locals = Vec::with_capacity(roots.len());
    for &root in roots {
        root_locals.push(capture_node(nc, root, None, &mut nodes));
    }
    GroupingTemplate { roots: root_locals, nodes }
}

fn capture_node(nc: &NodeCompiler, id: CNodeId, parent_local: Option<usize>, nodes: &mut Vec<TemplateNode>) -> usize {
    let cnode = nc.schema.arena.get(id).clone();
    let child_ids: Vec<CNodeId> = cnode.children.to_vec();
    let my_index = nodes.len();
    nodes.push(TemplateNode { node: cnode, parent_local, children_local: Vec::new() });
    let mut child_locals = Vec::with_capacity(child_ids.len());
    for child_id in child_ids {
        child_locals.push(capture_node(nc, child_id, Some(my_index), nodes));
    }
    nodes[my_index].children_local = child_locals;
    my_index
}

/// Clones a cached template into the arena under `new_parent`, returning
/// the freshly allocated top-level node ids in the template's root order.
fn instantiate_template(nc: &mut NodeCompiler, template: &GroupingTemplate, new_parent: Option<CNodeId>) -> Vec<CNodeId> {
    let mut new_ids: Vec<CNodeId> = Vec::with_capacity(template.nodes.len());
    for t in &template.nodes {
        new_ids.push(nc.schema.arena.push(t.node.clone()));
    }
    for (i, t) in template.nodes.iter().enumerate() {
        let parent_id = match t.parent_local {
            Some(p) => Some(new_ids[p]),
            None => new_parent,
        };
        nc.schema.arena.get_mut(new_ids[i]).parent = parent_id;
        let children: ChildList = t.children_local.iter().map(|&c| new_ids[c]).collect();
        nc.schema.arena.get_mut(new_ids[i]).children = children;
    }
    for &root_local in &template.roots {
        if let Some(p) = new_parent {
            nc.schema.arena.add_child(p, new_ids[root_local]);
        }
    }
    template.roots.iter().map(|&r| new_ids[r]).collect()
}

fn resolve_grouping(nc: &mut NodeCompiler, module: ModuleId, text: &str) -> Result<(ModuleId, NodeIndex), Diagnostic> {
    let (prefix, local) = match text.split_once(':') {
        Some((p, n)) => (Some(p), n),
        None => (None, text),
    };
    let target_module = match prefix {
        Some(p) => {
            let prefix_atom = nc.ctx.intern(p);
            nc.ctx
                .module(module)
                .resolve_prefix(prefix_atom)
                .ok_or_else(|| not_found_error(format!("unresolved prefix '{p}' in uses '{text}'")))?
        }
        None => module,
    };
    let local_atom = nc.ctx.intern(local);
    let node = nc
        .ctx
        .module(target_module)
        .table(NamedKind::Grouping)
        .get(local_atom)
        .ok_or_else(|| not_found_error(format!("grouping '{text}' not found")))?;
    Ok((target_module, node))
}

/// refine overlay: a narrow set of fields a `refine` may adjust on an
/// already-inlined node, matched by descendant path relative to the `uses`
/// site. `description`/`reference` aren't modeled on `CNode` (no field
/// carries them), so refines of those two are accepted syntactically and
/// have no effect — documentation-only statements the compiled tree never
/// needed to retain.
fn apply_refine(
    nc: &mut NodeCompiler,
    module: ModuleId,
    refine: NodeIndex,
    anchor: Option<CNodeId>,
    inlined: &[CNodeId],
) -> Result<(), Diagnostic> {
    let path_text = nc
        .ctx
        .module(module)
        .parsed
        .arena
        .get(refine)
        .argument
        .map(|a| nc.ctx.resolve(a).to_string())
        .unwrap_or_default();
    let roots: Vec<CNodeId> = match anchor {
        Some(p) => nc.schema.arena.get(p).children.to_vec(),
        None => inlined.to_vec(),
    };
    let target = find_by_local_path(nc, &roots, &path_text)
        .ok_or_else(|| not_found_error(format!("refine target '{path_text}' not found")))?;

    let children: Vec<NodeIndex> = nc.ctx.module(module).parsed.arena.children(refine).to_vec();
    for child in children {
        let p = nc.ctx.module(module).parsed.arena.get(child);
        let kw = p.keyword;
        let arg = p.argument;
        match kw {
            Keyword::Default => nc.schema.arena.get_mut(target).default = arg,
            Keyword::Config => {
                if let Some(a) = arg {
                    nc.schema.arena.get_mut(target).flags.config = nc.ctx.resolve(a) == "true";
                }
            }
            Keyword::Mandatory => {
                if let Some(a) = arg {
                    nc.schema.arena.get_mut(target).flags.mandatory = nc.ctx.resolve(a) == "true";
                }
            }
            Keyword::Presence => nc.schema.arena.get_mut(target).presence = true,
            Keyword::MinElements => {
                if let Some(a) = arg {
                    let text = nc.ctx.resolve(a).to_string();
                    let n: u32 = text.parse().map_err(|_| semantic_error(format!("invalid min-elements in refine: {text}")))?;
                    nc.schema.arena.get_mut(target).min_elements = n;
                }
            }
            Keyword::MaxElements => {
                if let Some(a) = arg {
                    let text = nc.ctx.resolve(a).to_string();
                    nc.schema.arena.get_mut(target).max_elements = if text == "unbounded" {
                        None
                    } else {
                        Some(text.parse().map_err(|_| semantic_error(format!("invalid max-elements in refine: {text}")))?)
                    };
                }
            }
            Keyword::Must => {
                let text = arg.map(|a| nc.ctx.resolve(a).to_string()).unwrap_or_default();
                nc.schema.arena.get_mut(target).must.push(crate::node::XPathAttachment { text, compiled: None });
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::PluginRegistry;
    use crate::node::{CNode, CompiledSchema, NodeKind};
    use std::sync::Arc;
    use yang_ast::{NodeArena, PNode, ParsedModule};
    use yang_binder::{Context, NamedEntityTable};
    use yang_common::{Atom, CompileOptions, Span};

    fn single_module_with(build: impl FnOnce(&mut NodeArena, NodeIndex) -> (NodeIndex, NodeIndex)) -> (Context, ModuleId, NodeIndex, NodeIndex) {
        let mut ctx = Context::new(CompileOptions::default());
        let id = ctx.next_module_id();
        let name = ctx.intern("m");
        let ns = ctx.intern("urn:m");
        let prefix = ctx.intern("m");
        let mut arena = NodeArena::new();
        let root = arena.push(PNode::new(Keyword::Module, Some(name), Span::synthetic()));
        let (uses_node, grouping_node) = build(&mut arena, root);
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
        (ctx, id, uses_node, grouping_node)
    }

    #[test]
    fn expands_grouping_leaf_into_parent() {
        let (mut ctx, module, uses_node, grouping_node) = single_module_with(|arena, root| {
            let grouping_name = arena.get(root).argument;
            let _ = grouping_name;
            let grouping = arena.push(PNode::new(Keyword::Grouping, None, Span::synthetic()));
            arena.add_child(root, grouping);
            let leaf = arena.push(PNode::new(Keyword::Leaf, None, Span::synthetic()));
            let ty = arena.push(PNode::new(Keyword::Type, None, Span::synthetic()));
            arena.add_child(leaf, ty);
            arena.add_child(grouping, leaf);
            let uses = arena.push(PNode::new(Keyword::Uses, None, Span::synthetic()));
            arena.add_child(root, uses);
            (uses, grouping)
        });

        let g_name = ctx.intern("g");
        let leaf_name = ctx.intern("x");
        let string_name = ctx.intern("string");
        std::sync::Arc::get_mut(&mut ctx.module_mut(module).parsed).unwrap().arena.get_mut(grouping_node).argument = Some(g_name);
        ctx.module_mut(module).groupings.insert(g_name, grouping_node);
        std::sync::Arc::get_mut(&mut ctx.module_mut(module).parsed).unwrap().arena.get_mut(uses_node).argument = Some(g_name);
        let leaf_node = ctx.module(module).parsed.arena.children(grouping_node)[0];
        std::sync::Arc::get_mut(&mut ctx.module_mut(module).parsed).unwrap().arena.get_mut(leaf_node).argument = Some(leaf_name);
        let type_node = ctx.module(module).parsed.arena.children(leaf_node)[0];
        std::sync::Arc::get_mut(&mut ctx.module_mut(module).parsed).unwrap().arena.get_mut(type_node).argument = Some(string_name);

        let mut schema = CompiledSchema::new();
        let registry = PluginRegistry::with_builtins();
        let parent_id = schema.arena.push(CNode::new(NodeKind::Container, Atom::EMPTY, module, None));
        let mut nc = NodeCompiler { ctx: &mut ctx, schema: &mut schema, registry: &registry };
        expand_uses(&mut nc, module, uses_node, Some(parent_id), InheritedState::default()).unwrap();

        assert_eq!(schema.arena.get(parent_id).children.len(), 1);
        let child = schema.arena.get(parent_id).children[0];
        assert_eq!(schema.arena.get(child).name, leaf_name);
    }

    #[test]
    fn repeated_no_overlay_uses_shares_one_cache_entry() {
        let mut ctx = Context::new(CompileOptions::default());
        let module = ctx.next_module_id();
        let name = ctx.intern("m");
        let ns = ctx.intern("urn:m");
        let prefix = ctx.intern("m");
        let mut arena = NodeArena::new();
        let root = arena.push(PNode::new(Keyword::Module, Some(name), Span::synthetic()));

        let grouping = arena.push(PNode::new(Keyword::Grouping, None, Span::synthetic()));
        arena.add_child(root, grouping);
        let leaf = arena.push(PNode::new(Keyword::Leaf, None, Span::synthetic()));
        let ty = arena.push(PNode::new(Keyword::Type, None, Span::synthetic()));
        arena.add_child(leaf, ty);
        arena.add_child(grouping, leaf);
        let uses_a = arena.push(PNode::new(Keyword::Uses, None, Span::synthetic()));
        arena.add_child(root, uses_a);
        let uses_b = arena.push(PNode::new(Keyword::Uses, None, Span::synthetic()));
        arena.add_child(root, uses_b);

        let module_rec = yang_binder::Module {
            id: module,
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
        ctx.register_module(module_rec).unwrap();

        let g_name = ctx.intern("g");
        let leaf_name = ctx.intern("x");
        let string_name = ctx.intern("string");
        std::sync::Arc::get_mut(&mut ctx.module_mut(module).parsed).unwrap().arena.get_mut(grouping).argument = Some(g_name);
        ctx.module_mut(module).groupings.insert(g_name, grouping);
        std::sync::Arc::get_mut(&mut ctx.module_mut(module).parsed).unwrap().arena.get_mut(uses_a).argument = Some(g_name);
        std::sync::Arc::get_mut(&mut ctx.module_mut(module).parsed).unwrap().arena.get_mut(uses_b).argument = Some(g_name);
        let leaf_node = ctx.module(module).parsed.arena.children(grouping)[0];
        std::sync::Arc::get_mut(&mut ctx.module_mut(module).parsed).unwrap().arena.get_mut(leaf_node).argument = Some(leaf_name);
        let type_node = ctx.module(module).parsed.arena.children(leaf_node)[0];
        std::sync::Arc::get_mut(&mut ctx.module_mut(module).parsed).unwrap().arena.get_mut(type_node).argument = Some(string_name);

        let mut schema = CompiledSchema::new();
        let registry = PluginRegistry::with_builtins();
        let container_a = schema.arena.push(CNode::new(NodeKind::Container, Atom::EMPTY, module, None));
        let container_b = schema.arena.push(CNode::new(NodeKind::Container, leaf_name, module, None));
        let mut nc = NodeCompiler { ctx: &mut ctx, schema: &mut schema, registry: &registry };
        expand_uses(&mut nc, module, uses_a, Some(container_a), InheritedState::default()).unwrap();
        expand_uses(&mut nc, module, uses_b, Some(container_b), InheritedState::default()).unwrap();

        assert_eq!(schema.uses_cache.len(), 1);
        let child_a = schema.arena.get(container_a).children[0];
        let child_b = schema.arena.get(container_b).children[0];
        assert_eq!(schema.arena.get(child_a).name, leaf_name);
        assert_eq!(schema.arena.get(child_b).name, leaf_name);
        assert_ne!(child_a, child_b);
        assert_eq!(schema.arena.get(child_a).parent, Some(container_a));
        assert_eq!(schema.arena.get(child_b).parent, Some(container_b));
    }

    #[test]
    fn unresolved_grouping_name_is_not_found() {
        let (mut ctx, module, uses_node, _grouping_node) = single_module_with(|arena, root| {
            let uses = arena.push(PNode::new(Keyword::Uses, None, Span::synthetic()));
            arena.add_child(root, uses);
            (uses, root)
        });
        let missing = ctx.intern("missing");
        std::sync::Arc::get_mut(&mut ctx.module_mut(module).parsed).unwrap().arena.get_mut(uses_node).argument = Some(missing);

        let mut schema = CompiledSchema::new();
        let registry = PluginRegistry::with_builtins();
        let mut nc = NodeCompiler { ctx: &mut ctx, schema: &mut schema, registry: &registry };
        let result = expand_uses(&mut nc, module, uses_node, None, InheritedState::default());
        assert!(result.is_err());
    }
}
