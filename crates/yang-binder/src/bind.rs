//! Turns one already-parsed P-tree into a registered `Module` ("Module
//! load"): reads `namespace`/`prefix`/`revision`, resolves `import`/
//! `include` against modules already in the `Context`, links `belongs-to`,
//! and populates the typedef/grouping/identity/feature/extension name
//! tables C2 searches.
//!
//! File discovery and the textual parser are out of scope (Non-goals);
//! callers are expected to have already parsed every transitively
//! imported/included module and to call `bind_module` in dependency order
//! (or to resolve missing imports themselves via
//! `Context::install_import_callback` before binding).

use std::sync::Arc;

use yang_ast::{Keyword, NodeArena, NodeIndex, ParsedModule};
use yang_common::{Atom, Diagnostic, DiagnosticKind, YangVersion};

use crate::context::Context;
use crate::module::{Import, Module, ModuleId, NamedKind};
use crate::named::NamedEntityTable;

fn syntax_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::Syntax, "<module>", detail.into())
}

fn not_found_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::NotFound, "<module>", detail.into())
}

fn exists_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::Exists, "<module>", detail.into())
}

fn argument_of(arena: &NodeArena, node: NodeIndex) -> Option<Atom> {
    arena.get(node).argument
}

fn first_child_argument(arena: &NodeArena, parent: NodeIndex, keyword: Keyword) -> Option<Atom> {
    arena.children_of_kind(parent, keyword).next().and_then(|n| argument_of(arena, n))
}

/// A module with no `yang-version` statement is YANG 1.0 (RFC 7950
/// §7.1.2); one present is either `"1"` or `"1.1"`, falling back to the
/// compile's configured default on anything else.
fn resolve_yang_version(ctx: &Context, arena: &NodeArena, root: NodeIndex) -> YangVersion {
    match first_child_argument(arena, root, Keyword::YangVersion).map(|a| ctx.resolve(a).to_string()) {
        Some(text) if text == "1.1" => YangVersion::V1_1,
        Some(text) if text == "1" => YangVersion::V1_0,
        Some(_) => ctx.options.default_yang_version,
        None => ctx.options.default_yang_version,
    }
}

/// Every `typedef`/`grouping`/`identity`/`feature`/`extension` declared
/// anywhere under `root`, regardless of nesting depth. the search scope
/// for these five partitions is "the whole module" rather than lexical
/// block scope (the same flattening the type compiler and the grouping
/// expander already rely on for typedef/grouping lookup), so binding
/// collects them with one full-tree walk instead of tracking block scope.
fn collect_named_declarations(arena: &NodeArena, root: NodeIndex) -> Vec<(Keyword, Atom, NodeIndex)> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        for &child in arena.children(node) {
            let p = arena.get(child);
            if let Some(name) = p.argument {
                if matches!(
                    p.keyword,
                    Keyword::Typedef | Keyword::Grouping | Keyword::Identity | Keyword::Feature | Keyword::Extension
                ) {
                    out.push((p.keyword, name, child));
                }
            }
            stack.push(child);
        }
    }
    out
}

fn named_kind_of(keyword: Keyword) -> NamedKind {
    match keyword {
        Keyword::Typedef => NamedKind::Typedef,
        Keyword::Grouping => NamedKind::Grouping,
        Keyword::Identity => NamedKind::Identity,
        Keyword::Feature => NamedKind::Feature,
        Keyword::Extension => NamedKind::Extension,
        other => unreachable!("collect_named_declarations only yields the five named kinds, got {other:?}"),
    }
}

/// Bind `parsed` into a `Module` and register it with `ctx`, returning its
/// new `ModuleId`. `implemented` marks this the module a caller actually
/// wants compiled, as opposed to one pulled in purely to satisfy an
/// `import` ("at most one revision of a module is `implemented`").
pub fn bind_module(ctx: &mut Context, parsed: Arc<ParsedModule>, implemented: bool) -> Result<ModuleId, Diagnostic> {
    let arena = &parsed.arena;
    let root = parsed.root;
    let root_node = arena.get(root);
    if !matches!(root_node.keyword, Keyword::Module | Keyword::Submodule) {
        return Err(syntax_error("expected a module or submodule root statement"));
    }
    let is_submodule = root_node.keyword == Keyword::Submodule;
    let name = root_node.argument.ok_or_else(|| syntax_error("module statement missing a name argument"))?;

    let namespace = if is_submodule {
        Atom::EMPTY
    } else {
        first_child_argument(arena, root, Keyword::Namespace)
            .ok_or_else(|| syntax_error("module missing a namespace statement"))?
    };
    let own_prefix = first_child_argument(arena, root, Keyword::Prefix).unwrap_or(Atom::EMPTY);
    let revision = first_child_argument(arena, root, Keyword::Revision);
    let yang_version = resolve_yang_version(ctx, arena, root);

    let mut imports = Vec::new();
    for import_node in arena.children_of_kind(root, Keyword::Import).collect::<Vec<_>>() {
        let imported_name = argument_of(arena, import_node)
            .ok_or_else(|| syntax_error("import statement missing a module name argument"))?;
        let prefix = first_child_argument(arena, import_node, Keyword::Prefix)
            .ok_or_else(|| syntax_error("import missing a prefix statement"))?;
        let revision_date = first_child_argument(arena, import_node, Keyword::RevisionDate);
        let target = ctx
            .find_module(imported_name, revision_date)
            .ok_or_else(|| not_found_error(format!("import of unknown module: {}", ctx.resolve(imported_name))))?;
        imports.push(Import { prefix, module: target.id });
    }

    let mut includes = Vec::new();
    for include_node in arena.children_of_kind(root, Keyword::Include).collect::<Vec<_>>() {
        let included_name = argument_of(arena, include_node)
            .ok_or_else(|| syntax_error("include statement missing a submodule name argument"))?;
        let revision_date = first_child_argument(arena, include_node, Keyword::RevisionDate);
        let target = ctx
            .find_module(included_name, revision_date)
            .ok_or_else(|| not_found_error(format!("include of unknown submodule: {}", ctx.resolve(included_name))))?;
        includes.push(target.id);
    }

    let belongs_to = if is_submodule {
        let parent_name = first_child_argument(arena, root, Keyword::BelongsTo)
            .ok_or_else(|| syntax_error("submodule missing a belongs-to statement"))?;
        let parent = ctx
            .find_module(parent_name, None)
            .ok_or_else(|| not_found_error(format!("belongs-to references unknown module: {}", ctx.resolve(parent_name))))?;
        Some(parent.id)
    } else {
        None
    };

    let id = ctx.next_module_id();
    let mut module = Module {
        id,
        name,
        namespace,
        revision,
        own_prefix,
        imports,
        includes,
        belongs_to,
        implemented,
        latest_revision: false,
        yang_version,
        typedefs: NamedEntityTable::new(),
        groupings: NamedEntityTable::new(),
        identities: NamedEntityTable::new(),
        features: NamedEntityTable::new(),
        extensions: NamedEntityTable::new(),
        parsed: parsed.clone(),
    };

    for (keyword, decl_name, node) in collect_named_declarations(arena, root) {
        let kind = named_kind_of(keyword);
        if let Some(previous) = module.table_mut(kind).insert(decl_name, node) {
            let _ = previous;
            return Err(exists_error(format!(
                "duplicate {:?} declaration: {}",
                kind,
                ctx.resolve(decl_name)
            )));
        }
    }

    ctx.register_module(module)
}
