//! Type reference compilation: walks a `type` statement, resolving through
//! any typedef chain, composing restrictions along the way.

use yang_ast::{Keyword, NodeIndex};
use yang_binder::{Context, ModuleId, NamedKind};
use yang_common::{limits, Atom, Diagnostic, DiagnosticKind, IntervalSet, Span, YangVersion};

use crate::domain::BaseType;
use crate::restrictions::{compose_union, BitValue, EnumValue, LeafrefRestriction, PatternRestriction, Restriction};
use crate::types::{TypeId, TypeStore};

/// A `type` statement to compile, identified by the module that owns the
/// P-tree it lives in (needed to resolve the prefix on its argument) and
/// the node itself.
#[derive(Clone, Copy, Debug)]
pub struct RawTypeRef {
    pub module: ModuleId,
    pub node: NodeIndex,
}

/// Threads the binder `Context` and the solver's `TypeStore` through a
/// typedef-chain walk, tracking chain depth to enforce
/// `limits::MAX_TYPEDEF_CHAIN_DEPTH` ("Bounded typedef chains").
pub struct TypeCompileContext<'a> {
    pub ctx: &'a Context,
    pub store: &'a mut TypeStore,
}

impl<'a> TypeCompileContext<'a> {
    /// The `yang-version` of the module that owns a `type` statement,
    /// read off its bound `Module` rather than cached here, so a typedef
    /// chain that crosses modules gates each union on its own declaring
    /// module rather than the use site's.
    fn yang_version(&self, module: ModuleId) -> YangVersion {
        self.ctx.module(module).yang_version
    }
}

fn syntax_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::Syntax, "<type>", detail.into())
}

fn not_found_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::NotFound, "<type>", detail.into())
}

fn cycle_error(detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::Cycle, "<type>", detail.into())
}

/// Split `"pfx:id"`/`"id"` and look both parts up in the already-populated
/// dictionary. Every legal prefix or identifier here was interned when its
/// declaring statement (`prefix`, `import`, `typedef`, `identity`, ...) was
/// bound, so a lookup miss means the reference itself is bogus rather than
/// a dictionary gap — the type compiler never needs write access to intern
/// new text, only the `Context` it borrows immutably.
fn lookup_qname(text: &str, ctx: &Context) -> Option<(Option<Atom>, Atom)> {
    match text.split_once(':') {
        Some((prefix, local)) => Some((Some(ctx.dictionary().get(prefix)?), ctx.dictionary().get(local)?)),
        None => Some((None, ctx.dictionary().get(text)?)),
    }
}

/// Entry point: compile `raw` to a `TypeId`, sharing with an already
/// compiled type wherever the sharing rule allows it.
pub fn compile_type(raw: RawTypeRef, tc: &mut TypeCompileContext) -> Result<TypeId, Diagnostic> {
    compile_type_chain(raw, tc, 0)
}

fn compile_type_chain(raw: RawTypeRef, tc: &mut TypeCompileContext, depth: u32) -> Result<TypeId, Diagnostic> {
    if depth > limits::MAX_TYPEDEF_CHAIN_DEPTH {
        return Err(cycle_error("typedef chain exceeds the maximum nesting depth"));
    }

    let module = tc.ctx.module(raw.module);
    let node = module.parsed.arena.get(raw.node);
    let name_atom = node.argument.ok_or_else(|| syntax_error("type statement missing a name argument"))?;
    let name_text = tc.ctx.resolve(name_atom).to_string();

    if let Some(base) = BaseType::from_name(&name_text) {
        let local = collect_restrictions(raw, tc, base, depth)?;
        let builtin = tc.store.builtin(base);
        return tc.store.use_site(builtin, local, node.span);
    }

    let (prefix, local) = lookup_qname(&name_text, tc.ctx)
        .ok_or_else(|| not_found_error(format!("no such typedef: {name_text}")))?;
    let target_module = match prefix {
        Some(prefix) => module
            .resolve_prefix(prefix)
            .ok_or_else(|| not_found_error(format!("unresolved prefix in type reference {name_text}")))?,
        None => raw.module,
    };

    let typedef_node = tc
        .ctx
        .module(target_module)
        .table(NamedKind::Typedef)
        .get(local)
        .ok_or_else(|| not_found_error(format!("no such typedef: {name_text}")))?;

    let type_child = tc
        .ctx
        .module(target_module)
        .parsed
        .arena
        .children_of_kind(typedef_node, Keyword::Type)
        .next()
        .ok_or_else(|| syntax_error("typedef missing its type statement"))?;

    let base_id = compile_type_chain(RawTypeRef { module: target_module, node: type_child }, tc, depth + 1)?;
    let local = {
        let base = tc.store.resolve(base_id).map(|t| t.base).unwrap_or(BaseType::String);
        collect_restrictions(raw, tc, base, depth)?
    };
    tc.store.use_site(base_id, local, node.span)
}

/// Gather every restriction statement directly under `raw`'s `type` node
/// into one `Restriction`, resolving nested `type` branches for `union`
/// members and leaving `leafref`'s path unresolved (that's the job).
fn collect_restrictions(raw: RawTypeRef, tc: &mut TypeCompileContext, base: BaseType, depth: u32) -> Result<Restriction, Diagnostic> {
    let module = tc.ctx.module(raw.module);
    let node = module.parsed.arena.get(raw.node);
    let mut restriction = Restriction::default();

    let (domain_min, domain_max) = base.numeric_domain().unwrap_or((0, 0));

    for child in module.parsed.arena.children(raw.node).to_vec() {
        let child_node = module.parsed.arena.get(child);
        match child_node.keyword {
            Keyword::Range => {
                let text = child_node.argument.map(|a| tc.ctx.resolve(a).to_string()).unwrap_or_default();
                let set = IntervalSet::parse(&text, domain_min, domain_max)
                    .map_err(|e| syntax_error(format!("invalid range: {e}")))?;
                restriction.range = Some(set);
            }
            Keyword::Length => {
                let text = child_node.argument.map(|a| tc.ctx.resolve(a).to_string()).unwrap_or_default();
                let set = IntervalSet::parse(&text, 0, u32::MAX as i128)
                    .map_err(|e| syntax_error(format!("invalid length: {e}")))?;
                restriction.length = Some(set);
            }
            Keyword::Pattern => {
                let pattern = child_node.argument.map(|a| tc.ctx.resolve(a).to_string()).unwrap_or_default();
                let inverted = module
                    .parsed
                    .arena
                    .children_of_kind(child, Keyword::Modifier)
                    .next()
                    .map(|m| tc.ctx.resolve(module.parsed.arena.get(m).argument.unwrap_or_default()) == "invert-match")
                    .unwrap_or(false);
                restriction.patterns.push(PatternRestriction { pattern, inverted });
            }
            Keyword::Enum => {
                let name = child_node.argument.unwrap_or_default();
                let value = module
                    .parsed
                    .arena
                    .children_of_kind(child, Keyword::Value)
                    .next()
                    .and_then(|v| module.parsed.arena.get(v).argument)
                    .map(|a| tc.ctx.resolve(a).parse::<i64>().unwrap_or(0))
                    .unwrap_or(0);
                restriction.enum_values.get_or_insert_with(Vec::new).push(EnumValue { name, value });
            }
            Keyword::Bit => {
                let name = child_node.argument.unwrap_or_default();
                let position = module
                    .parsed
                    .arena
                    .children_of_kind(child, Keyword::Position)
                    .next()
                    .and_then(|p| module.parsed.arena.get(p).argument)
                    .map(|a| tc.ctx.resolve(a).parse::<u32>().unwrap_or(0))
                    .unwrap_or(0);
                restriction.bit_values.get_or_insert_with(Vec::new).push(BitValue { name, position });
            }
            Keyword::FractionDigits => {
                let value = child_node
                    .argument
                    .and_then(|a| tc.ctx.resolve(a).parse::<u8>().ok())
                    .ok_or_else(|| syntax_error("invalid fraction-digits argument"))?;
                restriction.fraction_digits = Some(value);
            }
            Keyword::Path => {
                let path_text = child_node.argument.map(|a| tc.ctx.resolve(a).to_string()).unwrap_or_default();
                let require_instance = restriction.require_instance.unwrap_or(true);
                restriction.leafref = Some(LeafrefRestriction { path_text, require_instance });
            }
            Keyword::RequireInstance => {
                let value = child_node.argument.map(|a| tc.ctx.resolve(a) == "true").unwrap_or(true);
                restriction.require_instance = Some(value);
                if let Some(leafref) = restriction.leafref.as_mut() {
                    leafref.require_instance = value;
                }
            }
            Keyword::Base => {
                let text = child_node.argument.map(|a| tc.ctx.resolve(a).to_string()).unwrap_or_default();
                if let Some((prefix, local)) = lookup_qname(&text, tc.ctx) {
                    let base_module = match prefix {
                        Some(prefix) => module.resolve_prefix(prefix).unwrap_or(raw.module),
                        None => raw.module,
                    };
                    restriction.identity_bases.get_or_insert_with(Vec::new).push((base_module, local));
                }
            }
            Keyword::Type if base == BaseType::Union => {
                let member = compile_type_chain(RawTypeRef { module: raw.module, node: child }, tc, depth + 1)?;
                restriction.union_members.get_or_insert_with(Vec::new).push(member);
            }
            _ => {}
        }
    }

    if let Some(members) = restriction.union_members.take() {
        let member_bases: Vec<BaseType> = members.iter().map(|&m| tc.store.resolve(m).map(|t| t.base).unwrap_or(BaseType::String)).collect();
        let is_yang_1_1 = tc.yang_version(raw.module) == YangVersion::V1_1;
        restriction.union_members = Some(compose_union(members, &member_bases, is_yang_1_1)?);
    }

    Ok(restriction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yang_ast::{NodeArena, ParsedModule, PNode};
    use yang_binder::{Module, NamedEntityTable};
    use yang_common::CompileOptions;

    fn single_module_context(build: impl FnOnce(&mut Context, &mut NodeArena) -> (NodeIndex, yang_common::Atom)) -> (Context, ModuleId, NodeIndex) {
        single_module_context_versioned(yang_common::YangVersion::V1_0, build)
    }

    fn single_module_context_versioned(
        version: yang_common::YangVersion,
        build: impl FnOnce(&mut Context, &mut NodeArena) -> (NodeIndex, yang_common::Atom),
    ) -> (Context, ModuleId, NodeIndex) {
        let mut ctx = Context::new(CompileOptions::default());
        let id = ctx.next_module_id();
        let mut arena = NodeArena::new();
        let name_atom = ctx.intern("acme");
        let root = arena.push(PNode::new(Keyword::Module, Some(name_atom), Span::synthetic()));
        let (type_node, _) = build(&mut ctx, &mut arena);
        let module = Module {
            id,
            name: name_atom,
            namespace: ctx.intern("urn:acme"),
            revision: None,
            own_prefix: ctx.intern("acme"),
            imports: Vec::new(),
            includes: Vec::new(),
            belongs_to: None,
            implemented: true,
            latest_revision: true,
            yang_version: version,
            typedefs: NamedEntityTable::new(),
            groupings: NamedEntityTable::new(),
            identities: NamedEntityTable::new(),
            features: NamedEntityTable::new(),
            extensions: NamedEntityTable::new(),
            parsed: std::sync::Arc::new(ParsedModule::new(arena, root)),
        };
        ctx.register_module(module).unwrap();
        (ctx, id, type_node)
    }

    #[test]
    fn compiles_plain_builtin_type_to_the_shared_handle() {
        let (mut ctx, module_id, type_node) = single_module_context(|ctx, arena| {
            let name = ctx.intern("int32");
            let node = arena.push(PNode::new(Keyword::Type, Some(name), Span::synthetic()));
            (node, name)
        });
        let mut store = TypeStore::new();
        let mut tc = TypeCompileContext { ctx: &mut ctx, store: &mut store };
        let id = compile_type(RawTypeRef { module: module_id, node: type_node }, &mut tc).unwrap();
        assert_eq!(id, store.builtin(BaseType::Int32));
    }

    #[test]
    fn compiles_restricted_builtin_type_to_a_fresh_handle() {
        let (mut ctx, module_id, type_node) = single_module_context(|ctx, arena| {
            let name = ctx.intern("int32");
            let node = arena.push(PNode::new(Keyword::Type, Some(name), Span::synthetic()));
            let range_text = ctx.intern("0..10");
            let range = arena.push(PNode::new(Keyword::Range, Some(range_text), Span::synthetic()));
            arena.add_child(node, range);
            (node, name)
        });
        let mut store = TypeStore::new();
        let mut tc = TypeCompileContext { ctx: &mut ctx, store: &mut store };
        let id = compile_type(RawTypeRef { module: module_id, node: type_node }, &mut tc).unwrap();
        assert_ne!(id, store.builtin(BaseType::Int32));
        assert!(store.resolve(id).unwrap().restriction.range.is_some());
    }

    #[test]
    fn unresolved_typedef_reference_is_not_found() {
        let (mut ctx, module_id, type_node) = single_module_context(|ctx, arena| {
            let name = ctx.intern("no-such-typedef");
            let node = arena.push(PNode::new(Keyword::Type, Some(name), Span::synthetic()));
            (node, name)
        });
        let mut store = TypeStore::new();
        let mut tc = TypeCompileContext { ctx: &mut ctx, store: &mut store };
        let result = compile_type(RawTypeRef { module: module_id, node: type_node }, &mut tc);
        assert!(result.is_err());
    }

    fn union_of_empty_and_string(ctx: &mut Context, arena: &mut NodeArena) -> (NodeIndex, yang_common::Atom) {
        let union_name = ctx.intern("union");
        let node = arena.push(PNode::new(Keyword::Type, Some(union_name), Span::synthetic()));
        let empty_name = ctx.intern("empty");
        let empty_member = arena.push(PNode::new(Keyword::Type, Some(empty_name), Span::synthetic()));
        arena.add_child(node, empty_member);
        let string_name = ctx.intern("string");
        let string_member = arena.push(PNode::new(Keyword::Type, Some(string_name), Span::synthetic()));
        arena.add_child(node, string_member);
        (node, union_name)
    }

    #[test]
    fn union_with_empty_member_is_rejected_before_yang_1_1() {
        let (mut ctx, module_id, type_node) =
            single_module_context_versioned(yang_common::YangVersion::V1_0, union_of_empty_and_string);
        let mut store = TypeStore::new();
        let mut tc = TypeCompileContext { ctx: &mut ctx, store: &mut store };
        let result = compile_type(RawTypeRef { module: module_id, node: type_node }, &mut tc);
        assert!(result.is_err());
    }

    #[test]
    fn union_with_empty_member_is_accepted_under_yang_1_1() {
        let (mut ctx, module_id, type_node) =
            single_module_context_versioned(yang_common::YangVersion::V1_1, union_of_empty_and_string);
        let mut store = TypeStore::new();
        let mut tc = TypeCompileContext { ctx: &mut ctx, store: &mut store };
        let result = compile_type(RawTypeRef { module: module_id, node: type_node }, &mut tc);
        assert!(result.is_ok());
    }
}
