//! Public facade for the YANG schema compiler.
//!
//! Wires the Context & Dictionary / Reference Resolver layer
//! (`yang-binder`), the Type Compiler (`yang-solver`), and the Node
//! Compiler through Final Validation Pass layer (`yang-checker`) into a
//! single pipeline: bind each parsed module, declare identities, check the
//! feature dependency graph, compile every implemented module's data
//! tree, apply top-level augments and deviations, then run the final
//! validation sweep (leafref resolution, `must`/`when` compilation, list
//! key/unique checks).

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, span, Level};

use yang_ast::{Keyword, NodeIndex, ParsedModule};
use yang_binder::{ModuleId, NamedKind};
use yang_common::{Atom, CompileError, CompileOptions, Diagnostic, DiagnosticKind, Diagnostics};
use yang_checker::feature::IfFeatureExpr;
use yang_solver::IdentityId;
use yang_xpath::{DefaultXPathCompiler, XPathCompiler};

pub use yang_binder::FeatureState;
pub use yang_checker::{
    CNode, CNodeArena, CNodeId, CompiledSchema, ExtensionInstance, ExtensionPlugin, Flags, NodeKind, PluginEffect,
    Status, XPathAttachment,
};
pub use yang_common::{DiagnosticKind as Kind, Severity};
pub use yang_solver::{CompiledType, TypeId, TypeStore};

/// The compiler's single public entry point: a set of bound modules plus
/// (after `compile`) the schema tree built from them.
pub struct Context {
    binder: yang_binder::Context,
    schema: CompiledSchema,
    registry: yang_checker::PluginRegistry,
    xpath: Box<dyn XPathCompiler>,
    diagnostics: Diagnostics,
    implemented: Vec<ModuleId>,
}

impl Context {
    pub fn new(options: CompileOptions) -> Self {
        Context {
            binder: yang_binder::Context::new(options),
            schema: CompiledSchema::new(),
            registry: yang_checker::PluginRegistry::with_builtins(),
            xpath: Box::new(DefaultXPathCompiler),
            diagnostics: Diagnostics::new(),
            implemented: Vec::new(),
        }
    }

    /// Swap in a real XPath engine for `must`/`when`/leafref-path
    /// compilation; the built-in default only checks balanced brackets.
    pub fn with_xpath_compiler(mut self, xpath: Box<dyn XPathCompiler>) -> Self {
        self.xpath = xpath;
        self
    }

    /// Register a host-supplied extension plugin alongside the built-in
    /// NACM `default-deny-write`/`default-deny-all` pair.
    pub fn register_extension_plugin(
        &mut self,
        module_name: impl Into<String>,
        extension_name: impl Into<String>,
        plugin: Box<dyn ExtensionPlugin>,
    ) {
        self.registry.register(module_name, extension_name, plugin);
    }

    pub fn intern(&mut self, text: &str) -> Atom {
        self.binder.intern(text)
    }

    pub fn resolve(&self, atom: Atom) -> &str {
        self.binder.resolve(atom)
    }

    pub fn dictionary_mut(&mut self) -> &mut yang_common::Interner {
        self.binder.dictionary_mut()
    }

    pub fn set_feature(&mut self, module: ModuleId, name: Atom, enabled: bool) {
        self.binder.set_feature(module, name, enabled);
    }

    pub fn add_searchpath(&mut self, path: impl Into<String>) {
        self.binder.add_searchpath(path);
    }

    pub fn install_import_callback<F>(&mut self, callback: F)
    where
        F: Fn(&str, Option<&str>) -> Option<ParsedModule> + 'static,
    {
        self.binder.install_import_callback(callback);
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn schema(&self) -> &CompiledSchema {
        &self.schema
    }

    pub fn module(&self, id: ModuleId) -> &yang_binder::Module {
        self.binder.module(id)
    }

    /// Bind one already-parsed module into this context. Imports and
    /// includes must already be bound — the textual parser and file
    /// discovery that would normally feed modules in dependency order are
    /// out of scope here (callers wire their own loader through
    /// `install_import_callback` or load in topological order directly).
    pub fn load_module(&mut self, parsed: Arc<ParsedModule>, implemented: bool) -> Result<ModuleId, CompileError> {
        let _span = span!(Level::DEBUG, "load_module").entered();
        let id = yang_binder::bind_module(&mut self.binder, parsed, implemented)?;
        if implemented {
            self.implemented.push(id);
        }
        debug!(module = ?id, implemented, "module bound");
        Ok(id)
    }

    /// Run the full compile pipeline over every bound module: identities,
    /// the feature dependency graph, each implemented module's data tree,
    /// then global augment/deviation application and the final validation
    /// sweep ("module load, identities/features/typedefs, recursive
    /// data-tree compile, final sweep").
    pub fn compile(&mut self) -> Result<(), CompileError> {
        let _span = span!(Level::DEBUG, "compile").entered();
        self.declare_identities()?;
        self.check_feature_dag()?;

        let implemented = self.implemented.clone();
        {
            let mut nc = yang_checker::NodeCompiler {
                ctx: &mut self.binder,
                schema: &mut self.schema,
                registry: &self.registry,
            };
            for &module in &implemented {
                let _span = span!(Level::DEBUG, "compile_module", module = ?module).entered();
                nc.compile_module_body(module)?;
            }
            debug!(count = implemented.len(), "module bodies compiled");

            yang_checker::apply_all_top_level_augments(&mut nc, &implemented)?;
            yang_checker::apply_all_deviations(&mut nc, &implemented)?;
            debug!("augments and deviations applied");

            yang_checker::run_final_validation(&mut nc, self.xpath.as_ref())?;
            debug!("final validation pass complete");
        }
        Ok(())
    }

    /// Populate the shared identity base graph ("Identity") from every
    /// bound module's `identity` declarations, two passes: declare every
    /// identity first (so forward references to an as-yet-unprocessed
    /// identity resolve), then wire `base` edges and check the closure for
    /// cycles.
    fn declare_identities(&mut self) -> Result<(), CompileError> {
        let _span = span!(Level::DEBUG, "declare_identities").entered();
        let module_count = self.binder.modules().len();
        let mut ids: FxHashMap<(ModuleId, Atom), IdentityId> = FxHashMap::default();

        for i in 0..module_count {
            let module = ModuleId(i as u32);
            let decls: Vec<(Atom, NodeIndex)> = self.binder.module(module).table(NamedKind::Identity).iter().collect();
            for (name, _node) in decls {
                let id = self.schema.identities.declare(module, name);
                ids.insert((module, name), id);
            }
        }

        for i in 0..module_count {
            let module = ModuleId(i as u32);
            let decls: Vec<(Atom, NodeIndex)> = self.binder.module(module).table(NamedKind::Identity).iter().collect();
            for (name, node) in decls {
                let base_texts: Vec<String> = self
                    .binder
                    .module(module)
                    .parsed
                    .arena
                    .children_of_kind(node, Keyword::Base)
                    .filter_map(|b| self.binder.module(module).parsed.arena.get(b).argument)
                    .map(|a| self.binder.resolve(a).to_string())
                    .collect();

                let mut bases = Vec::new();
                for text in base_texts {
                    let (prefix_text, local_text) = match text.split_once(':') {
                        Some((p, l)) => (Some(p.to_string()), l.to_string()),
                        None => (None, text.clone()),
                    };
                    let base_module = match prefix_text {
                        Some(p) => {
                            let prefix_atom = self.binder.intern(&p);
                            self.binder
                                .module(module)
                                .resolve_prefix(prefix_atom)
                                .ok_or_else(|| Diagnostic::error(DiagnosticKind::Reference, "<identity>", format!("unresolved prefix in base: {text}")))?
                        }
                        None => module,
                    };
                    let local_atom = self.binder.intern(&local_text);
                    let base_id = ids
                        .get(&(base_module, local_atom))
                        .copied()
                        .ok_or_else(|| Diagnostic::error(DiagnosticKind::NotFound, "<identity>", format!("unknown base identity: {text}")))?;
                    bases.push(base_id);
                }

                let id = ids[&(module, name)];
                self.schema.identities.add_bases(id, bases)?;
            }
        }

        for &id in ids.values() {
            self.schema.identities.closure(id)?;
        }
        Ok(())
    }

    /// Features form a DAG; a cycle among `if-feature` guards is a `cycle`
    /// diagnostic. Builds the dependency graph from each declared
    /// feature's own guards and checks it before any node compilation
    /// runs.
    fn check_feature_dag(&mut self) -> Result<(), CompileError> {
        let _span = span!(Level::DEBUG, "check_feature_dag").entered();
        let module_count = self.binder.modules().len();
        let mut edges: FxHashMap<Atom, Vec<Atom>> = FxHashMap::default();

        for i in 0..module_count {
            let module = ModuleId(i as u32);
            let decls: Vec<(Atom, NodeIndex)> = self.binder.module(module).table(NamedKind::Feature).iter().collect();
            for (name, node) in decls {
                let guard_texts: Vec<String> = self
                    .binder
                    .module(module)
                    .parsed
                    .arena
                    .children_of_kind(node, Keyword::IfFeature)
                    .filter_map(|g| self.binder.module(module).parsed.arena.get(g).argument)
                    .map(|a| self.binder.resolve(a).to_string())
                    .collect();

                let mut deps = Vec::new();
                for text in guard_texts {
                    let expr = yang_checker::feature::parse_if_feature(&text, &mut self.binder)?;
                    collect_feature_names(&expr, &mut deps);
                }
                edges.entry(name).or_default().extend(deps);
            }
        }

        yang_checker::check_feature_dag(&edges)?;
        Ok(())
    }
}

fn collect_feature_names(expr: &IfFeatureExpr, out: &mut Vec<Atom>) {
    match expr {
        IfFeatureExpr::Name(name) => out.push(*name),
        IfFeatureExpr::Not(inner) => collect_feature_names(inner, out),
        IfFeatureExpr::And(a, b) | IfFeatureExpr::Or(a, b) => {
            collect_feature_names(a, out);
            collect_feature_names(b, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use yang_ast::builders::{extension_instance, leaf_stmt, stmt};
    use yang_ast::NodeArena;
    use yang_binder::SchemaTreeView;
    use yang_common::Interner;

    /// Builds a P-tree using a `Context`'s own interner (via
    /// `dictionary_mut`), so every `Atom` the tree carries resolves
    /// correctly once the module is bound into that same context.
    struct Builder<'a> {
        interner: &'a mut Interner,
        arena: NodeArena,
    }

    impl<'a> Builder<'a> {
        fn new(interner: &'a mut Interner) -> Self {
            Builder { interner, arena: NodeArena::new() }
        }

        fn stmt(&mut self, keyword: Keyword, argument: Option<&str>, children: Vec<NodeIndex>) -> NodeIndex {
            stmt(&mut self.arena, self.interner, keyword, argument, children)
        }

        fn leaf_stmt(&mut self, keyword: Keyword, argument: &str) -> NodeIndex {
            leaf_stmt(&mut self.arena, self.interner, keyword, argument)
        }

        fn module(self, name: &str, namespace_and_prefix: (&str, &str), mut children: Vec<NodeIndex>) -> (NodeArena, NodeIndex) {
            let mut arena = self.arena;
            let interner = self.interner;
            let ns = leaf_stmt(&mut arena, interner, Keyword::Namespace, namespace_and_prefix.0);
            let prefix = leaf_stmt(&mut arena, interner, Keyword::Prefix, namespace_and_prefix.1);
            let mut all = vec![ns, prefix];
            all.append(&mut children);
            let root = stmt(&mut arena, interner, Keyword::Module, Some(name), all);
            (arena, root)
        }
    }

    fn string_leaf(b: &mut Builder, name: &str) -> NodeIndex {
        let ty = b.leaf_stmt(Keyword::Type, "string");
        b.stmt(Keyword::Leaf, Some(name), vec![ty])
    }

    #[test]
    fn compiles_a_minimal_module_with_a_container_and_leaf() {
        let mut ctx = Context::new(CompileOptions::default());
        let (arena, root) = {
            let mut b = Builder::new(ctx.dictionary_mut());
            let leaf = string_leaf(&mut b, "name");
            let container = b.stmt(Keyword::Container, Some("top"), vec![leaf]);
            b.module("acme", ("urn:acme", "acme"), vec![container])
        };

        let parsed = Arc::new(ParsedModule::new(arena, root));
        let module = ctx.load_module(parsed, true).unwrap();
        ctx.compile().unwrap();

        let top_level = ctx.schema().module_top_level(module);
        assert_eq!(top_level.len(), 1);
        let top_node = ctx.schema().arena.get(top_level[0]);
        assert_eq!(top_node.kind, NodeKind::Container);
        assert_eq!(top_node.children.len(), 1);
    }

    #[test]
    fn feature_gated_node_is_absent_when_feature_is_disabled() {
        let mut ctx = Context::new(CompileOptions::default());
        let (arena, root) = {
            let mut b = Builder::new(ctx.dictionary_mut());
            let feature = b.stmt(Keyword::Feature, Some("extra"), vec![]);
            let guard = b.leaf_stmt(Keyword::IfFeature, "extra");
            let gated_type = b.leaf_stmt(Keyword::Type, "string");
            let gated_leaf = b.stmt(Keyword::Leaf, Some("extra-leaf"), vec![guard, gated_type]);
            let plain_leaf = string_leaf(&mut b, "always");
            let container = b.stmt(Keyword::Container, Some("top"), vec![feature, gated_leaf, plain_leaf]);
            b.module("acme", ("urn:acme", "acme"), vec![container])
        };

        let parsed = Arc::new(ParsedModule::new(arena, root));
        let module = ctx.load_module(parsed, true).unwrap();
        ctx.compile().unwrap();

        let top_level = ctx.schema().module_top_level(module);
        let top_node = ctx.schema().arena.get(top_level[0]);
        assert_eq!(top_node.children.len(), 1);
        let only_child = ctx.schema().arena.get(top_node.children[0]);
        assert_eq!(ctx.resolve(only_child.name), "always");
    }

    #[test]
    fn enabling_a_feature_admits_its_gated_node() {
        let mut ctx = Context::new(CompileOptions::default());
        let (arena, root) = {
            let mut b = Builder::new(ctx.dictionary_mut());
            let feature = b.stmt(Keyword::Feature, Some("extra"), vec![]);
            let guard = b.leaf_stmt(Keyword::IfFeature, "extra");
            let gated_type = b.leaf_stmt(Keyword::Type, "string");
            let gated_leaf = b.stmt(Keyword::Leaf, Some("extra-leaf"), vec![guard, gated_type]);
            let container = b.stmt(Keyword::Container, Some("top"), vec![feature, gated_leaf]);
            b.module("acme", ("urn:acme", "acme"), vec![container])
        };

        let parsed = Arc::new(ParsedModule::new(arena, root));
        let feature_atom = ctx.intern("extra");
        let module = ctx.load_module(parsed, true).unwrap();
        ctx.set_feature(module, feature_atom, true);
        ctx.compile().unwrap();

        let top_level = ctx.schema().module_top_level(module);
        let top_node = ctx.schema().arena.get(top_level[0]);
        assert_eq!(top_node.children.len(), 1);
    }

    #[test]
    fn identity_base_chain_resolves_across_the_context() {
        let mut ctx = Context::new(CompileOptions::default());
        let (arena, root) = {
            let mut b = Builder::new(ctx.dictionary_mut());
            let base = b.stmt(Keyword::Base, Some("animal"), vec![]);
            let animal = b.stmt(Keyword::Identity, Some("animal"), vec![]);
            let dog = b.stmt(Keyword::Identity, Some("dog"), vec![base]);
            let leaf_type = b.leaf_stmt(Keyword::Type, "string");
            let leaf = b.stmt(Keyword::Leaf, Some("noop"), vec![leaf_type]);
            b.module("acme", ("urn:acme", "acme"), vec![animal, dog, leaf])
        };

        let parsed = Arc::new(ParsedModule::new(arena, root));
        ctx.load_module(parsed, true).unwrap();
        ctx.compile().unwrap();

        let animal_atom = ctx.intern("animal");
        let dog_atom = ctx.intern("dog");
        let module = ModuleId(0);
        let animal_id = ctx.schema().identities.find(module, animal_atom).unwrap();
        let dog_id = ctx.schema().identities.find(module, dog_atom).unwrap();
        assert!(ctx.schema().identities.is_derived_from(dog_id, animal_id).unwrap());
    }

    #[test]
    fn cyclic_identity_base_is_rejected() {
        let mut ctx = Context::new(CompileOptions::default());
        let (arena, root) = {
            let mut b = Builder::new(ctx.dictionary_mut());
            let base_a = b.stmt(Keyword::Base, Some("b"), vec![]);
            let a = b.stmt(Keyword::Identity, Some("a"), vec![base_a]);
            let base_b = b.stmt(Keyword::Base, Some("a"), vec![]);
            let bb = b.stmt(Keyword::Identity, Some("b"), vec![base_b]);
            b.module("acme", ("urn:acme", "acme"), vec![a, bb])
        };

        let parsed = Arc::new(ParsedModule::new(arena, root));
        ctx.load_module(parsed, true).unwrap();
        assert!(ctx.compile().is_err());
    }

    #[test]
    fn extension_instance_is_dispatched_during_compile() {
        let mut ctx = Context::new(CompileOptions::default());

        let (nacm_arena, nacm_root) = {
            let mut nb = Builder::new(ctx.dictionary_mut());
            let probe_type = nb.leaf_stmt(Keyword::Type, "string");
            let probe = nb.stmt(Keyword::Leaf, Some("probe"), vec![probe_type]);
            nb.module("ietf-netconf-acm", ("urn:ietf:nacm", "nacm"), vec![probe])
        };
        ctx.load_module(Arc::new(ParsedModule::new(nacm_arena, nacm_root)), false).unwrap();

        let (arena, root) = {
            let mut b = Builder::new(ctx.dictionary_mut());
            let tag = extension_instance(&mut b.arena, b.interner, "nacm", "default-deny-write", None, vec![]);
            let leaf_type = b.leaf_stmt(Keyword::Type, "string");
            let leaf = b.stmt(Keyword::Leaf, Some("secret"), vec![leaf_type]);
            let container = b.stmt(Keyword::Container, Some("top"), vec![tag, leaf]);
            let import_prefix = b.leaf_stmt(Keyword::Prefix, "nacm");
            let import = b.stmt(Keyword::Import, Some("ietf-netconf-acm"), vec![import_prefix]);
            b.module("acme", ("urn:acme", "acme"), vec![import, container])
        };

        let parsed = Arc::new(ParsedModule::new(arena, root));
        let module = ctx.load_module(parsed, true).unwrap();
        ctx.compile().unwrap();

        let top_level = ctx.schema().module_top_level(module);
        let top_node = ctx.schema().arena.get(top_level[0]);
        let leaf_id = top_node.children[0];
        let leaf_node = ctx.schema().arena.get(leaf_id);
        assert!(leaf_node.extensions.iter().any(|e| e.synthesized));
    }
}
