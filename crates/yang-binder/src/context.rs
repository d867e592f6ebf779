//! Context & Dictionary (C1).
//!
//! A process-scope collection of loaded modules plus one interned-string
//! dictionary shared by every module ("Strings compared by identity
//! after interning"). `Context` owns no C-nodes — only the binder-level
//! `Module` records; the checker layers compiled schema trees on top,
//! keyed by `ModuleId`.

use crate::module::{Module, ModuleId};
use rustc_hash::FxHashMap;
use yang_ast::ParsedModule;
use yang_common::{Atom, CompileOptions, Diagnostic, DiagnosticKind, Interner};

/// Tri-valued feature state: a feature's runtime state is either
/// unknown (the owning module isn't loaded at all), or explicitly enabled
/// or disabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureState {
    Unset,
    Enabled,
    Disabled,
}

type ImportCallback = Box<dyn Fn(&str, Option<&str>) -> Option<ParsedModule>>;

pub struct Context {
    dictionary: Interner,
    modules: Vec<Module>,
    by_name: FxHashMap<Atom, Vec<ModuleId>>,
    by_namespace: FxHashMap<Atom, ModuleId>,
    feature_state: FxHashMap<(ModuleId, Atom), bool>,
    search_paths: Vec<String>,
    import_callback: Option<ImportCallback>,
    pub options: CompileOptions,
}

impl Context {
    pub fn new(options: CompileOptions) -> Self {
        Context {
            dictionary: Interner::new(),
            modules: Vec::new(),
            by_name: FxHashMap::default(),
            by_namespace: FxHashMap::default(),
            feature_state: FxHashMap::default(),
            search_paths: Vec::new(),
            import_callback: None,
            options,
        }
    }

    pub fn intern(&mut self, text: &str) -> Atom {
        self.dictionary.intern(text)
    }

    pub fn resolve(&self, atom: Atom) -> &str {
        self.dictionary.resolve(atom)
    }

    pub fn dictionary(&self) -> &Interner {
        &self.dictionary
    }

    pub fn dictionary_mut(&mut self) -> &mut Interner {
        &mut self.dictionary
    }

    pub fn add_searchpath(&mut self, path: impl Into<String>) {
        self.search_paths.push(path.into());
    }

    pub fn searchpaths(&self) -> &[String] {
        &self.search_paths
    }

    pub fn install_import_callback<F>(&mut self, callback: F)
    where
        F: Fn(&str, Option<&str>) -> Option<ParsedModule> + 'static,
    {
        self.import_callback = Some(Box::new(callback));
    }

    pub fn import_callback(&self) -> Option<&ImportCallback> {
        self.import_callback.as_ref()
    }

    /// Register a fully binder-prepared module. Within a context, at most
    /// one revision of a module may be `implemented`. Modules are
    /// committed atomically — a caller building a `Module` that later
    /// fails node compilation must not have called this yet.
    pub fn register_module(&mut self, module: Module) -> Result<ModuleId, Diagnostic> {
        if module.implemented {
            if let Some(existing) = self.by_name.get(&module.name).and_then(|ids| {
                ids.iter()
                    .find(|&&id| self.modules[id.0 as usize].implemented)
            }) {
                let _ = existing;
                return Err(Diagnostic::error(
                    DiagnosticKind::Conflict,
                    self.resolve(module.name).to_string(),
                    "a module with this name already has an implemented revision in this context",
                ));
            }
        }
        let id = module.id;
        self.by_namespace.insert(module.namespace, id);
        self.by_name.entry(module.name).or_default().push(id);
        self.modules.push(module);
        self.recompute_latest_revision(id);
        Ok(id)
    }

    fn recompute_latest_revision(&mut self, just_inserted: ModuleId) {
        let name = self.modules[just_inserted.0 as usize].name;
        let ids = self.by_name.get(&name).cloned().unwrap_or_default();
        let mut latest: Option<ModuleId> = None;
        let mut latest_rev: Option<String> = None;
        for id in &ids {
            let m = &self.modules[id.0 as usize];
            let rev = m.revision.map(|a| self.dictionary.resolve(a).to_string());
            let is_newer = match (&latest_rev, &rev) {
                (None, _) => true,
                (Some(_), None) => false,
                (Some(cur), Some(new)) => new > cur,
            };
            if is_newer {
                latest = Some(*id);
                latest_rev = rev;
            }
        }
        for id in &ids {
            self.modules[id.0 as usize].latest_revision = Some(*id) == latest;
        }
    }

    pub fn next_module_id(&self) -> ModuleId {
        ModuleId(self.modules.len() as u32)
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.0 as usize]
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// Lookup is idempotent on `(name, revision)`; omitting the revision
    /// returns the latest available one.
    pub fn find_module(&self, name: Atom, revision: Option<Atom>) -> Option<&Module> {
        let ids = self.by_name.get(&name)?;
        match revision {
            Some(rev) => ids
                .iter()
                .map(|id| &self.modules[id.0 as usize])
                .find(|m| m.revision == Some(rev)),
            None => ids
                .iter()
                .map(|id| &self.modules[id.0 as usize])
                .find(|m| m.latest_revision),
        }
    }

    pub fn find_module_by_namespace(&self, namespace: Atom) -> Option<&Module> {
        self.by_namespace
            .get(&namespace)
            .map(|id| &self.modules[id.0 as usize])
    }

    pub fn set_feature(&mut self, module: ModuleId, name: Atom, enabled: bool) {
        self.feature_state.insert((module, name), enabled);
    }

    /// Tri-valued feature state. `Unset` means the module itself is
    /// unknown to this context; a known module with no explicit setting
    /// for `name` defaults to `Disabled`, matching conservative YANG
    /// tooling defaults.
    pub fn feature_state(&self, module: ModuleId, name: Atom) -> FeatureState {
        if module.0 as usize >= self.modules.len() {
            return FeatureState::Unset;
        }
        match self.feature_state.get(&(module, name)) {
            Some(true) => FeatureState::Enabled,
            Some(false) => FeatureState::Disabled,
            None => FeatureState::Disabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::named::NamedEntityTable;
    use std::sync::Arc;
    use yang_ast::NodeArena;

    fn dummy_module(ctx: &mut Context, name: &str, revision: Option<&str>, implemented: bool) -> Module {
        let id = ctx.next_module_id();
        let name_atom = ctx.intern(name);
        let namespace_atom = ctx.intern(&format!("urn:{name}"));
        let revision_atom = revision.map(|r| ctx.intern(r));
        let prefix_atom = ctx.intern(name);
        let mut arena = NodeArena::new();
        let root = arena.push(yang_ast::PNode::new(
            yang_ast::Keyword::Module,
            Some(name_atom),
            yang_common::Span::synthetic(),
        ));
        Module {
            id,
            name: name_atom,
            namespace: namespace_atom,
            revision: revision_atom,
            own_prefix: prefix_atom,
            imports: Vec::new(),
            includes: Vec::new(),
            belongs_to: None,
            implemented,
            latest_revision: false,
            yang_version: yang_common::YangVersion::V1_0,
            typedefs: NamedEntityTable::new(),
            groupings: NamedEntityTable::new(),
            identities: NamedEntityTable::new(),
            features: NamedEntityTable::new(),
            extensions: NamedEntityTable::new(),
            parsed: Arc::new(ParsedModule::new(arena, root)),
        }
    }

    #[test]
    fn importing_without_revision_returns_latest() {
        let mut ctx = Context::new(CompileOptions::default());
        let m1 = dummy_module(&mut ctx, "acme", Some("2020-01-01"), false);
        let m1_id = m1.id;
        ctx.register_module(m1).unwrap();
        let m2 = dummy_module(&mut ctx, "acme", Some("2023-06-01"), false);
        let m2_id = m2.id;
        ctx.register_module(m2).unwrap();

        let name = ctx.intern("acme");
        let latest = ctx.find_module(name, None).unwrap();
        assert_eq!(latest.id, m2_id);
        assert_ne!(latest.id, m1_id);
    }

    #[test]
    fn only_one_implemented_revision_allowed() {
        let mut ctx = Context::new(CompileOptions::default());
        let m1 = dummy_module(&mut ctx, "acme", Some("2020-01-01"), true);
        ctx.register_module(m1).unwrap();
        let m2 = dummy_module(&mut ctx, "acme", Some("2023-06-01"), true);
        let result = ctx.register_module(m2);
        assert!(result.is_err());
    }

    #[test]
    fn feature_state_is_unset_for_unknown_module() {
        let ctx = Context::new(CompileOptions::default());
        assert_eq!(ctx.feature_state(ModuleId(999), Atom::EMPTY), FeatureState::Unset);
    }

    #[test]
    fn feature_state_defaults_disabled_then_follows_explicit_set() {
        let mut ctx = Context::new(CompileOptions::default());
        let m = dummy_module(&mut ctx, "acme", None, false);
        let id = ctx.register_module(m).unwrap();
        let feat = ctx.intern("f");
        assert_eq!(ctx.feature_state(id, feat), FeatureState::Disabled);
        ctx.set_feature(id, feat, true);
        assert_eq!(ctx.feature_state(id, feat), FeatureState::Enabled);
    }
}
