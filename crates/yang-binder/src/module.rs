//! Loaded-module bookkeeping ("Module").

use crate::named::NamedEntityTable;
use std::sync::Arc;
use yang_ast::ParsedModule;
use yang_common::{Atom, YangVersion};

/// Index into `Context`'s module table. Stable for the lifetime of the
/// context (modules are committed atomically and never removed except by
/// dropping the whole context).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

/// The partitions this crate resolves names against: `data, typedef,
/// grouping, feature, identity, extension`. `data` is tracked by the node
/// compiler; the other five are tracked here as named-entity tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NamedKind {
    Typedef,
    Grouping,
    Identity,
    Feature,
    Extension,
}

/// `(name, namespace, revision?)` identity plus YANG 1.1 addition
/// `yang-version`, used for `Context::find_module` lookups.
#[derive(Clone, Debug)]
pub struct ModuleKey {
    pub name: Atom,
    pub namespace: Atom,
    pub revision: Option<Atom>,
}

/// One entry in a module's `import` table: the local prefix this module
/// uses to refer to the imported module.
#[derive(Clone, Copy, Debug)]
pub struct Import {
    pub prefix: Atom,
    pub module: ModuleId,
}

/// A loaded module's binder-level view, 
///
/// Compiled schema nodes are *not* stored here — they live in
/// `yang_checker::CompiledModule`, which wraps a `Module` by `ModuleId` to
/// avoid a dependency cycle (the resolver this crate provides is generic
/// over the compiled tree via `SchemaTreeView`, so `yang-binder` never
/// needs to know the checker's node type).
pub struct Module {
    pub id: ModuleId,
    pub name: Atom,
    pub namespace: Atom,
    pub revision: Option<Atom>,
    /// This module's own prefix, usable to qualify its own top-level
    /// definitions exactly like an import.
    pub own_prefix: Atom,
    pub imports: Vec<Import>,
    pub includes: Vec<ModuleId>,
    /// Set once a submodule's `belongs-to` has been linked to its parent.
    pub belongs_to: Option<ModuleId>,
    pub implemented: bool,
    pub latest_revision: bool,
    /// This module's own `yang-version` (or the compile's default when it
    /// omits the statement), gating version-specific rules like union
    /// membership.
    pub yang_version: YangVersion,
    pub typedefs: NamedEntityTable,
    pub groupings: NamedEntityTable,
    pub identities: NamedEntityTable,
    pub features: NamedEntityTable,
    pub extensions: NamedEntityTable,
    pub parsed: Arc<ParsedModule>,
}

impl Module {
    pub fn table(&self, kind: NamedKind) -> &NamedEntityTable {
        match kind {
            NamedKind::Typedef => &self.typedefs,
            NamedKind::Grouping => &self.groupings,
            NamedKind::Identity => &self.identities,
            NamedKind::Feature => &self.features,
            NamedKind::Extension => &self.extensions,
        }
    }

    pub fn table_mut(&mut self, kind: NamedKind) -> &mut NamedEntityTable {
        match kind {
            NamedKind::Typedef => &mut self.typedefs,
            NamedKind::Grouping => &mut self.groupings,
            NamedKind::Identity => &mut self.identities,
            NamedKind::Feature => &mut self.features,
            NamedKind::Extension => &mut self.extensions,
        }
    }

    /// Resolve one of this module's own import prefixes, or its own
    /// prefix, to a `ModuleId`.
    pub fn resolve_prefix(&self, prefix: Atom) -> Option<ModuleId> {
        if prefix == self.own_prefix {
            return Some(self.id);
        }
        self.imports
            .iter()
            .find(|import| import.prefix == prefix)
            .map(|import| import.module)
    }
}
