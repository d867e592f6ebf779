//! Context & Dictionary (C1) and Reference Resolver (C2) for the YANG
//! schema compiler.
//!
//! This crate provides:
//! - `Context` — the process-scope collection of loaded modules plus the
//!   interned-string dictionary (C1)
//! - `Module` — a loaded module's binder-level view: prefix, imports,
//!   includes, and name tables for typedefs/groupings/identities/features
//! - `qname` — prefixed-name parsing and resolution against a module's
//!   own prefix and its imports
//! - `path` — schema-node-id and data-path-with-predicates grammar,
//!   parsed but not resolved here
//! - `schema_tree` — the `SchemaTreeView` trait and the generic node-id
//!   walker (C2's other half), kept generic over the concrete C-node type
//!   so this crate never depends on `yang-checker`

pub mod context;
pub use context::{Context, FeatureState};

pub mod bind;
pub use bind::bind_module;

pub mod module;
pub use module::{Import, Module, ModuleId, ModuleKey, NamedKind};

pub mod qname;
pub use qname::QName;

pub mod named;
pub use named::NamedEntityTable;

pub mod path;
pub use path::{
    DataPathSegment, ParsedDataPath, ParsedNodeId, Predicate, PrefixPolicy, RawSegment,
};

pub mod schema_tree;
pub use schema_tree::{NodeTypeMask, SchemaTreeView};
