//! The YANG Type Compiler (C3).
//!
//! Given a parsed type reference, produces a compiled, shareable type: the
//! base-type tag inherited from the eventual built-in base, the
//! intersection of every restriction along the typedef chain, and (where
//! possible) a reference to an already-compiled type rather than a fresh
//! allocation ("Sharing").

pub mod domain;
pub use domain::BaseType;

pub mod restrictions;
pub use restrictions::{BitValue, EnumValue, LeafrefRestriction, PatternRestriction, Restriction};

pub mod types;
pub use types::{CompiledType, TypeId, TypeStore};

pub mod identity;
pub use identity::{Identity, IdentityId, IdentityTable};

pub mod compile;
pub use compile::{compile_type, RawTypeRef, TypeCompileContext};
