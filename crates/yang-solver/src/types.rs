//! Compiled type storage and sharing ("Sharing").
//!
//! A compiled type is never passed around by value, only by a small `Copy`
//! handle into a `TypeStore` arena. `use_site` is the one entry point that
//! decides whether a reference to a type needs its own allocation (it adds
//! restrictions) or can simply reuse the base handle (it doesn't).

use yang_common::Span;

use crate::domain::BaseType;
use crate::restrictions::Restriction;

/// Opaque handle into a `TypeStore`. `ERROR` stands in for a type that
/// failed to compile, letting downstream passes keep walking the schema
/// tree (and collecting further diagnostics) instead of aborting the
/// instant one type reference is broken.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    pub const ERROR: TypeId = TypeId(u32::MAX);

    fn index(self) -> Option<usize> {
        if self == TypeId::ERROR {
            None
        } else {
            Some(self.0 as usize)
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompiledType {
    pub base: BaseType,
    pub restriction: Restriction,
    pub span: Span,
}

impl CompiledType {
    pub fn unrestricted(base: BaseType, span: Span) -> Self {
        CompiledType { base, restriction: Restriction::default(), span }
    }
}

/// Arena of compiled types. Every built-in base type is pre-allocated at
/// construction so `use_site` can hand out a shared `TypeId` for any
/// unrestricted type reference without a lookup.
pub struct TypeStore {
    types: Vec<CompiledType>,
    ref_counts: Vec<u32>,
    builtins: [TypeId; 19],
}

const BUILTIN_ORDER: [BaseType; 19] = [
    BaseType::Binary,
    BaseType::Bits,
    BaseType::Boolean,
    BaseType::Decimal64,
    BaseType::Empty,
    BaseType::Enumeration,
    BaseType::Identityref,
    BaseType::InstanceIdentifier,
    BaseType::Int8,
    BaseType::Int16,
    BaseType::Int32,
    BaseType::Int64,
    BaseType::Uint8,
    BaseType::Uint16,
    BaseType::Uint32,
    BaseType::Uint64,
    BaseType::Leafref,
    BaseType::String,
    BaseType::Union,
];

impl TypeStore {
    pub fn new() -> Self {
        let mut types = Vec::with_capacity(BUILTIN_ORDER.len());
        let mut ref_counts = Vec::with_capacity(BUILTIN_ORDER.len());
        let mut builtins = [TypeId::ERROR; 19];
        for (i, base) in BUILTIN_ORDER.iter().enumerate() {
            types.push(CompiledType::unrestricted(*base, Span::synthetic()));
            ref_counts.push(0);
            builtins[i] = TypeId(i as u32);
        }
        TypeStore { types, ref_counts, builtins }
    }

    fn builtin_id(&self, base: BaseType) -> TypeId {
        let i = BUILTIN_ORDER.iter().position(|b| *b == base).expect("every BaseType has a builtin slot");
        self.builtins[i]
    }

    pub fn alloc(&mut self, ty: CompiledType) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        self.ref_counts.push(0);
        id
    }

    pub fn resolve(&self, id: TypeId) -> Option<&CompiledType> {
        let idx = id.index()?;
        self.types.get(idx)
    }

    pub fn ref_count(&self, id: TypeId) -> u32 {
        id.index().and_then(|i| self.ref_counts.get(i).copied()).unwrap_or(0)
    }

    /// the sharing rule: a use site that adds no restriction of its own
    /// reuses `base`'s handle directly (bumping its ref count); a use site
    /// that narrows the base allocates a fresh `CompiledType` combining
    /// `base`'s restriction with `local`.
    pub fn use_site(&mut self, base: TypeId, local: Restriction, span: Span) -> Result<TypeId, yang_common::Diagnostic> {
        if local.is_empty() {
            if let Some(idx) = base.index() {
                self.ref_counts[idx] += 1;
            }
            return Ok(base);
        }
        let base_type = self.resolve(base).cloned().ok_or_else(|| {
            yang_common::Diagnostic::error(
                yang_common::DiagnosticKind::Internal,
                "<type use-site>",
                "use_site called with an unresolved base TypeId",
            )
        })?;
        let composed = compose(&base_type, local)?;
        Ok(self.alloc(CompiledType { base: base_type.base, restriction: composed, span }))
    }

    pub fn builtin(&self, base: BaseType) -> TypeId {
        self.builtin_id(base)
    }
}

impl Default for TypeStore {
    fn default() -> Self {
        TypeStore::new()
    }
}

fn compose(base: &CompiledType, local: Restriction) -> Result<Restriction, yang_common::Diagnostic> {
    use crate::restrictions::{compose_bits, compose_enum, compose_fraction_digits, compose_length, compose_patterns, compose_range};

    Ok(Restriction {
        range: compose_range(base.restriction.range.as_ref(), local.range.as_ref())?,
        length: compose_length(base.restriction.length.as_ref(), local.length.as_ref())?,
        patterns: compose_patterns(&base.restriction.patterns, &local.patterns),
        enum_values: compose_enum(base.restriction.enum_values.as_deref(), local.enum_values)?,
        bit_values: compose_bits(base.restriction.bit_values.as_deref(), local.bit_values)?,
        fraction_digits: compose_fraction_digits(base.restriction.fraction_digits, local.fraction_digits)?,
        leafref: local.leafref.or_else(|| base.restriction.leafref.clone()),
        identity_bases: local.identity_bases.or_else(|| base.restriction.identity_bases.clone()),
        require_instance: local.require_instance.or(base.restriction.require_instance),
        union_members: local.union_members.or_else(|| base.restriction.union_members.clone()),
    })
}
