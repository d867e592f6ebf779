//! Built-in base types and their numeric/length domains.

use std::fmt;

/// The closed set of YANG base types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BaseType {
    Binary,
    Bits,
    Boolean,
    Decimal64,
    Empty,
    Enumeration,
    Identityref,
    InstanceIdentifier,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Leafref,
    String,
    Union,
}

impl BaseType {
    /// Built-in type name as written in YANG source, used by the type
    /// compiler to recognize a reference without a resolver lookup:
    /// built-in base types are recognized by name alone.
    pub fn from_name(name: &str) -> Option<BaseType> {
        Some(match name {
            "binary" => BaseType::Binary,
            "bits" => BaseType::Bits,
            "boolean" => BaseType::Boolean,
            "decimal64" => BaseType::Decimal64,
            "empty" => BaseType::Empty,
            "enumeration" => BaseType::Enumeration,
            "identityref" => BaseType::Identityref,
            "instance-identifier" => BaseType::InstanceIdentifier,
            "int8" => BaseType::Int8,
            "int16" => BaseType::Int16,
            "int32" => BaseType::Int32,
            "int64" => BaseType::Int64,
            "uint8" => BaseType::Uint8,
            "uint16" => BaseType::Uint16,
            "uint32" => BaseType::Uint32,
            "uint64" => BaseType::Uint64,
            "leafref" => BaseType::Leafref,
            "string" => BaseType::String,
            "union" => BaseType::Union,
            _ => return None,
        })
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            BaseType::Int8
                | BaseType::Int16
                | BaseType::Int32
                | BaseType::Int64
                | BaseType::Uint8
                | BaseType::Uint16
                | BaseType::Uint32
                | BaseType::Uint64
                | BaseType::Decimal64
        )
    }

    pub fn has_length(self) -> bool {
        matches!(self, BaseType::String | BaseType::Binary)
    }

    /// `(min, max)` domain for a numeric base type, widened to `i128` so
    /// `uint64::MAX` fits alongside `int64::MIN`. `decimal64` ranges are in
    /// units of the underlying `int64` scaled by `fraction-digits`; the
    /// domain here is the unscaled `int64` range, matching how `range`
    /// restriction text for decimal64 is always expressed (RFC 7950 §9.3.4).
    pub fn numeric_domain(self) -> Option<(i128, i128)> {
        Some(match self {
            BaseType::Int8 => (i8::MIN as i128, i8::MAX as i128),
            BaseType::Int16 => (i16::MIN as i128, i16::MAX as i128),
            BaseType::Int32 => (i32::MIN as i128, i32::MAX as i128),
            BaseType::Int64 => (i64::MIN as i128, i64::MAX as i128),
            BaseType::Uint8 => (u8::MIN as i128, u8::MAX as i128),
            BaseType::Uint16 => (u16::MIN as i128, u16::MAX as i128),
            BaseType::Uint32 => (u32::MIN as i128, u32::MAX as i128),
            BaseType::Uint64 => (u64::MIN as i128, u64::MAX as i128),
            BaseType::Decimal64 => (i64::MIN as i128, i64::MAX as i128),
            _ => return None,
        })
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BaseType::Binary => "binary",
            BaseType::Bits => "bits",
            BaseType::Boolean => "boolean",
            BaseType::Decimal64 => "decimal64",
            BaseType::Empty => "empty",
            BaseType::Enumeration => "enumeration",
            BaseType::Identityref => "identityref",
            BaseType::InstanceIdentifier => "instance-identifier",
            BaseType::Int8 => "int8",
            BaseType::Int16 => "int16",
            BaseType::Int32 => "int32",
            BaseType::Int64 => "int64",
            BaseType::Uint8 => "uint8",
            BaseType::Uint16 => "uint16",
            BaseType::Uint32 => "uint32",
            BaseType::Uint64 => "uint64",
            BaseType::Leafref => "leafref",
            BaseType::String => "string",
            BaseType::Union => "union",
        };
        f.write_str(s)
    }
}
