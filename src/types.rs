use std::fmt;

use crate::token::TokenKind;

/// The closed set of scalar and aggregate type tags.
///
/// Struct and module types are named; the name travels next to the tag
/// wherever it matters (declarations, struct literals, module aliases).
/// Enum members are plain `Int32` values.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VarType {
    Bool,
    Int4,
    Int8,
    Int12,
    Int16,
    Int24,
    Int32,
    Int48,
    Int64,
    /// Zero-width unsigned integer, always `0`. Also the type of boolean
    /// literals and permanently read-only.
    Uint0,
    Uint4,
    Uint8,
    Uint12,
    Uint16,
    Uint24,
    Uint32,
    Uint48,
    Uint64,
    Float32,
    Float64,
    String,
    Struct,
    Module,
    Void,
}

impl VarType {
    pub const SIGNED: &[VarType] = &[
        VarType::Int4,
        VarType::Int8,
        VarType::Int12,
        VarType::Int16,
        VarType::Int24,
        VarType::Int32,
        VarType::Int48,
        VarType::Int64,
    ];

    pub const UNSIGNED: &[VarType] = &[
        VarType::Uint0,
        VarType::Uint4,
        VarType::Uint8,
        VarType::Uint12,
        VarType::Uint16,
        VarType::Uint24,
        VarType::Uint32,
        VarType::Uint48,
        VarType::Uint64,
    ];

    /// Maps a type keyword to its type. Struct names are resolved by the
    /// parser, not here.
    pub fn from_keyword(kind: TokenKind) -> Option<VarType> {
        let ty = match kind {
            TokenKind::Bool => VarType::Bool,
            TokenKind::Int4 => VarType::Int4,
            TokenKind::Int8 => VarType::Int8,
            TokenKind::Int12 => VarType::Int12,
            TokenKind::Int16 => VarType::Int16,
            TokenKind::Int24 => VarType::Int24,
            TokenKind::Int32 => VarType::Int32,
            TokenKind::Int48 => VarType::Int48,
            TokenKind::Int64 => VarType::Int64,
            TokenKind::Uint0 => VarType::Uint0,
            TokenKind::Uint4 => VarType::Uint4,
            TokenKind::Uint8 => VarType::Uint8,
            TokenKind::Uint12 => VarType::Uint12,
            TokenKind::Uint16 => VarType::Uint16,
            TokenKind::Uint24 => VarType::Uint24,
            TokenKind::Uint32 => VarType::Uint32,
            TokenKind::Uint48 => VarType::Uint48,
            TokenKind::Uint64 => VarType::Uint64,
            TokenKind::Float32 => VarType::Float32,
            TokenKind::Float64 => VarType::Float64,
            TokenKind::TyString => VarType::String,
            TokenKind::Void => VarType::Void,
            _ => return None,
        };
        Some(ty)
    }

    /// Width in bits of integer and float types, `None` otherwise.
    pub const fn bits(self) -> Option<u32> {
        use VarType::*;
        let bits = match self {
            Bool => 1,
            Uint0 => 0,
            Int4 | Uint4 => 4,
            Int8 | Uint8 => 8,
            Int12 | Uint12 => 12,
            Int16 | Uint16 => 16,
            Int24 | Uint24 => 24,
            Int32 | Uint32 | Float32 => 32,
            Int48 | Uint48 => 48,
            Int64 | Uint64 | Float64 => 64,
            String | Struct | Module | Void => return None,
        };
        Some(bits)
    }

    pub const fn name(self) -> &'static str {
        use VarType::*;
        match self {
            Bool => "bool",
            Int4 => "int4",
            Int8 => "int8",
            Int12 => "int12",
            Int16 => "int16",
            Int24 => "int24",
            Int32 => "int32",
            Int48 => "int48",
            Int64 => "int64",
            Uint0 => "uint0",
            Uint4 => "uint4",
            Uint8 => "uint8",
            Uint12 => "uint12",
            Uint16 => "uint16",
            Uint24 => "uint24",
            Uint32 => "uint32",
            Uint48 => "uint48",
            Uint64 => "uint64",
            Float32 => "float32",
            Float64 => "float64",
            String => "string",
            Struct => "struct",
            Module => "module",
            Void => "void",
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::KEYWORDS;

    #[test]
    fn test_every_type_keyword_maps_to_its_name() {
        for (keyword, kind) in KEYWORDS.entries() {
            match VarType::from_keyword(*kind) {
                Some(ty) => {
                    assert!(kind.is_type_keyword(), "{keyword}");
                    assert_eq!(ty.name(), *keyword);
                }
                None => assert!(!kind.is_type_keyword(), "{keyword}"),
            }
        }
    }

    #[test]
    fn test_widths() {
        assert_eq!(VarType::Uint0.bits(), Some(0));
        assert_eq!(VarType::Int48.bits(), Some(48));
        assert_eq!(VarType::Float32.bits(), Some(32));
        assert_eq!(VarType::String.bits(), None);
    }
}
