//! The bounds authority: static ranges, signedness, classification and the
//! valid-cast matrix of [`VarType`].
//!
//! Both the parser (literal type inference) and the code generator (literal
//! range checks, conversions) consult this module; width and signedness
//! tables live here only.

use crate::{bigint::BigInt, types::VarType};

/// Inclusive integer range of a type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub min: BigInt,
    pub max: BigInt,
}

impl Bounds {
    pub fn contains(&self, value: &BigInt) -> bool {
        &self.min <= value && value <= &self.max
    }
}

/// `(type, min, max)` for every integer-like type.
const INTEGER_RANGES: &[(VarType, i128, i128)] = &[
    (VarType::Bool, 0, 1),
    (VarType::Int4, -8, 7),
    (VarType::Int8, -128, 127),
    (VarType::Int12, -2_048, 2_047),
    (VarType::Int16, -32_768, 32_767),
    (VarType::Int24, -8_388_608, 8_388_607),
    (VarType::Int32, -2_147_483_648, 2_147_483_647),
    (VarType::Int48, -140_737_488_355_328, 140_737_488_355_327),
    (VarType::Int64, i64::MIN as i128, i64::MAX as i128),
    (VarType::Uint0, 0, 0),
    (VarType::Uint4, 0, 15),
    (VarType::Uint8, 0, 255),
    (VarType::Uint12, 0, 4_095),
    (VarType::Uint16, 0, 65_535),
    (VarType::Uint24, 0, 16_777_215),
    (VarType::Uint32, 0, 4_294_967_295),
    (VarType::Uint48, 0, 281_474_976_710_655),
    (VarType::Uint64, 0, u64::MAX as i128),
];

const FLOAT32_RANGE: (&str, &str) = ("-3.4028235e38", "3.4028235e38");
const FLOAT64_RANGE: (&str, &str) = ("-1.7976931348623157e308", "1.7976931348623157e308");

fn integer_range(ty: VarType) -> Option<(i128, i128)> {
    INTEGER_RANGES
        .iter()
        .find(|(t, _, _)| *t == ty)
        .map(|&(_, min, max)| (min, max))
}

/// Structured integer bounds, `None` for types without an integer range.
pub fn bounds(ty: VarType) -> Option<Bounds> {
    integer_range(ty).map(|(min, max)| Bounds {
        min: BigInt::from(min),
        max: BigInt::from(max),
    })
}

/// `(min, max)` rendered as decimal strings, for integer and float types.
pub fn range_strings(ty: VarType) -> Option<(String, String)> {
    match ty {
        VarType::Float32 => Some((FLOAT32_RANGE.0.into(), FLOAT32_RANGE.1.into())),
        VarType::Float64 => Some((FLOAT64_RANGE.0.into(), FLOAT64_RANGE.1.into())),
        _ => integer_range(ty).map(|(min, max)| (min.to_string(), max.to_string())),
    }
}

/// Whether `value` lies within the range of `ty`. Types without a numeric
/// range accept nothing.
pub fn check_bounds(ty: VarType, value: &BigInt) -> bool {
    let limit = match ty {
        VarType::Float32 => f64::from(f32::MAX),
        VarType::Float64 => f64::MAX,
        _ => return bounds(ty).is_some_and(|b| b.contains(value)),
    };
    value
        .to_string()
        .parse::<f64>()
        .is_ok_and(|v| v.abs() <= limit)
}

/// Renders the error message for a value that does not fit in `ty`.
pub fn out_of_bounds_message(ty: VarType, value: &BigInt) -> String {
    match range_strings(ty) {
        Some((min, max)) => format!("value {value} is out of bounds for {ty} [{min}, {max}]"),
        None => format!("value {value} cannot be stored in {ty}"),
    }
}

pub fn is_signed(ty: VarType) -> bool {
    VarType::SIGNED.contains(&ty)
}

pub fn is_unsigned(ty: VarType) -> bool {
    VarType::UNSIGNED.contains(&ty)
}

pub fn is_integer(ty: VarType) -> bool {
    is_signed(ty) || is_unsigned(ty)
}

pub fn is_float(ty: VarType) -> bool {
    matches!(ty, VarType::Float32 | VarType::Float64)
}

pub fn is_numeric(ty: VarType) -> bool {
    is_integer(ty) || is_float(ty)
}

/// Scalars that have a textual rendering.
pub fn is_string_convertible(ty: VarType) -> bool {
    is_numeric(ty) || matches!(ty, VarType::Bool | VarType::String)
}

/// The valid-cast matrix. Legality depends on the type pair only, never on
/// the value being converted.
pub fn can_cast(from: VarType, to: VarType) -> bool {
    use VarType::*;
    if from == to {
        return true;
    }
    match (from, to) {
        // The zero-width type only ever holds booleans.
        (Bool, Uint0) => true,
        (_, Uint0) => false,
        (f, t) if is_numeric(f) && is_numeric(t) => true,
        (Bool, t) | (t, Bool) => is_integer(t),
        (f, String) => is_string_convertible(f),
        _ => false,
    }
}

/// The narrowest of `int8`, `int16` and `int32` which holds `value`, falling
/// back to `int64` for wider values.
pub fn narrowest_signed(value: &BigInt) -> VarType {
    [VarType::Int8, VarType::Int16, VarType::Int32]
        .into_iter()
        .find(|&ty| check_bounds(ty, value))
        .unwrap_or(VarType::Int64)
}

/// The result type of arithmetic between two numeric operands: floats win,
/// then the wider integer; on equal widths a signed operand wins.
pub fn promote(lhs: VarType, rhs: VarType) -> VarType {
    let width = |ty: VarType| ty.bits().unwrap_or(0);
    match (is_float(lhs), is_float(rhs)) {
        (true, true) => {
            if width(lhs) >= width(rhs) {
                lhs
            } else {
                rhs
            }
        }
        (true, false) => lhs,
        (false, true) => rhs,
        (false, false) => match width(lhs).cmp(&width(rhs)) {
            std::cmp::Ordering::Greater => lhs,
            std::cmp::Ordering::Less => rhs,
            std::cmp::Ordering::Equal if is_signed(rhs) => rhs,
            std::cmp::Ordering::Equal => lhs,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn int(v: i128) -> BigInt {
        BigInt::from(v)
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        for &ty in VarType::SIGNED.iter().chain(VarType::UNSIGNED) {
            let (min, max) = integer_range(ty).unwrap();
            assert!(check_bounds(ty, &int(min)), "{ty} min");
            assert!(check_bounds(ty, &int(max)), "{ty} max");
            assert!(!check_bounds(ty, &int(min - 1)), "{ty} min - 1");
            assert!(!check_bounds(ty, &int(max + 1)), "{ty} max + 1");
        }
        assert!(check_bounds(VarType::Int8, &int(-128)));
        assert!(check_bounds(VarType::Int8, &int(127)));
        assert!(!check_bounds(VarType::Int8, &int(-129)));
        assert!(!check_bounds(VarType::Int8, &int(128)));
    }

    #[test]
    fn test_bounds_table() {
        assert_eq!(
            range_strings(VarType::Int4),
            Some(("-8".to_string(), "7".to_string()))
        );
        assert_eq!(
            range_strings(VarType::Uint64),
            Some(("0".to_string(), "18446744073709551615".to_string()))
        );
        assert_eq!(
            range_strings(VarType::Uint0),
            Some(("0".to_string(), "0".to_string()))
        );
        assert!(check_bounds(VarType::Uint0, &int(0)));
        assert!(!check_bounds(VarType::Uint0, &int(1)));
        assert!(!check_bounds(VarType::Uint8, &int(-1)));
        assert!(!check_bounds(VarType::Int48, &int(1 << 47)));
        assert!(check_bounds(VarType::Uint48, &int(1 << 47)));
        assert!(check_bounds(VarType::Float32, &int(1 << 100)));
        assert!(!check_bounds(VarType::String, &int(0)));
    }

    #[test]
    fn test_narrowest_signed() {
        assert_eq!(narrowest_signed(&int(100)), VarType::Int8);
        assert_eq!(narrowest_signed(&int(200)), VarType::Int16);
        assert_eq!(narrowest_signed(&int(-129)), VarType::Int16);
        assert_eq!(narrowest_signed(&int(40_000)), VarType::Int32);
        assert_eq!(narrowest_signed(&int(1 << 40)), VarType::Int64);
    }

    #[test]
    fn test_cast_matrix() {
        use VarType::*;
        assert!(can_cast(Int8, Float64));
        assert!(can_cast(Float32, Uint16));
        assert!(can_cast(Int32, String));
        assert!(can_cast(Bool, Int8));
        assert!(can_cast(Uint64, Bool));
        assert!(can_cast(Bool, String));
        assert!(can_cast(Bool, Uint0));
        assert!(can_cast(Uint0, Int32));
        assert!(!can_cast(Int32, Uint0));
        assert!(!can_cast(String, Int32));
        assert!(!can_cast(Float64, Bool));
        assert!(!can_cast(Struct, Int32));
        assert!(!can_cast(Int32, Module));
        assert!(!can_cast(Void, Int32));
        assert!(can_cast(Struct, Struct));
    }

    #[test]
    fn test_classification() {
        assert!(is_signed(VarType::Int12));
        assert!(is_unsigned(VarType::Uint0));
        assert!(is_integer(VarType::Uint0));
        assert!(!is_integer(VarType::Bool));
        assert!(is_numeric(VarType::Float32));
        assert!(!is_numeric(VarType::String));
    }

    #[test]
    fn test_promotion() {
        use VarType::*;
        assert_eq!(promote(Int8, Int32), Int32);
        assert_eq!(promote(Uint16, Int16), Int16);
        assert_eq!(promote(Int64, Float32), Float32);
        assert_eq!(promote(Float32, Float64), Float64);
        assert_eq!(promote(Uint64, Int8), Uint64);
    }
}
