//! Arbitrary precision integers for literal parsing and bounds checking.
//!
//! Only the handful of operations the front end needs are provided: parsing
//! from literal text, comparison, negation, decimal rendering and checked
//! narrowing. Literals never take part in arbitrary arithmetic.

use std::{cmp::Ordering, fmt, ops::Neg, str::FromStr};

use thiserror::Error;

const LIMB_BITS: u32 = 32;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseBigIntError {
    #[error("integer literal `{0}` has no digits")]
    NoDigits(String),
    #[error("invalid digit `{digit}` for base {radix} in integer literal `{literal}`")]
    InvalidDigit {
        digit: char,
        radix: u32,
        literal: String,
    },
    #[error("integer literal {0} is out of range [-9223372036854775808, 9223372036854775807]")]
    OutOfRange(BigInt),
}

/// A signed magnitude integer. The magnitude is stored as little endian
/// 32-bit limbs without trailing zero limbs; zero is never negative.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BigInt {
    negative: bool,
    limbs: Vec<u32>,
}

impl BigInt {
    pub fn zero() -> BigInt {
        BigInt::default()
    }

    pub fn is_zero(&self) -> bool {
        self.limbs.is_empty()
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Parses literal text, picking the radix from its prefix: `0b` for
    /// binary, `0x` for hexadecimal and decimal otherwise. Underscore digit
    /// separators are ignored.
    pub fn parse_literal(text: &str) -> Result<BigInt, ParseBigIntError> {
        let (digits, radix) = match text.get(..2) {
            Some("0b" | "0B") => (&text[2..], 2),
            Some("0x" | "0X") => (&text[2..], 16),
            _ => (text, 10),
        };

        let mut value = BigInt::zero();
        let mut seen_digit = false;
        for c in digits.chars().filter(|&c| c != '_') {
            let Some(digit) = c.to_digit(radix) else {
                return Err(ParseBigIntError::InvalidDigit {
                    digit: c,
                    radix,
                    literal: text.to_owned(),
                });
            };
            value.mul_add_small(radix, digit);
            seen_digit = true;
        }

        if !seen_digit {
            return Err(ParseBigIntError::NoDigits(text.to_owned()));
        }
        Ok(value)
    }

    /// Narrows to a signed 64-bit value.
    ///
    /// The magnitude `2^63` is only accepted when negative, which is what
    /// makes `-9223372036854775808` representable.
    pub fn to_i64(&self) -> Result<i64, ParseBigIntError> {
        self.to_i128()
            .and_then(|v| i64::try_from(v).ok())
            .ok_or_else(|| ParseBigIntError::OutOfRange(self.clone()))
    }

    /// Returns the value if it fits in 128 bits.
    pub fn to_i128(&self) -> Option<i128> {
        if self.limbs.len() > 4 {
            return None;
        }
        let magnitude = self
            .limbs
            .iter()
            .rev()
            .fold(0u128, |acc, &limb| (acc << LIMB_BITS) | u128::from(limb));
        if self.negative {
            if magnitude == 1 << 127 {
                Some(i128::MIN)
            } else {
                i128::try_from(magnitude).ok().map(Neg::neg)
            }
        } else {
            i128::try_from(magnitude).ok()
        }
    }

    /// `self = self * factor + addend`, on the magnitude.
    fn mul_add_small(&mut self, factor: u32, addend: u32) {
        let mut carry = u64::from(addend);
        for limb in &mut self.limbs {
            let wide = u64::from(*limb) * u64::from(factor) + carry;
            *limb = wide as u32;
            carry = wide >> LIMB_BITS;
        }
        if carry != 0 {
            self.limbs.push(carry as u32);
        }
    }

    /// Divides the magnitude in place, returning the remainder.
    fn div_rem_small(&mut self, divisor: u32) -> u32 {
        let mut rem = 0u64;
        for limb in self.limbs.iter_mut().rev() {
            let wide = (rem << LIMB_BITS) | u64::from(*limb);
            *limb = (wide / u64::from(divisor)) as u32;
            rem = wide % u64::from(divisor);
        }
        self.normalize();
        rem as u32
    }

    fn normalize(&mut self) {
        while self.limbs.last() == Some(&0) {
            self.limbs.pop();
        }
        if self.limbs.is_empty() {
            self.negative = false;
        }
    }

    fn cmp_magnitude(&self, other: &BigInt) -> Ordering {
        self.limbs
            .len()
            .cmp(&other.limbs.len())
            .then_with(|| self.limbs.iter().rev().cmp(other.limbs.iter().rev()))
    }
}

impl From<u128> for BigInt {
    fn from(mut value: u128) -> Self {
        let mut limbs = Vec::with_capacity(4);
        while value != 0 {
            limbs.push(value as u32);
            value >>= LIMB_BITS;
        }
        BigInt {
            negative: false,
            limbs,
        }
    }
}

impl From<i128> for BigInt {
    fn from(value: i128) -> Self {
        let magnitude = BigInt::from(value.unsigned_abs());
        if value < 0 {
            -magnitude
        } else {
            magnitude
        }
    }
}

impl From<i64> for BigInt {
    fn from(value: i64) -> Self {
        BigInt::from(i128::from(value))
    }
}

impl From<u64> for BigInt {
    fn from(value: u64) -> Self {
        BigInt::from(u128::from(value))
    }
}

impl Neg for BigInt {
    type Output = BigInt;

    fn neg(mut self) -> BigInt {
        self.negative = !self.negative;
        self.normalize();
        self
    }
}

impl Neg for &BigInt {
    type Output = BigInt;

    fn neg(self) -> BigInt {
        -self.clone()
    }
}

impl Ord for BigInt {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.cmp_magnitude(other),
            (true, true) => other.cmp_magnitude(self),
        }
    }
}

impl PartialOrd for BigInt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for BigInt {
    type Err = ParseBigIntError;

    /// Like [`BigInt::parse_literal`], also accepting a leading `-`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix('-') {
            Some(rest) => BigInt::parse_literal(rest).map(Neg::neg),
            None => BigInt::parse_literal(s),
        }
    }
}

impl fmt::Display for BigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }
        // Peel off nine decimal digits at a time.
        let mut magnitude = BigInt {
            negative: false,
            limbs: self.limbs.clone(),
        };
        let mut chunks = Vec::new();
        while !magnitude.is_zero() {
            chunks.push(magnitude.div_rem_small(1_000_000_000));
        }
        if self.negative {
            f.write_str("-")?;
        }
        let mut chunks = chunks.iter().rev();
        if let Some(first) = chunks.next() {
            write!(f, "{first}")?;
        }
        for chunk in chunks {
            write!(f, "{chunk:09}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> BigInt {
        BigInt::parse_literal(text).unwrap()
    }

    #[test]
    fn test_radixes_render_as_decimal() {
        let cases = [
            ("0b1010", "10"),
            ("0x1F", "31"),
            ("0xff_ff", "65535"),
            ("1_000", "1000"),
            ("0", "0"),
            ("000123", "123"),
            ("0b1111_1111_1111_1111_1111_1111_1111_1111_1", "8589934591"),
        ];
        for (input, expected) in cases {
            assert_eq!(parse(input).to_string(), expected, "{input}");
        }
    }

    #[test]
    fn test_values_wider_than_128_bits() {
        let text = "340282366920938463463374607431768211456123456789";
        let value = parse(text);
        assert_eq!(value.to_string(), text);
        assert_eq!(value.to_i128(), None);
        assert_eq!((-value).to_string(), format!("-{text}"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            BigInt::parse_literal("0x"),
            Err(ParseBigIntError::NoDigits("0x".into()))
        );
        assert_eq!(
            BigInt::parse_literal("0b___"),
            Err(ParseBigIntError::NoDigits("0b___".into()))
        );
        assert_eq!(
            BigInt::parse_literal("0b102"),
            Err(ParseBigIntError::InvalidDigit {
                digit: '2',
                radix: 2,
                literal: "0b102".into()
            })
        );
        assert_eq!(
            BigInt::parse_literal("0xZZ").unwrap_err().to_string(),
            "invalid digit `Z` for base 16 in integer literal `0xZZ`"
        );
    }

    #[test]
    fn test_ordering_is_numeric() {
        assert_eq!(parse("0x10"), parse("16"));
        assert_eq!(parse("1_0"), parse("10"));
        assert!(parse("128") > parse("127"));
        assert!(-parse("129") < -parse("128"));
        assert!(-parse("1") < BigInt::zero());
        assert!(parse("18446744073709551616") > BigInt::from(u64::MAX));
        assert_eq!(-BigInt::zero(), BigInt::zero());
    }

    #[test]
    fn test_narrowing() {
        assert_eq!(parse("9223372036854775807").to_i64(), Ok(i64::MAX));
        assert_eq!((-parse("9223372036854775808")).to_i64(), Ok(i64::MIN));

        let error = parse("9223372036854775808").to_i64().unwrap_err();
        assert_eq!(
            error.to_string(),
            "integer literal 9223372036854775808 is out of range \
             [-9223372036854775808, 9223372036854775807]"
        );
        assert!((-parse("9223372036854775809")).to_i64().is_err());
    }

    #[test]
    fn test_from_str_accepts_sign() {
        assert_eq!("-42".parse::<BigInt>().unwrap(), BigInt::from(-42i64));
        assert_eq!("-0x10".parse::<BigInt>().unwrap().to_string(), "-16");
    }
}
