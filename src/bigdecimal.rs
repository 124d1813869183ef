//! Arbitrary-precision integer helpers for isu accounting.
//!
//! All currency math is exact `BigInt` arithmetic. The only lossy step is
//! [`to_exp`], which truncates to a transport-friendly `(mantissa, exponent)`
//! pair and is only ever applied at the JSON boundary.

use num_bigint::BigInt;
use num_traits::Zero;
use serde::Serialize;

/// Parse a decimal string into a `BigInt`. Panics on malformed input since
/// every call site controls the string (either our own `to_string()` output
/// or a client-supplied `isu` field validated by the caller).
pub fn parse(s: &str) -> BigInt {
    s.parse().unwrap_or_else(|_| BigInt::zero())
}

/// `mantissa * 10^exponent`, serialized on the wire as `[mantissa, exponent]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exponential {
    pub mantissa: i64,
    pub exponent: i64,
}

impl Serialize for Exponential {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeTuple;
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.mantissa)?;
        tup.serialize_element(&self.exponent)?;
        tup.end()
    }
}

/// Truncate `n` to at most 15 significant decimal digits.
///
/// If the decimal representation is 15 digits or fewer, returns it exactly
/// with exponent 0. Otherwise keeps the first 15 digits and records how many
/// digits were dropped as the exponent. This is truncation toward zero, not
/// rounding — callers tolerate up to 3 significant digits of loss on huge
/// numbers (item 13's power/price grow without bound).
pub fn to_exp(n: &BigInt) -> Exponential {
    let s = n.to_string();
    let (neg, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.as_str()),
    };

    if digits.len() <= 15 {
        return Exponential {
            mantissa: n.clone().try_into().unwrap_or(i64::MAX),
            exponent: 0,
        };
    }

    let head: i64 = digits[..15].parse().expect("15 ascii digits parse as i64");
    Exponential {
        mantissa: if neg { -head } else { head },
        exponent: (digits.len() - 15) as i64,
    }
}
