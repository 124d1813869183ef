//! Static item catalogue: 13 items, each with a power curve and a price
//! curve. Both curves share the same shape and are part of the wire
//! contract — clients derive the same numbers from these constants.

use num_bigint::BigInt;
use num_traits::One;

/// One catalogue entry. Immutable for the process lifetime.
#[derive(Debug, Clone, Copy)]
pub struct Item {
    pub item_id: i32,
    power1: i64,
    power2: i64,
    power3: i64,
    power4: i64,
    price1: i64,
    price2: i64,
    price3: i64,
    price4: i64,
}

impl Item {
    /// `power(x) = (power3*x + 1) * power4^(power1*x + power2)`
    pub fn power(&self, count: i64) -> BigInt {
        curve(self.power1, self.power2, self.power3, self.power4, count)
    }

    /// `price(x) = (price3*x + 1) * price4^(price1*x + price2)`
    pub fn price(&self, count: i64) -> BigInt {
        curve(self.price1, self.price2, self.price3, self.price4, count)
    }
}

/// `(c*x + 1) * d^(a*x + b)`, evaluated with exact big-integer exponentiation.
fn curve(a: i64, b: i64, c: i64, d: i64, x: i64) -> BigInt {
    let linear = BigInt::from(c * x + 1);
    let exponent = a * x + b;
    let base = BigInt::from(d);
    linear * pow_bigint(&base, exponent)
}

/// Exact `base^exponent` for a non-negative `exponent`, via binary
/// exponentiation (`BigInt::pow` only takes a `u32`; item 13's exponent
/// grows past `u32::MAX` for large purchase counts, though no realistic
/// room gets there — this never panics regardless).
fn pow_bigint(base: &BigInt, exponent: i64) -> BigInt {
    debug_assert!(exponent >= 0, "catalogue exponents are never negative");
    let mut exponent = exponent.max(0) as u64;
    let mut result = BigInt::one();
    let mut base = base.clone();
    while exponent > 0 {
        if exponent & 1 == 1 {
            result *= &base;
        }
        base = &base * &base;
        exponent >>= 1;
    }
    result
}

/// The 13 catalogue rows, in `item_id` order.
pub const ITEMS: [Item; 13] = [
    Item { item_id: 1, power1: 0, power2: 1, power3: 0, power4: 1, price1: 0, price2: 1, price3: 1, price4: 1 },
    Item { item_id: 2, power1: 0, power2: 1, power3: 1, power4: 1, price1: 0, price2: 1, price3: 2, price4: 1 },
    Item { item_id: 3, power1: 1, power2: 10, power3: 0, power4: 2, price1: 1, price2: 3, price3: 1, price4: 2 },
    Item { item_id: 4, power1: 1, power2: 24, power3: 1, power4: 2, price1: 1, price2: 10, price3: 0, price4: 3 },
    Item { item_id: 5, power1: 1, power2: 25, power3: 100, power4: 3, price1: 2, price2: 20, price3: 20, price4: 2 },
    Item { item_id: 6, power1: 1, power2: 30, power3: 147, power4: 13, price1: 1, price2: 22, price3: 69, price4: 17 },
    Item { item_id: 7, power1: 5, power2: 80, power3: 128, power4: 6, price1: 6, price2: 61, price3: 200, price4: 5 },
    Item { item_id: 8, power1: 20, power2: 340, power3: 180, power4: 3, price1: 9, price2: 105, price3: 134, price4: 14 },
    Item { item_id: 9, power1: 55, power2: 520, power3: 335, power4: 5, price1: 48, price2: 243, price3: 600, price4: 7 },
    Item { item_id: 10, power1: 157, power2: 1071, power3: 1700, power4: 12, price1: 157, price2: 625, price3: 1000, price4: 13 },
    Item { item_id: 11, power1: 2000, power2: 7500, power3: 2600, power4: 3, price1: 2001, price2: 5430, price3: 1000, price4: 3 },
    Item { item_id: 12, power1: 1000, power2: 9000, power3: 0, power4: 17, price1: 963, price2: 7689, price3: 1, price4: 19 },
    Item { item_id: 13, power1: 11000, power2: 11000, power3: 11000, power4: 23, price1: 10000, price2: 2, price3: 2, price4: 29 },
];

/// Look up a catalogue entry by `item_id` (1-based). Panics on an id outside
/// `1..=13` — the caller is expected to validate against the wire contract.
pub fn item(item_id: i32) -> &'static Item {
    ITEMS
        .iter()
        .find(|i| i.item_id == item_id)
        .unwrap_or_else(|| panic!("unknown item_id {item_id}"))
}
