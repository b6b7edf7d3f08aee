// crates/bulwark-staking/src/token.rs
//
// $BWK token amounts and unit constants.
//
// The smallest unit is the "atto" (10^-18 BWK). All accounting uses integer
// atto amounts held in u128; delegator shares use the same 18-decimal scale so
// a 1:1 exchange rate mints one share-atto per token-atto.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of atto in one BWK.
pub const ATTO_PER_BWK: u128 = 1_000_000_000_000_000_000;

/// Default divisor from bonded atto to consensus voting power units.
pub const DEFAULT_POWER_REDUCTION: u128 = 1_000_000;

/// Integer token amount in atto.
pub type Amount = u128;

/// `n` whole BWK expressed in atto.
pub const fn bwk(n: u128) -> Amount {
    n * ATTO_PER_BWK
}

/// A BWK amount, used for display in logs and queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Bwk(pub Amount);

impl fmt::Display for Bwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / ATTO_PER_BWK;
        let frac = self.0 % ATTO_PER_BWK;
        if frac == 0 {
            write!(f, "{} BWK", whole)
        } else {
            // Up to 18 decimal places, trailing zeros trimmed
            let frac_str = format!("{:018}", frac);
            write!(f, "{}.{} BWK", whole, frac_str.trim_end_matches('0'))
        }
    }
}

/// Serde adapter for u128 amounts in TOML, which has no integers above i64.
///
/// Serializes as a decimal string; deserializes from a string or an integer.
pub mod serde_amount {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = u128;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or a decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
                Ok(v as u128)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
                u128::try_from(v).map_err(|_| E::custom("amount cannot be negative"))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
                Ok(v)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
                v.parse().map_err(|_| E::custom(format!("invalid amount {:?}", v)))
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}
