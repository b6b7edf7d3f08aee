// crates/bulwark-staking/src/valset.rs
//
// Ordered index of validators eligible for the active set.
//
// Keys sort by voting power descending, then operator address ascending, a
// strict total order so every replica derives the same set from the same
// state. Updates touch one validator at a time in O(log n); the active set is
// the first `max_validators` keys.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use bulwark_core::Address;

/// A member of the active set and its voting power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorPower {
    pub operator: Address,
    pub power: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PowerKey {
    power: Reverse<u64>,
    operator: Address,
}

/// Eligible validators ordered by (power desc, address asc).
#[derive(Debug, Clone, Default)]
pub struct ValidatorSetIndex {
    ordered: BTreeSet<PowerKey>,
    powers: BTreeMap<Address, u64>,
}

impl ValidatorSetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the indexed power of `operator`. `None` or zero power removes it.
    pub fn update(&mut self, operator: Address, power: Option<u64>) {
        if let Some(old) = self.powers.remove(&operator) {
            self.ordered.remove(&PowerKey {
                power: Reverse(old),
                operator,
            });
        }
        if let Some(power) = power.filter(|p| *p > 0) {
            self.ordered.insert(PowerKey {
                power: Reverse(power),
                operator,
            });
            self.powers.insert(operator, power);
        }
    }

    pub fn remove(&mut self, operator: &Address) {
        self.update(*operator, None);
    }

    /// The first `k` eligible validators.
    pub fn top(&self, k: usize) -> Vec<ValidatorPower> {
        self.ordered
            .iter()
            .take(k)
            .map(|key| ValidatorPower {
                operator: key.operator,
                power: key.power.0,
            })
            .collect()
    }

    /// Number of eligible validators (may exceed the set size).
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    #[test]
    fn test_orders_by_power_descending() {
        let mut index = ValidatorSetIndex::new();
        index.update(addr(1), Some(100));
        index.update(addr(2), Some(101));
        index.update(addr(3), Some(1));

        let top = index.top(3);
        assert_eq!(
            top.iter().map(|v| v.operator).collect::<Vec<_>>(),
            vec![addr(2), addr(1), addr(3)]
        );
        assert_eq!(top[0].power, 101);
    }

    #[test]
    fn test_ties_break_by_address() {
        let mut index = ValidatorSetIndex::new();
        index.update(addr(9), Some(5));
        index.update(addr(4), Some(5));
        assert_eq!(index.top(2)[0].operator, addr(4));
    }

    #[test]
    fn test_update_moves_existing_entry() {
        let mut index = ValidatorSetIndex::new();
        index.update(addr(1), Some(100));
        index.update(addr(2), Some(101));
        index.update(addr(1), Some(200));

        assert_eq!(index.len(), 2);
        assert_eq!(index.top(1)[0].operator, addr(1));
        assert_eq!(index.top(2)[1].operator, addr(2));
    }

    #[test]
    fn test_zero_power_and_removal() {
        let mut index = ValidatorSetIndex::new();
        index.update(addr(1), Some(0));
        assert!(index.is_empty());

        index.update(addr(1), Some(3));
        index.remove(&addr(1));
        assert!(index.is_empty());
        assert!(index.top(1).is_empty());
    }

    #[test]
    fn test_top_truncates_to_set_size() {
        let mut index = ValidatorSetIndex::new();
        for b in 1..=5u8 {
            index.update(addr(b), Some(b as u64));
        }
        let top = index.top(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[1].operator, addr(4));
    }
}
