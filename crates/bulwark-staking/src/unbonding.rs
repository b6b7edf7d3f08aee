// crates/bulwark-staking/src/unbonding.rs
//
// Unbonding queue: time-locked withdrawal of undelegated stake.
//
// `undelegate` does not pay out. It appends an entry per (delegator,
// validator) pair that matures `unbonding_period` seconds later; `withdraw`
// pays every matured entry and leaves the rest. Until maturity an entry stays
// slashable for infractions committed before it was created.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use bulwark_core::{Address, Dec, StakingError};

use crate::slashing::{compute_penalty, entry_is_slashable, Infraction, SlashCutoff};
use crate::token::{serde_amount, Amount};

/// Tokens leaving a validator, locked until `completion_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingEntry {
    pub creation_height: u64,
    pub creation_time: u64,
    pub completion_time: u64,
    #[serde(with = "serde_amount")]
    pub initial_balance: Amount,
    /// Balance after any slashing.
    #[serde(with = "serde_amount")]
    pub balance: Amount,
}

impl UnbondingEntry {
    pub fn new(amount: Amount, height: u64, now: u64, unbonding_period: u64) -> Self {
        Self {
            creation_height: height,
            creation_time: now,
            completion_time: now.saturating_add(unbonding_period),
            initial_balance: amount,
            balance: amount,
        }
    }

    pub fn is_mature(&self, now: u64) -> bool {
        self.completion_time <= now
    }
}

/// Pending entries keyed by (validator, delegator), oldest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnbondingQueue {
    entries: BTreeMap<(Address, Address), Vec<UnbondingEntry>>,
}

impl UnbondingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether another entry fits for the pair.
    ///
    /// # Errors
    /// Returns `StakingError::TooManyUnbondingEntries` if the pair already
    /// holds `max` entries.
    pub fn check_capacity(
        &self,
        delegator: &Address,
        validator: &Address,
        max: u32,
    ) -> Result<(), StakingError> {
        if self.entries(delegator, validator).len() >= max as usize {
            return Err(StakingError::TooManyUnbondingEntries { max });
        }
        Ok(())
    }

    /// Append `entry` for the pair.
    ///
    /// # Errors
    /// Returns `StakingError::TooManyUnbondingEntries` if the pair is full; the
    /// queue is left unchanged.
    pub fn push(
        &mut self,
        delegator: &Address,
        validator: &Address,
        entry: UnbondingEntry,
        max: u32,
    ) -> Result<(), StakingError> {
        self.check_capacity(delegator, validator, max)?;
        self.entries
            .entry((*validator, *delegator))
            .or_default()
            .push(entry);
        Ok(())
    }

    /// Remove every matured entry of the pair and return the sum of their
    /// balances. Immature entries are kept.
    ///
    /// # Errors
    /// Returns `StakingError::InsufficientStake` if the pair has no entries.
    pub fn withdraw_matured(
        &mut self,
        delegator: &Address,
        validator: &Address,
        now: u64,
    ) -> Result<Amount, StakingError> {
        let key = (*validator, *delegator);
        let Some(list) = self.entries.get_mut(&key) else {
            return Err(StakingError::InsufficientStake {
                requested: 0,
                available: 0,
            });
        };

        let mut paid: Amount = 0;
        list.retain(|entry| {
            if entry.is_mature(now) {
                paid = paid.saturating_add(entry.balance);
                false
            } else {
                true
            }
        });
        if list.is_empty() {
            self.entries.remove(&key);
        }
        Ok(paid)
    }

    pub fn entries(&self, delegator: &Address, validator: &Address) -> &[UnbondingEntry] {
        self.entries
            .get(&(*validator, *delegator))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// (withdrawable now, total pending) for the pair.
    pub fn balance(&self, delegator: &Address, validator: &Address, now: u64) -> (Amount, Amount) {
        self.entries(delegator, validator)
            .iter()
            .fold((0, 0), |(ready, total), entry| {
                let ready = if entry.is_mature(now) {
                    ready + entry.balance
                } else {
                    ready
                };
                (ready, total + entry.balance)
            })
    }

    pub fn has_entries_for(&self, validator: &Address) -> bool {
        self.entries
            .range((*validator, Address::ZERO)..=(*validator, Address::MAX))
            .next()
            .is_some()
    }

    /// Slash `fraction` of the current balance of every entry of `validator`
    /// still exposed to `infraction`. Returns the total removed.
    pub fn slash_validator_entries(
        &mut self,
        validator: &Address,
        fraction: Dec,
        infraction: &Infraction,
        cutoff: SlashCutoff,
        now: u64,
    ) -> Amount {
        let mut slashed: Amount = 0;
        for (_, list) in self
            .entries
            .range_mut((*validator, Address::ZERO)..=(*validator, Address::MAX))
        {
            for entry in list
                .iter_mut()
                .filter(|e| entry_is_slashable(e, infraction, cutoff, now))
            {
                let penalty = compute_penalty(fraction, entry.balance);
                entry.balance -= penalty;
                slashed += penalty;
            }
        }
        slashed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::bwk;

    const PERIOD: u64 = 100;

    fn pair() -> (Address, Address) {
        (Address::repeat_byte(0xd), Address::repeat_byte(0xa))
    }

    #[test]
    fn test_push_and_balance() {
        let (del, val) = pair();
        let mut queue = UnbondingQueue::new();
        queue
            .push(&del, &val, UnbondingEntry::new(bwk(5), 1, 10, PERIOD), 7)
            .unwrap();
        queue
            .push(&del, &val, UnbondingEntry::new(bwk(3), 2, 20, PERIOD), 7)
            .unwrap();

        assert_eq!(queue.entries(&del, &val).len(), 2);
        assert_eq!(queue.entries(&del, &val)[0].completion_time, 110);
        assert_eq!(queue.balance(&del, &val, 110), (bwk(5), bwk(8)));
        assert!(queue.has_entries_for(&val));
        assert!(!queue.has_entries_for(&del));
    }

    #[test]
    fn test_entry_limit() {
        let (del, val) = pair();
        let mut queue = UnbondingQueue::new();
        for i in 0..2 {
            queue
                .push(&del, &val, UnbondingEntry::new(1, i, i, PERIOD), 2)
                .unwrap();
        }
        assert_eq!(
            queue.push(&del, &val, UnbondingEntry::new(1, 9, 9, PERIOD), 2),
            Err(StakingError::TooManyUnbondingEntries { max: 2 })
        );
        assert_eq!(queue.entries(&del, &val).len(), 2);
    }

    #[test]
    fn test_withdraw_only_matured() {
        let (del, val) = pair();
        let mut queue = UnbondingQueue::new();
        queue
            .push(&del, &val, UnbondingEntry::new(bwk(5), 1, 10, PERIOD), 7)
            .unwrap();
        queue
            .push(&del, &val, UnbondingEntry::new(bwk(3), 2, 20, PERIOD), 7)
            .unwrap();

        assert_eq!(queue.withdraw_matured(&del, &val, 109).unwrap(), 0);
        assert_eq!(queue.withdraw_matured(&del, &val, 110).unwrap(), bwk(5));
        assert_eq!(queue.entries(&del, &val).len(), 1);
        assert_eq!(queue.withdraw_matured(&del, &val, 500).unwrap(), bwk(3));
        assert!(!queue.has_entries_for(&val));
    }

    #[test]
    fn test_withdraw_without_entries() {
        let (del, val) = pair();
        let mut queue = UnbondingQueue::new();
        assert!(matches!(
            queue.withdraw_matured(&del, &val, 0),
            Err(StakingError::InsufficientStake { .. })
        ));
    }

    #[test]
    fn test_slash_skips_late_and_matured_entries() {
        let (del, val) = pair();
        let mut queue = UnbondingQueue::new();
        // created at height 5, before the infraction
        queue
            .push(&del, &val, UnbondingEntry::new(bwk(10), 5, 50, PERIOD), 7)
            .unwrap();
        // created after the infraction
        queue
            .push(&del, &val, UnbondingEntry::new(bwk(10), 20, 60, PERIOD), 7)
            .unwrap();
        // already matured
        queue
            .push(&del, &val, UnbondingEntry::new(bwk(10), 1, 0, PERIOD), 7)
            .unwrap();

        let infraction = Infraction { height: 10, time: 55 };
        let slashed = queue.slash_validator_entries(
            &val,
            Dec::percent(50),
            &infraction,
            SlashCutoff::Height,
            100,
        );
        assert_eq!(slashed, bwk(5));
        let entries = queue.entries(&del, &val);
        assert_eq!(entries[0].balance, bwk(5));
        assert_eq!(entries[0].initial_balance, bwk(10));
        assert_eq!(entries[1].balance, bwk(10));
        assert_eq!(entries[2].balance, bwk(10));
    }

    #[test]
    fn test_slash_only_touches_target_validator() {
        let (del, val) = pair();
        let other = Address::repeat_byte(0xb);
        let mut queue = UnbondingQueue::new();
        queue
            .push(&del, &other, UnbondingEntry::new(bwk(10), 1, 1, PERIOD), 7)
            .unwrap();
        let infraction = Infraction { height: 10, time: 10 };
        assert_eq!(
            queue.slash_validator_entries(&val, Dec::percent(50), &infraction, SlashCutoff::Height, 5),
            0
        );
        assert_eq!(queue.entries(&del, &other)[0].balance, bwk(10));
    }
}
