// crates/bulwark-staking/src/shares.rs
//
// Delegator share accounting.
//
// Each validator owns a pool of bonded tokens and the shares issued against
// it. The exchange rate tokens/shares starts at 1:1 and floats: slashing
// lowers it without touching share counts, so every delegator loses value
// pro-rata. Deposits round shares down; withdrawals round burned shares up, so
// rounding never favours the caller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use bulwark_core::{mul_div, mul_div_ceil, Address, Dec, StakingError};

use crate::token::Amount;

/// A validator's bonded token pool and the shares outstanding against it.
///
/// Invariant: `tokens == 0` exactly when `shares == 0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePool {
    pub tokens: Amount,
    pub shares: u128,
}

impl SharePool {
    pub fn is_empty(&self) -> bool {
        self.tokens == 0 && self.shares == 0
    }

    /// Shares minted for depositing `amount`, rounded down.
    pub fn shares_for_deposit(&self, amount: Amount) -> u128 {
        if self.shares == 0 {
            amount
        } else {
            mul_div(amount, self.shares, self.tokens)
        }
    }

    /// Token value of `shares`, rounded down.
    pub fn token_value(&self, shares: u128) -> Amount {
        mul_div(shares, self.tokens, self.shares)
    }

    /// Shares that must be burned to take `amount` out, rounded up.
    pub fn shares_to_burn(&self, amount: Amount) -> u128 {
        mul_div_ceil(amount, self.shares, self.tokens)
    }

    /// Add `amount` to the pool and return the minted shares.
    ///
    /// # Errors
    /// Returns `StakingError::InvalidAmount` if the deposit is zero or too
    /// small to mint a single share at the current rate.
    pub fn deposit(&mut self, amount: Amount) -> Result<u128, StakingError> {
        let minted = self.shares_for_deposit(amount);
        if amount == 0 || minted == 0 {
            return Err(StakingError::InvalidAmount(format!(
                "deposit of {} mints no shares",
                amount
            )));
        }
        self.tokens = self.tokens.saturating_add(amount);
        self.shares = self.shares.saturating_add(minted);
        Ok(minted)
    }

    /// Burn `shares` and remove `amount` tokens.
    ///
    /// When the burn retires every outstanding share, all remaining tokens
    /// leave with it so the pool never holds tokens without owners.
    /// Returns the tokens actually removed.
    pub fn withdraw(&mut self, shares: u128, amount: Amount) -> Amount {
        let shares = shares.min(self.shares);
        let removed = if shares == self.shares {
            self.tokens
        } else {
            amount.min(self.tokens)
        };
        self.shares -= shares;
        self.tokens -= removed;
        removed
    }

    /// Remove `fraction` of the pooled tokens, leaving share counts unchanged.
    /// Returns the amount removed.
    pub fn slash(&mut self, fraction: Dec) -> Amount {
        let penalty = fraction.mul_int(self.tokens).min(self.tokens);
        self.tokens -= penalty;
        penalty
    }
}

/// A delegator's stake in one validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub delegator: Address,
    pub validator: Address,
    pub shares: u128,
    /// Validator reward-per-share at the last settlement.
    pub reward_checkpoint: Dec,
    /// Rewards settled on a share change but not yet withdrawn.
    pub pending_rewards: Amount,
}

impl Delegation {
    pub fn new(delegator: Address, validator: Address, reward_checkpoint: Dec) -> Self {
        Self {
            delegator,
            validator,
            shares: 0,
            reward_checkpoint,
            pending_rewards: 0,
        }
    }

    /// No shares and nothing left to claim.
    pub fn is_spent(&self) -> bool {
        self.shares == 0 && self.pending_rewards == 0
    }
}

/// All delegations, keyed by (validator, delegator) so a validator's
/// delegations form one contiguous range.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShareLedger {
    delegations: BTreeMap<(Address, Address), Delegation>,
}

impl ShareLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, delegator: &Address, validator: &Address) -> Option<&Delegation> {
        self.delegations.get(&(*validator, *delegator))
    }

    pub fn get_mut(&mut self, delegator: &Address, validator: &Address) -> Option<&mut Delegation> {
        self.delegations.get_mut(&(*validator, *delegator))
    }

    /// The delegation for the pair, created with `checkpoint` if absent.
    pub fn get_or_create(
        &mut self,
        delegator: &Address,
        validator: &Address,
        checkpoint: Dec,
    ) -> &mut Delegation {
        self.delegations
            .entry((*validator, *delegator))
            .or_insert_with(|| Delegation::new(*delegator, *validator, checkpoint))
    }

    pub fn remove(&mut self, delegator: &Address, validator: &Address) -> Option<Delegation> {
        self.delegations.remove(&(*validator, *delegator))
    }

    /// Delegations held against `validator`.
    pub fn for_validator<'a>(
        &'a self,
        validator: &Address,
    ) -> impl Iterator<Item = &'a Delegation> + 'a {
        self.delegations
            .range((*validator, Address::ZERO)..=(*validator, Address::MAX))
            .map(|(_, d)| d)
    }

    pub fn has_delegations_for(&self, validator: &Address) -> bool {
        self.for_validator(validator).next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::bwk;
    use proptest::prelude::*;

    #[test]
    fn test_first_deposit_is_one_to_one() {
        let mut pool = SharePool::default();
        assert_eq!(pool.deposit(bwk(100)).unwrap(), bwk(100));
        assert_eq!(pool.tokens, bwk(100));
        assert_eq!(pool.shares, bwk(100));
    }

    #[test]
    fn test_second_deposit_uses_exchange_rate() {
        let mut pool = SharePool {
            tokens: bwk(50),
            shares: bwk(100),
        };
        // 10 * 100 / 50
        assert_eq!(pool.deposit(bwk(10)).unwrap(), bwk(20));
        assert_eq!(pool.token_value(bwk(20)), bwk(10));
    }

    #[test]
    fn test_deposit_rounds_down() {
        let mut pool = SharePool { tokens: 3, shares: 2 };
        assert_eq!(pool.deposit(2).unwrap(), 1);
        assert!(matches!(pool.deposit(1), Err(StakingError::InvalidAmount(_))));
        assert!(pool.deposit(0).is_err());
    }

    #[test]
    fn test_shares_to_burn_rounds_up() {
        let pool = SharePool { tokens: 3, shares: 2 };
        assert_eq!(pool.shares_to_burn(1), 1);
        assert_eq!(pool.shares_to_burn(2), 2);
    }

    #[test]
    fn test_last_withdrawal_takes_dust() {
        let mut pool = SharePool { tokens: 10, shares: 3 };
        let removed = pool.withdraw(3, 9);
        assert_eq!(removed, 10);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_slash_keeps_shares() {
        let mut pool = SharePool {
            tokens: bwk(20),
            shares: bwk(20),
        };
        assert_eq!(pool.slash(Dec::percent(50)), bwk(10));
        assert_eq!(pool.shares, bwk(20));
        assert_eq!(pool.token_value(bwk(10)), bwk(5));
    }

    #[test]
    fn test_ledger_range_by_validator() {
        let mut ledger = ShareLedger::new();
        let val_a = Address::repeat_byte(1);
        let val_b = Address::repeat_byte(2);
        ledger.get_or_create(&Address::repeat_byte(9), &val_a, Dec::ZERO).shares = 1;
        ledger.get_or_create(&Address::repeat_byte(8), &val_a, Dec::ZERO).shares = 2;
        ledger.get_or_create(&Address::repeat_byte(9), &val_b, Dec::ZERO).shares = 3;

        assert_eq!(ledger.for_validator(&val_a).count(), 2);
        assert!(ledger.has_delegations_for(&val_b));
        assert!(!ledger.has_delegations_for(&Address::repeat_byte(3)));
        assert_eq!(ledger.get(&Address::repeat_byte(9), &val_b).unwrap().shares, 3);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Deposit(u128),
        Withdraw(u8),
        Slash(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u128..1_000_000_000_000u128).prop_map(Op::Deposit),
            (1u8..=100u8).prop_map(Op::Withdraw),
            (1u8..=99u8).prop_map(Op::Slash),
        ]
    }

    proptest! {
        #[test]
        fn test_tokens_zero_iff_shares_zero(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let mut pool = SharePool::default();
            for op in ops {
                match op {
                    Op::Deposit(amount) => {
                        let _ = pool.deposit(amount);
                    }
                    Op::Withdraw(pct) => {
                        let shares = mul_div(pool.shares, pct as u128, 100);
                        let amount = pool.token_value(shares);
                        pool.withdraw(shares, amount);
                    }
                    Op::Slash(pct) => {
                        pool.slash(Dec::percent(pct as u64));
                    }
                }
                prop_assert_eq!(pool.tokens == 0, pool.shares == 0);
            }
        }
    }
}
