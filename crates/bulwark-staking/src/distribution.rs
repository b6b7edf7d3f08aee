// crates/bulwark-staking/src/distribution.rs
//
// Per-block reward distribution.
//
// Each block's reward (collected fees + minted provision) is split as follows:
//   1. community_tax goes to the community pool.
//   2. The proposer earns base_proposer_reward + bonus_proposer_reward scaled
//      by the signed fraction of voting power (community pool if the proposer
//      is not in the set).
//   3. The rest is split across the set proportional to voting power.
//   4. Truncation leftovers go to the community pool, so every atto is
//      accounted for exactly once.
//
// A validator's share is then split into commission and a delegator pool. The
// pool raises the validator's reward-per-share accumulator; a delegation's
// reward is shares * (accumulator - checkpoint), settled in O(1) regardless of
// how many blocks have passed.

use serde::{Deserialize, Serialize};

use bulwark_core::{mul_div, Address, Dec};

use crate::params::Params;
use crate::shares::Delegation;
use crate::token::Amount;
use crate::validator::Validator;
use crate::valset::ValidatorPower;

/// How one block's reward is apportioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockAllocation {
    /// Per-validator amounts, proposer bonus included, in set order.
    pub validator_rewards: Vec<(Address, Amount)>,
    /// Community tax, unpaid proposer bonus, and truncation leftovers.
    pub community: Amount,
}

/// Apportion `total` across `set`.
///
/// `signed[i]` reports whether `set[i]` signed the block; a shorter slice
/// counts the missing entries as unsigned.
pub fn allocate_block_rewards(
    total: Amount,
    set: &[ValidatorPower],
    signed: &[bool],
    proposer: &Address,
    params: &Params,
) -> BlockAllocation {
    let total_power: u128 = set.iter().map(|v| v.power as u128).sum();
    if total == 0 || total_power == 0 {
        return BlockAllocation {
            validator_rewards: Vec::new(),
            community: total,
        };
    }

    let community_tax = params.community_tax.mul_int(total);
    let signed_power: u128 = set
        .iter()
        .zip(signed)
        .filter(|(_, s)| **s)
        .map(|(v, _)| v.power as u128)
        .sum();
    let proposer_multiplier = params.base_proposer_reward.saturating_add(
        params
            .bonus_proposer_reward
            .mul(Dec::from_ratio(signed_power, total_power)),
    );
    let proposer_reward = proposer_multiplier
        .mul_int(total)
        .min(total - community_tax);
    let remaining = total - community_tax - proposer_reward;

    let mut validator_rewards = Vec::with_capacity(set.len());
    let mut distributed: Amount = 0;
    for member in set {
        let mut reward = mul_div(remaining, member.power as u128, total_power);
        if member.operator == *proposer {
            reward += proposer_reward;
        }
        distributed += reward;
        validator_rewards.push((member.operator, reward));
    }

    BlockAllocation {
        validator_rewards,
        community: total - distributed,
    }
}

/// Commission and delegator portions of a validator's reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardSplit {
    pub commission: Amount,
    pub delegator_pool: Amount,
}

pub fn split_commission(amount: Amount, rate: Dec) -> RewardSplit {
    let commission = rate.mul_int(amount).min(amount);
    RewardSplit {
        commission,
        delegator_pool: amount - commission,
    }
}

/// Credit `amount` to `validator`: commission to its claimable balance, the
/// rest into its reward-per-share accumulator, spread over `shares`.
///
/// `shares` is the share count the reward was earned on, which may differ
/// from the live pool when shares moved after the block opened.
///
/// Returns the part that could not be assigned to any share (all of the
/// delegator pool when `shares` is zero, else the truncation leftover) for the
/// caller to retain.
pub fn credit_validator(validator: &mut Validator, amount: Amount, shares: u128) -> Amount {
    let split = split_commission(amount, validator.commission.rate());
    validator.accumulated_commission = validator
        .accumulated_commission
        .saturating_add(split.commission);

    if shares == 0 {
        return split.delegator_pool;
    }
    let increment = Dec::from_ratio(split.delegator_pool, shares);
    validator.reward_per_share = validator.reward_per_share.saturating_add(increment);
    split.delegator_pool - increment.mul_int(shares)
}

/// Rewards claimable by `delegation` at accumulator value `reward_per_share`.
pub fn pending_reward(delegation: &Delegation, reward_per_share: Dec) -> Amount {
    let accrued = reward_per_share
        .saturating_sub(delegation.reward_checkpoint)
        .mul_int(delegation.shares);
    delegation.pending_rewards.saturating_add(accrued)
}

/// Move accrued rewards into `pending_rewards` and advance the checkpoint.
/// Must run before the delegation's share count changes.
pub fn settle(delegation: &mut Delegation, reward_per_share: Dec) {
    delegation.pending_rewards = pending_reward(delegation, reward_per_share);
    delegation.reward_checkpoint = reward_per_share;
}

/// Pay out everything claimable and reset the checkpoint.
pub fn take_reward(delegation: &mut Delegation, reward_per_share: Dec) -> Amount {
    settle(delegation, reward_per_share);
    std::mem::take(&mut delegation.pending_rewards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::bwk;
    use crate::validator::CommissionRates;

    fn member(b: u8, power: u64) -> ValidatorPower {
        ValidatorPower {
            operator: Address::repeat_byte(b),
            power,
        }
    }

    fn dec(s: &str) -> Dec {
        s.parse().unwrap()
    }

    fn validator(rate: &str, shares: u128) -> Validator {
        let mut v = Validator::new(
            Address::repeat_byte(1),
            CommissionRates {
                rate: dec(rate),
                max_rate: Dec::ONE,
                max_change_rate: Dec::ONE,
            },
            0,
            10,
            0,
        );
        v.pool.tokens = shares;
        v.pool.shares = shares;
        v
    }

    #[test]
    fn test_proportional_split_without_bonus() {
        let set = vec![member(1, 300), member(2, 100)];
        let alloc = allocate_block_rewards(
            bwk(4),
            &set,
            &[true, true],
            &Address::repeat_byte(1),
            &Params::default(),
        );
        assert_eq!(alloc.validator_rewards[0].1, bwk(3));
        assert_eq!(alloc.validator_rewards[1].1, bwk(1));
        assert_eq!(alloc.community, 0);
    }

    #[test]
    fn test_proposer_bonus_and_leftover() {
        let params = Params {
            base_proposer_reward: dec("0.01"),
            bonus_proposer_reward: dec("0.10"),
            ..Params::default()
        };
        let set = vec![member(1, 200), member(2, 101), member(3, 1)];
        let alloc = allocate_block_rewards(
            bwk(1),
            &set,
            &[true, true, true],
            &Address::repeat_byte(1),
            &params,
        );

        // 0.11 proposer bonus + 0.89 * 200 / 302
        assert_eq!(alloc.validator_rewards[0].1, 699_403_973_509_933_774);
        let paid: Amount = alloc.validator_rewards.iter().map(|(_, r)| r).sum();
        assert_eq!(paid + alloc.community, bwk(1));
        assert_eq!(alloc.community, 2);
    }

    #[test]
    fn test_bonus_scales_with_signed_power() {
        let params = Params {
            bonus_proposer_reward: dec("0.5"),
            ..Params::default()
        };
        let set = vec![member(1, 1), member(2, 1)];
        let alloc = allocate_block_rewards(
            bwk(100),
            &set,
            &[true, false],
            &Address::repeat_byte(1),
            &params,
        );
        // bonus 25, remaining 75 split evenly
        assert_eq!(alloc.validator_rewards[0].1, bwk(25) + 37_500_000_000_000_000_000);
        assert_eq!(alloc.validator_rewards[1].1, 37_500_000_000_000_000_000);
    }

    #[test]
    fn test_absent_proposer_bonus_goes_to_community() {
        let params = Params {
            base_proposer_reward: dec("0.1"),
            community_tax: dec("0.02"),
            ..Params::default()
        };
        let set = vec![member(1, 1)];
        let alloc = allocate_block_rewards(
            bwk(100),
            &set,
            &[true],
            &Address::repeat_byte(7),
            &params,
        );
        assert_eq!(alloc.validator_rewards[0].1, bwk(88));
        assert_eq!(alloc.community, bwk(12));
    }

    #[test]
    fn test_empty_set_sends_everything_to_community() {
        let alloc = allocate_block_rewards(bwk(5), &[], &[], &Address::ZERO, &Params::default());
        assert!(alloc.validator_rewards.is_empty());
        assert_eq!(alloc.community, bwk(5));
    }

    #[test]
    fn test_split_commission() {
        let split = split_commission(699_403_973_509_933_774, dec("0.01"));
        assert_eq!(split.commission, 6_994_039_735_099_337);
        assert_eq!(split.delegator_pool, 699_403_973_509_933_774 - 6_994_039_735_099_337);
    }

    #[test]
    fn test_credit_and_settle() {
        let mut v = validator("0", bwk(200));
        let leftover = credit_validator(&mut v, 699_403_973_509_933_774, bwk(200));
        assert_eq!(leftover, 174);

        let mut d = Delegation::new(Address::repeat_byte(5), v.operator, Dec::ZERO);
        d.shares = bwk(100);
        assert_eq!(pending_reward(&d, v.reward_per_share), 349_701_986_754_966_800);
        assert_eq!(take_reward(&mut d, v.reward_per_share), 349_701_986_754_966_800);
        assert_eq!(take_reward(&mut d, v.reward_per_share), 0);
    }

    #[test]
    fn test_credit_without_shares_returns_pool() {
        let mut v = validator("0.1", 0);
        assert_eq!(credit_validator(&mut v, bwk(10), 0), bwk(9));
        assert_eq!(v.accumulated_commission, bwk(1));
        assert_eq!(v.reward_per_share, Dec::ZERO);
    }

    #[test]
    fn test_settle_preserves_pending_across_share_change() {
        let mut v = validator("0", bwk(10));
        let mut d = Delegation::new(Address::repeat_byte(5), v.operator, Dec::ZERO);
        d.shares = bwk(10);
        credit_validator(&mut v, bwk(1), bwk(10));

        settle(&mut d, v.reward_per_share);
        d.shares = bwk(20);
        assert_eq!(pending_reward(&d, v.reward_per_share), bwk(1));
    }

    #[test]
    fn test_credit_spreads_over_given_share_base() {
        // 30 live shares, but only 10 held when the reward was earned
        let mut v = validator("0", bwk(30));
        assert_eq!(credit_validator(&mut v, bwk(5), bwk(10)), 0);
        assert_eq!(v.reward_per_share, dec("0.5"));
    }
}
