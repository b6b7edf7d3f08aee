// crates/bulwark-staking/src/engine.rs
//
// The staking engine. Owns every validator, delegation and unbonding entry,
// the active-set index, the minter and the community pool.
//
// Block lifecycle, driven by the authority:
//   begin_block(N)    -> advance the clock, freeze the active set, each
//                        member's share count, the bonded total and the params
//   finalize_block(N) -> mint, distribute over the frozen state, update liveness
//
// User operations run against the clock of the last begin_block, including
// while a block is open. A pair whose shares change during an open block still
// earns that block's reward on the shares it held when the block opened. Every
// operation validates before it mutates, so an error leaves the engine exactly
// as it was.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use bulwark_core::{Address, Dec, StakingError};

use crate::community_pool::CommunityPool;
use crate::config::StakingConfig;
use crate::distribution::{allocate_block_rewards, credit_validator, pending_reward, settle, take_reward};
use crate::minter::{Minter, MinterParams};
use crate::params::Params;
use crate::shares::{Delegation, ShareLedger};
use crate::slashing::{Infraction, SlashCondition, SlashResult};
use crate::token::{serde_amount, Amount, Bwk};
use crate::unbonding::{UnbondingEntry, UnbondingQueue};
use crate::validator::{CommissionRates, Validator};
use crate::valset::{ValidatorPower, ValidatorSetIndex};

/// Height and timestamp (seconds) of a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub time: u64,
}

/// What consensus reports when a block is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCommit {
    pub proposer: Address,
    /// One flag per member of the set snapshotted by `begin_block`, in order.
    pub signed: Vec<bool>,
    #[serde(with = "serde_amount")]
    pub fee_collected: Amount,
}

/// Summary of a finalized block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockOutcome {
    pub height: u64,
    pub minted: Amount,
    /// Amount credited to each validator before the commission split.
    pub rewards: Vec<(Address, Amount)>,
    /// Amount added to the community pool by this block.
    pub community: Amount,
    pub jailed: Vec<Address>,
    pub slashed: Vec<SlashResult>,
}

/// Changes requested by a validator operator. `None` leaves a field as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidatorUpdate {
    pub commission_rate: Option<Dec>,
    pub min_self_delegation: Option<Amount>,
}

/// Result of `undelegate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Undelegation {
    pub shares_burned: u128,
    /// Tokens moved into the new unbonding entry.
    pub amount: Amount,
    pub completion_time: u64,
    /// Rewards paid out because the delegation was closed.
    pub rewards_paid: Amount,
}

/// State frozen by `begin_block` for the block being processed.
#[derive(Debug, Clone)]
struct OpenBlock {
    set: Vec<ValidatorPower>,
    /// Shares outstanding per set member when the block opened.
    share_base: BTreeMap<Address, u128>,
    total_bonded: Amount,
    params: Params,
    minter_params: MinterParams,
    /// Shares each (validator, delegator) pair held when the block opened,
    /// recorded on the pair's first share change during the block.
    opening_shares: BTreeMap<(Address, Address), u128>,
}

/// Validator economics state machine.
#[derive(Debug, Clone)]
pub struct Staking {
    authority: Address,
    params: Params,
    minter_params: MinterParams,
    minter: Minter,
    validators: BTreeMap<Address, Validator>,
    delegations: ShareLedger,
    unbonding: UnbondingQueue,
    index: ValidatorSetIndex,
    community_pool: CommunityPool,
    /// Sum of bonded tokens over all validators, jailed ones included.
    total_bonded: Amount,
    block: BlockInfo,
    open_block: Option<OpenBlock>,
}

impl Staking {
    /// # Errors
    /// Returns `StakingError::InvalidParams` if the configured parameters are
    /// inconsistent.
    pub fn new(config: StakingConfig) -> Result<Self, StakingError> {
        config.validate()?;
        tracing::info!(
            "Staking engine initialized: authority {}, supply {}",
            config.authority,
            Bwk(config.initial_supply)
        );
        Ok(Self {
            authority: config.authority,
            params: config.params,
            minter_params: config.minter,
            minter: Minter::new(config.initial_supply),
            validators: BTreeMap::new(),
            delegations: ShareLedger::new(),
            unbonding: UnbondingQueue::new(),
            index: ValidatorSetIndex::new(),
            community_pool: CommunityPool::new(),
            total_bonded: 0,
            block: BlockInfo::default(),
            open_block: None,
        })
    }

    // -----------------------------------------------------------------------
    // Validator operations
    // -----------------------------------------------------------------------

    /// Register `operator` as a validator bonded with `amount` of its own
    /// tokens. Returns the self-delegation shares.
    ///
    /// # Errors
    /// `InvalidCommissionConfig` for inconsistent rates, `ValidatorExists` (or
    /// `ValidatorTombstoned`) if the address is taken, `InvalidAmount` for a
    /// zero bond, and `BelowMinSelfDelegation` if the bond is under the floor.
    pub fn create_validator(
        &mut self,
        operator: Address,
        amount: Amount,
        rates: CommissionRates,
        min_self_delegation: Amount,
    ) -> Result<u128, StakingError> {
        rates.validate()?;
        if let Some(existing) = self.validators.get(&operator) {
            if existing.tombstoned {
                return Err(StakingError::ValidatorTombstoned(operator));
            }
            return Err(StakingError::ValidatorExists(operator));
        }
        if amount == 0 {
            return Err(StakingError::InvalidAmount(
                "initial self bond must be positive".to_string(),
            ));
        }
        if amount < min_self_delegation {
            return Err(StakingError::BelowMinSelfDelegation {
                self_stake: amount,
                minimum: min_self_delegation,
            });
        }

        let mut validator = Validator::new(
            operator,
            rates,
            min_self_delegation,
            self.params.signed_blocks_window,
            self.block.time,
        );
        let shares = validator.pool.deposit(amount)?;
        self.delegations
            .get_or_create(&operator, &operator, validator.reward_per_share)
            .shares = shares;
        self.validators.insert(operator, validator);
        self.total_bonded = self.total_bonded.saturating_add(amount);
        self.refresh_index(&operator);

        tracing::info!(
            "Validator {} created with self bond {} (commission {})",
            operator,
            Bwk(amount),
            rates.rate
        );
        Ok(shares)
    }

    /// Change the commission rate and/or raise the minimum self delegation.
    ///
    /// # Errors
    /// `CooldownNotElapsed` or `InvalidCommissionConfig` for a rejected rate;
    /// `InvalidAmount` if the minimum would not rise; `BelowMinSelfDelegation`
    /// if the new minimum exceeds the current self stake.
    pub fn update_validator(
        &mut self,
        operator: Address,
        update: ValidatorUpdate,
    ) -> Result<(), StakingError> {
        let now = self.block.time;
        let self_stake = self.self_delegation(&operator);
        let validator = self.validator(&operator).ok_or(StakingError::ValidatorNotFound(operator))?;

        if let Some(rate) = update.commission_rate {
            validator
                .commission
                .validate_update(rate, now, self.params.commission_update_cooldown)?;
        }
        if let Some(minimum) = update.min_self_delegation {
            if minimum <= validator.min_self_delegation {
                return Err(StakingError::InvalidAmount(format!(
                    "min self delegation can only increase (currently {})",
                    validator.min_self_delegation
                )));
            }
            if minimum > self_stake {
                return Err(StakingError::BelowMinSelfDelegation {
                    self_stake,
                    minimum,
                });
            }
        }

        let validator = self.validator_mut(&operator)?;
        if let Some(rate) = update.commission_rate {
            validator.commission.rates.rate = rate;
            validator.commission.last_update_time = now;
            tracing::info!("Validator {} commission rate set to {}", operator, rate);
        }
        if let Some(minimum) = update.min_self_delegation {
            validator.min_self_delegation = minimum;
            tracing::info!(
                "Validator {} min self delegation raised to {}",
                operator,
                Bwk(minimum)
            );
        }
        Ok(())
    }

    /// Return a jailed validator to the active set once its jail time is over.
    ///
    /// # Errors
    /// `ValidatorTombstoned`, `ValidatorNotJailed`, `CooldownNotElapsed` before
    /// `jailed_until`, and `BelowMinSelfDelegation` if the self stake is under
    /// the floor.
    pub fn unjail(&mut self, operator: Address) -> Result<(), StakingError> {
        let now = self.block.time;
        let self_stake = self.self_delegation(&operator);
        let validator = self.validator(&operator).ok_or(StakingError::ValidatorNotFound(operator))?;
        if validator.tombstoned {
            return Err(StakingError::ValidatorTombstoned(operator));
        }
        if !validator.is_jailed() {
            return Err(StakingError::ValidatorNotJailed(operator));
        }
        if now < validator.jailed_until {
            return Err(StakingError::CooldownNotElapsed {
                allowed_at: validator.jailed_until,
                now,
            });
        }
        if self_stake < validator.min_self_delegation {
            return Err(StakingError::BelowMinSelfDelegation {
                self_stake,
                minimum: validator.min_self_delegation,
            });
        }

        self.validator_mut(&operator)?.unjail();
        self.refresh_index(&operator);
        tracing::info!("Validator {} unjailed", operator);
        Ok(())
    }

    /// Pay out the validator's accumulated commission.
    pub fn withdraw_validator_commission(&mut self, operator: Address) -> Result<Amount, StakingError> {
        let commission = self.validator_mut(&operator)?.take_commission();
        tracing::debug!("Validator {} withdrew commission {}", operator, Bwk(commission));
        self.maybe_destroy(&operator);
        Ok(commission)
    }

    // -----------------------------------------------------------------------
    // Delegator operations
    // -----------------------------------------------------------------------

    /// Bond `amount` from `delegator` to `validator`. Returns the minted shares.
    ///
    /// Jailed validators only accept delegations from their own operator.
    ///
    /// # Errors
    /// `ValidatorNotFound`, `ValidatorTombstoned`, `ValidatorJailed`, and
    /// `InvalidAmount` when the deposit mints no shares.
    pub fn delegate(
        &mut self,
        delegator: Address,
        validator: Address,
        amount: Amount,
    ) -> Result<u128, StakingError> {
        let record = self
            .validators
            .get_mut(&validator)
            .ok_or(StakingError::ValidatorNotFound(validator))?;
        if record.tombstoned {
            return Err(StakingError::ValidatorTombstoned(validator));
        }
        if record.is_jailed() && delegator != validator {
            return Err(StakingError::ValidatorJailed(validator));
        }

        let shares = record.pool.deposit(amount)?;
        let reward_per_share = record.reward_per_share;
        self.note_share_change(&delegator, &validator);
        let delegation = self
            .delegations
            .get_or_create(&delegator, &validator, reward_per_share);
        settle(delegation, reward_per_share);
        delegation.shares = delegation.shares.saturating_add(shares);

        self.total_bonded = self.total_bonded.saturating_add(amount);
        self.refresh_index(&validator);
        tracing::debug!(
            "{} delegated {} to {} ({} shares)",
            delegator,
            Bwk(amount),
            validator,
            shares
        );
        Ok(shares)
    }

    /// Unbond `amount` of token value from a delegation into a new unbonding
    /// entry maturing after the unbonding period.
    ///
    /// Closing a delegation completely also pays out its pending rewards.
    ///
    /// # Errors
    /// `InvalidAmount` for zero, `DelegationNotFound`, `InsufficientStake` if
    /// `amount` exceeds the delegation's value, `BelowMinSelfDelegation` if an
    /// operator would keep a nonzero self stake under its floor, and
    /// `TooManyUnbondingEntries`.
    pub fn undelegate(
        &mut self,
        delegator: Address,
        validator: Address,
        amount: Amount,
    ) -> Result<Undelegation, StakingError> {
        if amount == 0 {
            return Err(StakingError::InvalidAmount(
                "undelegation amount must be positive".to_string(),
            ));
        }
        let record = self
            .validator(&validator)
            .ok_or(StakingError::ValidatorNotFound(validator))?;
        let delegation = self
            .delegations
            .get(&delegator, &validator)
            .ok_or(StakingError::DelegationNotFound {
                delegator,
                validator,
            })?;

        let value = record.pool.token_value(delegation.shares);
        if amount > value {
            return Err(StakingError::InsufficientStake {
                requested: amount,
                available: value,
            });
        }
        let shares_burned = if amount == value {
            delegation.shares
        } else {
            record.pool.shares_to_burn(amount).min(delegation.shares)
        };
        if delegator == validator {
            let remaining = value - amount;
            if remaining > 0 && remaining < record.min_self_delegation {
                return Err(StakingError::BelowMinSelfDelegation {
                    self_stake: remaining,
                    minimum: record.min_self_delegation,
                });
            }
        }
        let max_entries = self.params.max_unbonding_entries;
        self.unbonding
            .check_capacity(&delegator, &validator, max_entries)?;

        self.note_share_change(&delegator, &validator);
        let record = self.validator_mut(&validator)?;
        let reward_per_share = record.reward_per_share;
        let removed = record.pool.withdraw(shares_burned, amount);

        let mut rewards_paid = 0;
        if let Some(delegation) = self.delegations.get_mut(&delegator, &validator) {
            settle(delegation, reward_per_share);
            delegation.shares -= shares_burned;
            if delegation.shares == 0 {
                rewards_paid = std::mem::take(&mut delegation.pending_rewards);
            }
            if delegation.is_spent() {
                self.delegations.remove(&delegator, &validator);
            }
        }
        self.total_bonded = self.total_bonded.saturating_sub(removed);

        let entry = UnbondingEntry::new(
            removed,
            self.block.height,
            self.block.time,
            self.params.unbonding_period,
        );
        let completion_time = entry.completion_time;
        self.unbonding
            .push(&delegator, &validator, entry, max_entries)?;
        self.refresh_index(&validator);

        tracing::debug!(
            "{} undelegated {} from {}, unlocks at {}",
            delegator,
            Bwk(removed),
            validator,
            completion_time
        );
        Ok(Undelegation {
            shares_burned,
            amount: removed,
            completion_time,
            rewards_paid,
        })
    }

    /// Pay out every matured unbonding entry of the pair.
    ///
    /// # Errors
    /// `InsufficientStake` if the pair has no unbonding entries at all.
    pub fn withdraw(&mut self, delegator: Address, validator: Address) -> Result<Amount, StakingError> {
        let paid = self
            .unbonding
            .withdraw_matured(&delegator, &validator, self.block.time)?;
        if paid > 0 {
            tracing::debug!("{} withdrew {} unbonded from {}", delegator, Bwk(paid), validator);
        }
        self.maybe_destroy(&validator);
        Ok(paid)
    }

    /// Pay out the rewards accrued by a delegation and reset its checkpoint.
    pub fn withdraw_delegation_reward(
        &mut self,
        delegator: Address,
        validator: Address,
    ) -> Result<Amount, StakingError> {
        let reward_per_share = self
            .validator(&validator)
            .ok_or(StakingError::ValidatorNotFound(validator))?
            .reward_per_share;
        let delegation = self
            .delegations
            .get_mut(&delegator, &validator)
            .ok_or(StakingError::DelegationNotFound {
                delegator,
                validator,
            })?;
        let reward = take_reward(delegation, reward_per_share);
        if delegation.is_spent() {
            self.delegations.remove(&delegator, &validator);
            self.maybe_destroy(&validator);
        }
        Ok(reward)
    }

    // -----------------------------------------------------------------------
    // Privileged operations
    // -----------------------------------------------------------------------

    /// Open block `block`: advance the clock and freeze the state the matching
    /// `finalize_block` rewards and holds accountable: the active set, each
    /// member's share count, the bonded total, and both parameter sets.
    ///
    /// # Errors
    /// `Unauthorized`; `InvalidState` if a block is already open, the height
    /// does not increase, or time goes backwards.
    pub fn begin_block(&mut self, caller: Address, block: BlockInfo) -> Result<(), StakingError> {
        self.ensure_authority(&caller)?;
        if self.open_block.is_some() {
            return Err(StakingError::InvalidState(format!(
                "block {} is still open",
                self.block.height
            )));
        }
        if block.height <= self.block.height {
            return Err(StakingError::InvalidState(format!(
                "block height {} does not follow {}",
                block.height, self.block.height
            )));
        }
        if block.time < self.block.time {
            return Err(StakingError::InvalidState(format!(
                "block time {} is before {}",
                block.time, self.block.time
            )));
        }

        self.block = block;
        let set = self.index.top(self.params.max_validators as usize);
        let share_base = set
            .iter()
            .map(|member| {
                let shares = self
                    .validators
                    .get(&member.operator)
                    .map_or(0, |v| v.pool.shares);
                (member.operator, shares)
            })
            .collect();
        tracing::debug!(
            "Block {} opened with {} of {} eligible validators active",
            block.height,
            set.len(),
            self.index.len()
        );
        self.open_block = Some(OpenBlock {
            set,
            share_base,
            total_bonded: self.total_bonded,
            params: self.params.clone(),
            minter_params: self.minter_params.clone(),
            opening_shares: BTreeMap::new(),
        });
        Ok(())
    }

    /// Close the open block: mint the block provision, distribute it with the
    /// collected fees over the state frozen by `begin_block`, and update every
    /// member's liveness.
    ///
    /// # Errors
    /// `Unauthorized`; `InvalidState` if no block is open or the signing
    /// bitmap does not match the frozen set.
    pub fn finalize_block(
        &mut self,
        caller: Address,
        commit: &BlockCommit,
    ) -> Result<BlockOutcome, StakingError> {
        self.ensure_authority(&caller)?;
        let set_len = self
            .open_block
            .as_ref()
            .map(|open| open.set.len())
            .ok_or_else(|| StakingError::InvalidState("no open block".to_string()))?;
        if commit.signed.len() != set_len {
            return Err(StakingError::InvalidState(format!(
                "signing bitmap has {} entries, active set has {}",
                commit.signed.len(),
                set_len
            )));
        }
        let open = self
            .open_block
            .take()
            .ok_or_else(|| StakingError::InvalidState("no open block".to_string()))?;
        let params = &open.params;

        let minted = self.minter.mint(&open.minter_params, open.total_bonded);
        let total = commit.fee_collected.saturating_add(minted);
        let allocation =
            allocate_block_rewards(total, &open.set, &commit.signed, &commit.proposer, params);

        let mut community = allocation.community;
        let mut increments = BTreeMap::new();
        for (operator, amount) in &allocation.validator_rewards {
            let Some(validator) = self.validators.get_mut(operator) else {
                community += *amount;
                continue;
            };
            let shares = open.share_base.get(operator).copied().unwrap_or(0);
            let before = validator.reward_per_share;
            community += credit_validator(validator, *amount, shares);
            increments.insert(*operator, validator.reward_per_share.saturating_sub(before));
        }
        self.community_pool.deposit(community);
        self.accrue_on_opening_shares(&open.opening_shares, &increments);

        let window = params.signed_blocks_window;
        let max_missed = params.max_missed_blocks();
        let jailed_until = self
            .block
            .time
            .saturating_add(params.downtime_jail_duration);
        let mut jailed = Vec::new();
        for (member, signed) in open.set.iter().zip(&commit.signed) {
            let Some(validator) = self.validators.get_mut(&member.operator) else {
                continue;
            };
            if validator.is_jailed() {
                continue;
            }
            let missed = validator.missed_blocks.record(*signed, window);
            if missed > max_missed {
                validator.jail(jailed_until);
                jailed.push(member.operator);
            }
        }

        let mut slashed = Vec::new();
        let infraction = Infraction {
            height: self.block.height,
            time: self.block.time,
        };
        for operator in &jailed {
            tracing::info!(
                "Validator {} jailed for downtime until {}",
                operator,
                jailed_until
            );
            let fraction = params.slash_fraction_downtime;
            if !fraction.is_zero() {
                slashed.push(self.slash(operator, SlashCondition::Downtime, fraction, &infraction));
            }
            self.refresh_index(operator);
        }
        // Members emptied while the block was open are removed now.
        for member in &open.set {
            self.maybe_destroy(&member.operator);
        }

        tracing::debug!(
            "Block {} finalized: minted {}, fees {}, community {}",
            self.block.height,
            Bwk(minted),
            Bwk(commit.fee_collected),
            Bwk(community)
        );
        Ok(BlockOutcome {
            height: self.block.height,
            minted,
            rewards: allocation.validator_rewards,
            community,
            jailed,
            slashed,
        })
    }

    /// Punish double-sign evidence against `validator`: slash its bonded stake
    /// and its still-exposed unbonding entries, jail it, and tombstone it when
    /// configured to.
    ///
    /// # Errors
    /// `Unauthorized`, `ValidatorNotFound`, and `ValidatorTombstoned` if it
    /// was already tombstoned.
    pub fn double_sign(
        &mut self,
        caller: Address,
        validator: Address,
        infraction: Infraction,
    ) -> Result<SlashResult, StakingError> {
        self.ensure_authority(&caller)?;
        let Some(record) = self.validators.get(&validator) else {
            tracing::warn!("Double-sign evidence for unknown validator {}", validator);
            return Err(StakingError::ValidatorNotFound(validator));
        };
        if record.tombstoned {
            tracing::warn!("Double-sign evidence for tombstoned validator {}", validator);
            return Err(StakingError::ValidatorTombstoned(validator));
        }

        let fraction = self.params.slash_fraction_double_sign;
        let mut result = self.slash(&validator, SlashCondition::DoubleSign, fraction, &infraction);

        let tombstone = self.params.tombstone_on_double_sign;
        let jailed_until = if tombstone {
            u64::MAX
        } else {
            self.block
                .time
                .saturating_add(self.params.downtime_jail_duration)
        };
        let record = self.validator_mut(&validator)?;
        record.jail(jailed_until);
        record.tombstoned = tombstone;
        result.tombstoned = tombstone;
        self.refresh_index(&validator);

        tracing::info!(
            "Validator {} jailed for double sign at height {}{}",
            validator,
            infraction.height,
            if tombstone { " and tombstoned" } else { "" }
        );
        Ok(result)
    }

    /// Replace the global parameters and re-rank every validator under them.
    pub fn set_params(&mut self, caller: Address, params: Params) -> Result<(), StakingError> {
        self.ensure_authority(&caller)?;
        params.validate()?;
        self.params = params;
        let operators: Vec<Address> = self.validators.keys().copied().collect();
        for operator in &operators {
            self.refresh_index(operator);
        }
        tracing::info!("Staking params updated");
        Ok(())
    }

    pub fn set_minter_params(&mut self, caller: Address, params: MinterParams) -> Result<(), StakingError> {
        self.ensure_authority(&caller)?;
        params.validate()?;
        self.minter_params = params;
        tracing::info!("Minter params updated");
        Ok(())
    }

    /// Overwrite the minter's total supply (genesis import, test setup).
    pub fn set_total_supply(&mut self, caller: Address, total_supply: Amount) -> Result<(), StakingError> {
        self.ensure_authority(&caller)?;
        self.minter.set_total_supply(total_supply);
        tracing::info!("Total supply set to {}", Bwk(total_supply));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Current active set, ordered by power descending then address.
    pub fn validator_set(&self) -> Vec<ValidatorPower> {
        self.index.top(self.params.max_validators as usize)
    }

    pub fn validator(&self, operator: &Address) -> Option<&Validator> {
        self.validators.get(operator)
    }

    pub fn validators(&self) -> impl Iterator<Item = &Validator> {
        self.validators.values()
    }

    pub fn delegation(&self, delegator: &Address, validator: &Address) -> Option<&Delegation> {
        self.delegations.get(delegator, validator)
    }

    /// Token value of a delegation at the current exchange rate.
    pub fn delegation_stake(&self, delegator: &Address, validator: &Address) -> Amount {
        match (
            self.validators.get(validator),
            self.delegations.get(delegator, validator),
        ) {
            (Some(record), Some(delegation)) => record.pool.token_value(delegation.shares),
            _ => 0,
        }
    }

    pub fn self_delegation(&self, operator: &Address) -> Amount {
        self.delegation_stake(operator, operator)
    }

    pub fn pending_rewards(&self, delegator: &Address, validator: &Address) -> Amount {
        match (
            self.validators.get(validator),
            self.delegations.get(delegator, validator),
        ) {
            (Some(record), Some(delegation)) => pending_reward(delegation, record.reward_per_share),
            _ => 0,
        }
    }

    pub fn pending_commission(&self, operator: &Address) -> Amount {
        self.validators
            .get(operator)
            .map_or(0, |v| v.accumulated_commission)
    }

    pub fn unbonding_entries(&self, delegator: &Address, validator: &Address) -> &[UnbondingEntry] {
        self.unbonding.entries(delegator, validator)
    }

    /// (withdrawable now, total pending) for the pair.
    pub fn unbonding_balance(&self, delegator: &Address, validator: &Address) -> (Amount, Amount) {
        self.unbonding.balance(delegator, validator, self.block.time)
    }

    pub fn minter(&self) -> &Minter {
        &self.minter
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn minter_params(&self) -> &MinterParams {
        &self.minter_params
    }

    pub fn community_pool(&self) -> Amount {
        self.community_pool.balance()
    }

    pub fn total_bonded(&self) -> Amount {
        self.total_bonded
    }

    pub fn block(&self) -> BlockInfo {
        self.block
    }

    pub fn authority(&self) -> Address {
        self.authority
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn ensure_authority(&self, caller: &Address) -> Result<(), StakingError> {
        if *caller != self.authority {
            return Err(StakingError::Unauthorized(*caller));
        }
        Ok(())
    }

    fn validator_mut(&mut self, operator: &Address) -> Result<&mut Validator, StakingError> {
        self.validators
            .get_mut(operator)
            .ok_or(StakingError::ValidatorNotFound(*operator))
    }

    /// Re-index `operator` after any change to its stake, status or the
    /// parameters. Jailed, tombstoned, under-collateralized and zero-power
    /// validators drop out.
    fn refresh_index(&mut self, operator: &Address) {
        let power = self.validators.get(operator).and_then(|v| {
            let eligible = !v.is_jailed()
                && !v.tombstoned
                && self.self_delegation(operator) >= v.min_self_delegation;
            eligible.then(|| v.voting_power(self.params.power_reduction))
        });
        self.index.update(*operator, power);
    }

    /// Remember the pair's shares as of the open block's start, before its
    /// first change during that block.
    fn note_share_change(&mut self, delegator: &Address, validator: &Address) {
        let shares = self
            .delegations
            .get(delegator, validator)
            .map_or(0, |d| d.shares);
        if let Some(open) = self.open_block.as_mut() {
            open.opening_shares
                .entry((*validator, *delegator))
                .or_insert(shares);
        }
    }

    /// Re-base the block reward of every pair whose shares changed while the
    /// block was open: it accrues `increment * opening shares` instead of
    /// `increment * current shares`. A pair closed during the block gets its
    /// record back holding only that reward.
    fn accrue_on_opening_shares(
        &mut self,
        opening_shares: &BTreeMap<(Address, Address), u128>,
        increments: &BTreeMap<Address, Dec>,
    ) {
        for (&(validator, delegator), &opened) in opening_shares {
            let Some(&increment) = increments.get(&validator) else {
                continue;
            };
            let Some(reward_per_share) = self.validator(&validator).map(|v| v.reward_per_share) else {
                continue;
            };
            if increment.is_zero() {
                continue;
            }
            let delegation = self
                .delegations
                .get_or_create(&delegator, &validator, reward_per_share);
            settle(delegation, reward_per_share);
            delegation.pending_rewards = delegation
                .pending_rewards
                .saturating_sub(increment.mul_int(delegation.shares))
                .saturating_add(increment.mul_int(opened));
            if delegation.is_spent() {
                self.delegations.remove(&delegator, &validator);
            }
        }
    }

    /// Slash bonded stake and exposed unbonding entries, and burn the
    /// penalty. Share counts stay unchanged.
    fn slash(
        &mut self,
        operator: &Address,
        condition: SlashCondition,
        fraction: Dec,
        infraction: &Infraction,
    ) -> SlashResult {
        let bonded_slashed = self
            .validators
            .get_mut(operator)
            .map_or(0, |v| v.pool.slash(fraction));
        let unbonding_slashed = self.unbonding.slash_validator_entries(
            operator,
            fraction,
            infraction,
            self.params.unbonding_slash_cutoff,
            self.block.time,
        );
        self.total_bonded = self.total_bonded.saturating_sub(bonded_slashed);

        let result = SlashResult {
            condition,
            validator: *operator,
            bonded_slashed,
            unbonding_slashed,
            tombstoned: false,
        };
        self.minter.burn(result.total());
        tracing::info!(
            "Slashed validator {} for {:?}: {} bonded, {} unbonding",
            operator,
            condition,
            Bwk(bonded_slashed),
            Bwk(unbonding_slashed)
        );
        result
    }

    /// Delete a validator with nothing left in it so its address can be
    /// registered again. Tombstoned records are kept forever, and members of
    /// the open block wait until it is finalized.
    fn maybe_destroy(&mut self, operator: &Address) {
        if self
            .open_block
            .as_ref()
            .is_some_and(|open| open.share_base.contains_key(operator))
        {
            return;
        }
        let empty = self.validators.get(operator).is_some_and(|v| {
            v.pool.is_empty() && v.accumulated_commission == 0 && !v.tombstoned
        });
        if empty
            && !self.unbonding.has_entries_for(operator)
            && !self.delegations.has_delegations_for(operator)
        {
            self.validators.remove(operator);
            self.index.remove(operator);
            tracing::info!("Validator {} removed", operator);
        }
    }
}
