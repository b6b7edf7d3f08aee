// crates/bulwark-staking/src/validator.rs
//
// Validator records: commission rules, liveness window, and jail/tombstone
// status.
//
// Lifecycle:
//   create -> Active <-> Jailed (downtime or double sign, reversible via unjail)
//   double sign with tombstoning -> Jailed + tombstoned (never unjailed)
//   tokens, shares, entries and commission all zero -> record destroyed

use serde::{Deserialize, Serialize};

use bulwark_core::{Address, Dec, StakingError};

use crate::shares::SharePool;
use crate::token::Amount;

/// Membership status of a validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidatorStatus {
    /// Eligible for the active set.
    Active,
    /// Suspended; not eligible until `unjail`.
    Jailed,
}

/// Commission bounds chosen at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionRates {
    pub rate: Dec,
    pub max_rate: Dec,
    pub max_change_rate: Dec,
}

impl CommissionRates {
    /// # Errors
    /// `StakingError::InvalidCommissionConfig` if `max_rate > 1`,
    /// `rate > max_rate`, or `max_change_rate > max_rate`.
    pub fn validate(&self) -> Result<(), StakingError> {
        if self.max_rate > Dec::ONE {
            return Err(StakingError::InvalidCommissionConfig(
                "commission max rate cannot be more than 100%".to_string(),
            ));
        }
        if self.rate > self.max_rate {
            return Err(StakingError::InvalidCommissionConfig(
                "commission rate cannot be more than the max rate".to_string(),
            ));
        }
        if self.max_change_rate > self.max_rate {
            return Err(StakingError::InvalidCommissionConfig(
                "commission max change rate cannot be more than the max rate".to_string(),
            ));
        }
        Ok(())
    }
}

/// Current commission and its change history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commission {
    pub rates: CommissionRates,
    /// Time of creation or of the last rate change.
    pub last_update_time: u64,
}

impl Commission {
    pub fn rate(&self) -> Dec {
        self.rates.rate
    }

    /// Check a rate change at `now` without applying it.
    ///
    /// # Errors
    /// `InvalidCommissionConfig` if `new_rate` exceeds the max rate or moves by
    /// more than the max change rate; `CooldownNotElapsed` inside `cooldown`
    /// seconds of the previous change.
    pub fn validate_update(&self, new_rate: Dec, now: u64, cooldown: u64) -> Result<(), StakingError> {
        if new_rate > self.rates.max_rate {
            return Err(StakingError::InvalidCommissionConfig(
                "commission cannot be more than the max rate".to_string(),
            ));
        }
        let allowed_at = self.last_update_time.saturating_add(cooldown);
        if now < allowed_at {
            return Err(StakingError::CooldownNotElapsed { allowed_at, now });
        }
        if new_rate.abs_diff(self.rates.rate) > self.rates.max_change_rate {
            return Err(StakingError::InvalidCommissionConfig(
                "commission cannot be changed more than max change rate".to_string(),
            ));
        }
        Ok(())
    }
}

/// Circular bitmap of the most recent blocks, one bit per block, set when the
/// validator missed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissedBlockWindow {
    size: u64,
    words: Vec<u64>,
    next: u64,
    missed: u64,
}

impl MissedBlockWindow {
    pub fn new(size: u64) -> Self {
        Self {
            size,
            words: vec![0; size.div_ceil(64) as usize],
            next: 0,
            missed: 0,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Misses currently inside the window.
    pub fn missed(&self) -> u64 {
        self.missed
    }

    pub fn is_missed(&self, slot: u64) -> bool {
        let (word, bit) = ((slot / 64) as usize, slot % 64);
        self.words.get(word).is_some_and(|w| (*w & (1u64 << bit)) != 0)
    }

    /// Record one block and return the updated miss count.
    ///
    /// A window built for a different size (after a parameter change) is
    /// reset to `size` first.
    pub fn record(&mut self, signed: bool, size: u64) -> u64 {
        if self.size != size {
            *self = MissedBlockWindow::new(size);
        }
        let slot = self.next;
        let (word, bit) = ((slot / 64) as usize, slot % 64);
        let was_missed = self.is_missed(slot);
        match (was_missed, signed) {
            (false, false) => {
                self.words[word] |= 1 << bit;
                self.missed += 1;
            }
            (true, true) => {
                self.words[word] &= !(1 << bit);
                self.missed -= 1;
            }
            _ => {}
        }
        self.next = (self.next + 1) % self.size;
        self.missed
    }

    pub fn clear(&mut self) {
        *self = MissedBlockWindow::new(self.size);
    }
}

/// A registered validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub operator: Address,
    pub pool: SharePool,
    pub commission: Commission,
    /// Commission earned and not yet withdrawn.
    pub accumulated_commission: Amount,
    /// Delegator rewards accrued per share since creation.
    pub reward_per_share: Dec,
    pub status: ValidatorStatus,
    pub tombstoned: bool,
    /// Earliest time `unjail` may succeed.
    pub jailed_until: u64,
    pub missed_blocks: MissedBlockWindow,
    pub min_self_delegation: Amount,
}

impl Validator {
    pub fn new(
        operator: Address,
        rates: CommissionRates,
        min_self_delegation: Amount,
        window_size: u64,
        now: u64,
    ) -> Self {
        Self {
            operator,
            pool: SharePool::default(),
            commission: Commission {
                rates,
                last_update_time: now,
            },
            accumulated_commission: 0,
            reward_per_share: Dec::ZERO,
            status: ValidatorStatus::Active,
            tombstoned: false,
            jailed_until: 0,
            missed_blocks: MissedBlockWindow::new(window_size),
            min_self_delegation,
        }
    }

    /// Bonded tokens in voting power units, truncated.
    pub fn voting_power(&self, power_reduction: u128) -> u64 {
        let power = self.pool.tokens / power_reduction.max(1);
        u64::try_from(power).unwrap_or(u64::MAX)
    }

    pub fn is_jailed(&self) -> bool {
        self.status == ValidatorStatus::Jailed
    }

    /// Suspend until at least `until`. An existing later release time is kept.
    pub fn jail(&mut self, until: u64) {
        self.status = ValidatorStatus::Jailed;
        self.jailed_until = self.jailed_until.max(until);
    }

    /// Return to Active with a clean liveness record.
    pub fn unjail(&mut self) {
        self.status = ValidatorStatus::Active;
        self.missed_blocks.clear();
    }

    /// Withdraw all accumulated commission.
    pub fn take_commission(&mut self) -> Amount {
        std::mem::take(&mut self.accumulated_commission)
    }
}
