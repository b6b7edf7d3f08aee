// crates/bulwark-staking/src/params.rs
//
// Global staking, liveness, slashing and distribution parameters.
// Changed only through the privileged `set_params` call, and always validated
// as a whole before they replace the current set.

use serde::{Deserialize, Serialize};

use bulwark_core::{Dec, StakingError};

use crate::slashing::SlashCutoff;
use crate::token::{serde_amount, DEFAULT_POWER_REDUCTION};

/// Global parameters. Missing TOML fields fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// Bonded atto per unit of voting power.
    #[serde(default = "default_power_reduction", with = "serde_amount")]
    pub power_reduction: u128,

    /// Size of the active validator set.
    #[serde(default = "default_max_validators")]
    pub max_validators: u32,

    /// Seconds between `undelegate` and the entry becoming withdrawable.
    #[serde(default = "default_unbonding_period")]
    pub unbonding_period: u64,

    /// Pending unbonding entries allowed per (delegator, validator) pair.
    #[serde(default = "default_max_unbonding_entries")]
    pub max_unbonding_entries: u32,

    /// Number of most recent blocks tracked by each missed-block window.
    #[serde(default = "default_signed_blocks_window")]
    pub signed_blocks_window: u64,

    /// Fraction of the window a validator must sign to avoid jailing.
    #[serde(default = "default_min_signed_per_window")]
    pub min_signed_per_window: Dec,

    /// Seconds a downtime-jailed validator must wait before `unjail`.
    #[serde(default = "default_downtime_jail_duration")]
    pub downtime_jail_duration: u64,

    /// Bonded stake slashed on downtime jailing.
    #[serde(default = "default_slash_fraction_downtime")]
    pub slash_fraction_downtime: Dec,

    /// Stake slashed on double-sign evidence. Must be below 1.
    #[serde(default = "default_slash_fraction_double_sign")]
    pub slash_fraction_double_sign: Dec,

    /// Tombstone (permanently exclude) double-signing validators.
    #[serde(default = "default_tombstone_on_double_sign")]
    pub tombstone_on_double_sign: bool,

    /// Minimum seconds between two commission-rate changes.
    #[serde(default = "default_commission_update_cooldown")]
    pub commission_update_cooldown: u64,

    /// Fraction of every block reward sent to the community pool.
    #[serde(default)]
    pub community_tax: Dec,

    /// Fixed proposer bonus as a fraction of the block reward.
    #[serde(default)]
    pub base_proposer_reward: Dec,

    /// Extra proposer bonus, scaled by the signed fraction of voting power.
    #[serde(default)]
    pub bonus_proposer_reward: Dec,

    /// Clock used to decide which unbonding entries a double sign reaches.
    #[serde(default = "default_unbonding_slash_cutoff")]
    pub unbonding_slash_cutoff: SlashCutoff,
}

fn default_power_reduction() -> u128 {
    DEFAULT_POWER_REDUCTION
}

fn default_max_validators() -> u32 {
    21
}

fn default_unbonding_period() -> u64 {
    // 21 days
    1_814_400
}

fn default_max_unbonding_entries() -> u32 {
    7
}

fn default_signed_blocks_window() -> u64 {
    100
}

fn default_min_signed_per_window() -> Dec {
    Dec::percent(50)
}

fn default_downtime_jail_duration() -> u64 {
    600
}

fn default_slash_fraction_downtime() -> Dec {
    Dec::ZERO
}

fn default_slash_fraction_double_sign() -> Dec {
    Dec::percent(50)
}

fn default_tombstone_on_double_sign() -> bool {
    true
}

fn default_commission_update_cooldown() -> u64 {
    // 24 hours
    86_400
}

fn default_unbonding_slash_cutoff() -> SlashCutoff {
    SlashCutoff::Height
}

impl Default for Params {
    fn default() -> Self {
        Self {
            power_reduction: default_power_reduction(),
            max_validators: default_max_validators(),
            unbonding_period: default_unbonding_period(),
            max_unbonding_entries: default_max_unbonding_entries(),
            signed_blocks_window: default_signed_blocks_window(),
            min_signed_per_window: default_min_signed_per_window(),
            downtime_jail_duration: default_downtime_jail_duration(),
            slash_fraction_downtime: default_slash_fraction_downtime(),
            slash_fraction_double_sign: default_slash_fraction_double_sign(),
            tombstone_on_double_sign: default_tombstone_on_double_sign(),
            commission_update_cooldown: default_commission_update_cooldown(),
            community_tax: Dec::ZERO,
            base_proposer_reward: Dec::ZERO,
            bonus_proposer_reward: Dec::ZERO,
            unbonding_slash_cutoff: default_unbonding_slash_cutoff(),
        }
    }
}

impl Params {
    /// Reject parameter sets the engine cannot honour.
    ///
    /// # Errors
    /// Returns `StakingError::InvalidParams` describing the first violation.
    pub fn validate(&self) -> Result<(), StakingError> {
        if self.power_reduction == 0 {
            return Err(invalid("power_reduction must be positive"));
        }
        if self.max_validators == 0 {
            return Err(invalid("max_validators must be positive"));
        }
        if self.max_unbonding_entries == 0 {
            return Err(invalid("max_unbonding_entries must be positive"));
        }
        if self.signed_blocks_window == 0 {
            return Err(invalid("signed_blocks_window must be positive"));
        }
        if self.min_signed_per_window > Dec::ONE {
            return Err(invalid("min_signed_per_window cannot exceed 1"));
        }
        // A full slash would leave shares with no tokens behind them.
        if self.slash_fraction_double_sign >= Dec::ONE {
            return Err(invalid("slash_fraction_double_sign must be below 1"));
        }
        if self.slash_fraction_downtime >= Dec::ONE {
            return Err(invalid("slash_fraction_downtime must be below 1"));
        }
        let reward_cut = self
            .community_tax
            .saturating_add(self.base_proposer_reward)
            .saturating_add(self.bonus_proposer_reward);
        if reward_cut > Dec::ONE {
            return Err(invalid(
                "community_tax + base_proposer_reward + bonus_proposer_reward cannot exceed 1",
            ));
        }
        Ok(())
    }

    /// Misses tolerated within the window; one more jails the validator.
    pub fn max_missed_blocks(&self) -> u64 {
        let min_signed = self
            .min_signed_per_window
            .mul_int(self.signed_blocks_window as u128) as u64;
        self.signed_blocks_window.saturating_sub(min_signed)
    }
}

fn invalid(msg: &str) -> StakingError {
    StakingError::InvalidParams(msg.to_string())
}
