// crates/bulwark-staking/src/slashing.rs
//
// Slashing conditions and penalty computation.
//
// Two infractions are punished:
//   1. Double sign: evidence-driven, slashes `slash_fraction_double_sign` of
//      the bonded pool and of every still-locked unbonding entry created
//      before the infraction; jails and (by default) tombstones.
//   2. Downtime: too many missed blocks in the signing window; jails and
//      slashes `slash_fraction_downtime` (zero by default, so stake is kept).
//
// Slashed tokens are burned from total supply.

use serde::{Deserialize, Serialize};

use bulwark_core::{Address, Dec};

use crate::token::Amount;
use crate::unbonding::UnbondingEntry;

/// Conditions that trigger slashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlashCondition {
    /// Two conflicting votes at the same height, reported by consensus.
    DoubleSign,
    /// Missed more blocks than the signing window tolerates.
    Downtime,
}

/// Which clock decides whether an unbonding entry predates an infraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlashCutoff {
    /// Entry is slashable if `creation_height < infraction.height`.
    Height,
    /// Entry is slashable if `creation_time < infraction.time`.
    Time,
}

/// When an infraction happened, as reported by the evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Infraction {
    pub height: u64,
    pub time: u64,
}

/// Result of a slashing event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashResult {
    pub condition: SlashCondition,
    pub validator: Address,
    /// Taken from the validator's bonded pool.
    pub bonded_slashed: Amount,
    /// Taken from pending unbonding entries.
    pub unbonding_slashed: Amount,
    /// Whether the validator is now permanently excluded.
    pub tombstoned: bool,
}

impl SlashResult {
    pub fn total(&self) -> Amount {
        self.bonded_slashed.saturating_add(self.unbonding_slashed)
    }
}

/// Penalty for `stake` at `fraction`. Truncates, and never exceeds `stake`.
pub fn compute_penalty(fraction: Dec, stake: Amount) -> Amount {
    fraction.mul_int(stake).min(stake)
}

/// Whether an unbonding entry is still exposed to an infraction.
///
/// The entry must not have matured yet (`completion_time > now`) and must have
/// been created before the infraction, measured by `cutoff`.
pub fn entry_is_slashable(
    entry: &UnbondingEntry,
    infraction: &Infraction,
    cutoff: SlashCutoff,
    now: u64,
) -> bool {
    if entry.completion_time <= now {
        return false;
    }
    match cutoff {
        SlashCutoff::Height => entry.creation_height < infraction.height,
        SlashCutoff::Time => entry.creation_time < infraction.time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::bwk;

    fn entry(creation_height: u64, creation_time: u64, completion_time: u64) -> UnbondingEntry {
        UnbondingEntry {
            creation_height,
            creation_time,
            completion_time,
            initial_balance: bwk(10),
            balance: bwk(10),
        }
    }

    #[test]
    fn test_half_penalty() {
        assert_eq!(compute_penalty(Dec::percent(50), bwk(10)), bwk(5));
    }

    #[test]
    fn test_penalty_does_not_exceed_stake() {
        assert_eq!(compute_penalty(Dec::from_int(2), 100), 100);
    }

    #[test]
    fn test_zero_stake() {
        assert_eq!(compute_penalty(Dec::percent(50), 0), 0);
    }

    #[test]
    fn test_height_cutoff() {
        let infraction = Infraction { height: 1000, time: 50 };
        assert!(entry_is_slashable(&entry(999, 100, 200), &infraction, SlashCutoff::Height, 150));
        assert!(!entry_is_slashable(&entry(1000, 10, 200), &infraction, SlashCutoff::Height, 150));
    }

    #[test]
    fn test_time_cutoff() {
        let infraction = Infraction { height: 1000, time: 50 };
        assert!(entry_is_slashable(&entry(5000, 49, 200), &infraction, SlashCutoff::Time, 150));
        assert!(!entry_is_slashable(&entry(1, 50, 200), &infraction, SlashCutoff::Time, 150));
    }

    #[test]
    fn test_matured_entry_is_not_slashable() {
        let infraction = Infraction { height: 1000, time: 1000 };
        assert!(!entry_is_slashable(&entry(1, 1, 200), &infraction, SlashCutoff::Height, 200));
    }
}
