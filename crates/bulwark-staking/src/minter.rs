// crates/bulwark-staking/src/minter.rs
//
// Inflation and block provision.
//
// Inflation follows a feedback rule on the bonded ratio:
// - bonded_ratio below goal_bonded: inflation rises
// - above: inflation falls
// - per block the move is (1 - bonded_ratio / goal_bonded) * inflation_rate_change
//   / blocks_per_year, clamped to [min_inflation, max_inflation]
//
// annual_provision = inflation * total_supply, and each block mints
// annual_provision / blocks_per_year, added to total supply and handed to the
// reward distributor.

use serde::{Deserialize, Serialize};

use bulwark_core::{Dec, StakingError};

use crate::token::Amount;

/// Monetary policy parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinterParams {
    #[serde(default = "default_min_inflation")]
    pub min_inflation: Dec,

    #[serde(default = "default_max_inflation")]
    pub max_inflation: Dec,

    /// Largest change of the inflation rate over one year.
    #[serde(default = "default_inflation_rate_change")]
    pub inflation_rate_change: Dec,

    /// Bonded/supply ratio the feedback loop steers toward.
    #[serde(default = "default_goal_bonded")]
    pub goal_bonded: Dec,

    #[serde(default = "default_blocks_per_year")]
    pub blocks_per_year: u64,
}

fn default_min_inflation() -> Dec {
    Dec::percent(2)
}

fn default_max_inflation() -> Dec {
    Dec::percent(7)
}

fn default_inflation_rate_change() -> Dec {
    Dec::percent(5)
}

fn default_goal_bonded() -> Dec {
    Dec::percent(35)
}

fn default_blocks_per_year() -> u64 {
    // 5 second blocks
    6_307_200
}

impl Default for MinterParams {
    fn default() -> Self {
        Self {
            min_inflation: default_min_inflation(),
            max_inflation: default_max_inflation(),
            inflation_rate_change: default_inflation_rate_change(),
            goal_bonded: default_goal_bonded(),
            blocks_per_year: default_blocks_per_year(),
        }
    }
}

impl MinterParams {
    /// # Errors
    /// Returns `StakingError::InvalidParams` on an empty inflation range, a zero
    /// goal, or zero blocks per year.
    pub fn validate(&self) -> Result<(), StakingError> {
        if self.min_inflation > self.max_inflation {
            return Err(StakingError::InvalidParams(
                "min_inflation cannot exceed max_inflation".to_string(),
            ));
        }
        if self.goal_bonded.is_zero() || self.goal_bonded > Dec::ONE {
            return Err(StakingError::InvalidParams(
                "goal_bonded must be in (0, 1]".to_string(),
            ));
        }
        if self.blocks_per_year == 0 {
            return Err(StakingError::InvalidParams(
                "blocks_per_year must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Minter state. Updated once per block by `mint`, read-only otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Minter {
    inflation: Dec,
    annual_provision: Amount,
    total_supply: Amount,
}

impl Minter {
    /// A minter at zero inflation over `total_supply`. The first `mint` pulls
    /// inflation into the configured range.
    pub fn new(total_supply: Amount) -> Self {
        Self {
            inflation: Dec::ZERO,
            annual_provision: 0,
            total_supply,
        }
    }

    pub fn inflation(&self) -> Dec {
        self.inflation
    }

    pub fn annual_provision(&self) -> Amount {
        self.annual_provision
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn set_total_supply(&mut self, total_supply: Amount) {
        self.total_supply = total_supply;
    }

    /// Remove slashed tokens from circulation.
    pub fn burn(&mut self, amount: Amount) {
        self.total_supply = self.total_supply.saturating_sub(amount);
    }

    /// Next inflation rate for the given supply and bonded amount.
    ///
    /// A zero supply counts as a zero bonded ratio.
    pub fn compute_inflation(
        &self,
        params: &MinterParams,
        total_supply: Amount,
        total_bonded: Amount,
    ) -> Dec {
        let bonded_ratio = Dec::from_ratio(total_bonded, total_supply);
        let ratio_to_goal = bonded_ratio
            .checked_div(params.goal_bonded)
            .unwrap_or(Dec::ZERO);
        let blocks_per_year = params.blocks_per_year as u128;

        // Signed step, truncated toward zero on both sides of the goal.
        let next = if ratio_to_goal <= Dec::ONE {
            let step = Dec::ONE
                .saturating_sub(ratio_to_goal)
                .mul(params.inflation_rate_change)
                .div_int(blocks_per_year);
            self.inflation.saturating_add(step)
        } else {
            let step = ratio_to_goal
                .saturating_sub(Dec::ONE)
                .mul(params.inflation_rate_change)
                .div_int(blocks_per_year);
            self.inflation.saturating_sub(step)
        };

        next.clamp(params.min_inflation, params.max_inflation)
    }

    /// Provision minted per block at the current annual provision.
    pub fn block_provision(&self, params: &MinterParams) -> Amount {
        self.annual_provision / params.blocks_per_year.max(1) as u128
    }

    /// Advance one block: update inflation and annual provision from the
    /// current supply, then mint the block provision.
    ///
    /// Returns the newly minted amount.
    pub fn mint(&mut self, params: &MinterParams, total_bonded: Amount) -> Amount {
        self.inflation = self.compute_inflation(params, self.total_supply, total_bonded);
        self.annual_provision = self.inflation.mul_int(self.total_supply);
        let provision = self.block_provision(params);
        self.total_supply = self.total_supply.saturating_add(provision);
        provision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::bwk;

    fn fast_params() -> MinterParams {
        MinterParams {
            blocks_per_year: 5,
            ..MinterParams::default()
        }
    }

    fn dec(s: &str) -> Dec {
        s.parse().unwrap()
    }

    #[test]
    fn test_first_mint_clamps_to_min_inflation() {
        let params = fast_params();
        let mut minter = Minter::new(bwk(1000));
        let provision = minter.mint(&params, bwk(1));

        assert_eq!(minter.inflation(), dec("0.02"));
        // 1000 * 2% / 5
        assert_eq!(provision, bwk(4));
        assert_eq!(minter.block_provision(&params), bwk(4));
        assert_eq!(minter.total_supply(), bwk(1004));
    }

    #[test]
    fn test_inflation_feedback_sequence() {
        let params = fast_params();
        let mut minter = Minter::new(bwk(1000));
        minter.mint(&params, bwk(1));

        minter.mint(&params, bwk(1));
        assert_eq!(minter.inflation(), dec("0.029971542401821286"));

        for _ in 0..5 {
            minter.mint(&params, bwk(1));
        }
        assert_eq!(minter.inflation(), dec("0.07"));

        // Fully bonded: inflation starts falling.
        minter.set_total_supply(bwk(1000));
        minter.mint(&params, bwk(1000));
        assert_eq!(minter.inflation(), dec("0.051428571428571429"));

        // Three more years fully bonded settle at the floor.
        for _ in 0..15 {
            let supply = minter.total_supply();
            minter.mint(&params, supply);
        }
        assert_eq!(minter.inflation(), dec("0.02"));
    }

    #[test]
    fn test_zero_supply_mints_nothing() {
        let params = MinterParams::default();
        let mut minter = Minter::new(0);
        assert_eq!(minter.mint(&params, 0), 0);
        assert_eq!(minter.inflation(), params.min_inflation);
        assert_eq!(minter.total_supply(), 0);
    }

    #[test]
    fn test_goal_ratio_leaves_inflation_unchanged() {
        let params = fast_params();
        let mut minter = Minter::new(bwk(100));
        minter.mint(&params, bwk(1));
        let before = minter.inflation();
        let supply = minter.total_supply();
        let at_goal = params.goal_bonded.mul_int(supply);
        assert_eq!(minter.compute_inflation(&params, supply, at_goal), before);
    }

    #[test]
    fn test_burn() {
        let mut minter = Minter::new(bwk(10));
        minter.burn(bwk(4));
        assert_eq!(minter.total_supply(), bwk(6));
        minter.burn(bwk(100));
        assert_eq!(minter.total_supply(), 0);
    }

    #[test]
    fn test_invalid_params() {
        let params = MinterParams {
            min_inflation: Dec::percent(10),
            max_inflation: Dec::percent(5),
            ..MinterParams::default()
        };
        assert!(params.validate().is_err());
        let params = MinterParams {
            goal_bonded: Dec::ZERO,
            ..MinterParams::default()
        };
        assert!(params.validate().is_err());
    }
}
