// crates/bulwark-staking/src/lib.rs
//
// bulwark-staking: validator registry, delegation shares, block rewards,
// unbonding, jailing, slashing, and inflation for the Bulwark protocol.
//
// All monetary values are tracked in atto (the smallest unit of $BWK).
// 1 BWK = 10^18 atto.

pub mod community_pool;
pub mod config;
pub mod distribution;
pub mod engine;
pub mod minter;
pub mod params;
pub mod shares;
pub mod slashing;
pub mod token;
pub mod unbonding;
pub mod validator;
pub mod valset;

// Re-export key types for ergonomic access from downstream crates.
pub use community_pool::CommunityPool;
pub use config::StakingConfig;
pub use distribution::{allocate_block_rewards, BlockAllocation, RewardSplit};
pub use engine::{BlockCommit, BlockInfo, BlockOutcome, Staking, Undelegation, ValidatorUpdate};
pub use minter::{Minter, MinterParams};
pub use params::Params;
pub use shares::{Delegation, SharePool, ShareLedger};
pub use slashing::{compute_penalty, Infraction, SlashCondition, SlashCutoff, SlashResult};
pub use token::{bwk, Amount, Bwk, ATTO_PER_BWK, DEFAULT_POWER_REDUCTION};
pub use unbonding::{UnbondingEntry, UnbondingQueue};
pub use validator::{Commission, CommissionRates, MissedBlockWindow, Validator, ValidatorStatus};
pub use valset::{ValidatorPower, ValidatorSetIndex};

pub use bulwark_core::{Address, Dec, StakingError};
