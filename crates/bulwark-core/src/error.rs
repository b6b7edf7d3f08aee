// crates/bulwark-core/src/error.rs
//
// Protocol-wide error type. Every failing operation returns one of these and
// leaves the engine state untouched.

use thiserror::Error;

use crate::address::Address;

/// Errors surfaced by the staking engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakingError {
    /// Commission rate, max rate and max change rate are inconsistent, or an
    /// update would leave those bounds.
    #[error("Invalid commission config: {0}")]
    InvalidCommissionConfig(String),

    /// A rate-limited action was attempted before its cooldown elapsed.
    #[error("Cooldown not elapsed: allowed at {allowed_at}, now {now}")]
    CooldownNotElapsed { allowed_at: u64, now: u64 },

    /// Undelegate or withdraw asked for more than the caller owns.
    #[error("Insufficient stake: requested {requested}, available {available}")]
    InsufficientStake { requested: u128, available: u128 },

    /// The (delegator, validator) pair already holds the maximum number of
    /// pending unbonding entries.
    #[error("Too many unbonding entries: limit is {max}")]
    TooManyUnbondingEntries { max: u32 },

    /// Operation requires an active validator.
    #[error("Validator {0} is jailed")]
    ValidatorJailed(Address),

    /// Validator was tombstoned after double-sign evidence.
    #[error("Validator {0} is tombstoned")]
    ValidatorTombstoned(Address),

    /// Self-delegation would fall below (or is below) the validator's floor.
    #[error("Self delegation {self_stake} is below the minimum {minimum}")]
    BelowMinSelfDelegation { self_stake: u128, minimum: u128 },

    /// Privileged call from a caller other than the configured authority.
    #[error("Unauthorized caller {0}")]
    Unauthorized(Address),

    /// No validator registered under this operator address.
    #[error("Validator not found: {0}")]
    ValidatorNotFound(Address),

    /// A validator is already registered under this operator address.
    #[error("Validator already exists: {0}")]
    ValidatorExists(Address),

    /// `unjail` called on a validator that is not jailed.
    #[error("Validator {0} is not jailed")]
    ValidatorNotJailed(Address),

    /// No delegation exists for the (delegator, validator) pair.
    #[error("Delegation not found: delegator {delegator}, validator {validator}")]
    DelegationNotFound { delegator: Address, validator: Address },

    /// Zero or otherwise unusable token amount.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Global parameters failed validation.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Call is not valid in the current block lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration could not be read or parsed.
    #[error("Config error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for StakingError {
    fn from(e: toml::de::Error) -> Self {
        StakingError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for StakingError {
    fn from(e: serde_json::Error) -> Self {
        StakingError::Config(e.to_string())
    }
}

impl From<std::io::Error> for StakingError {
    fn from(e: std::io::Error) -> Self {
        StakingError::Config(e.to_string())
    }
}
