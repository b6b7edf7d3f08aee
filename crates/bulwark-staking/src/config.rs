// crates/bulwark-staking/src/config.rs
//
// Genesis configuration for the staking engine.
// Loaded from a TOML file or populated with defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use bulwark_core::{Address, StakingError};

use crate::minter::MinterParams;
use crate::params::Params;
use crate::token::{serde_amount, Amount};

/// Engine configuration.
///
/// ```toml
/// authority = "0x00000000000000000000000000000000000000aa"
/// initial_supply = "1000000000000000000000000"
///
/// [params]
/// max_validators = 50
/// slash_fraction_double_sign = "0.05"
///
/// [minter]
/// blocks_per_year = 6307200
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingConfig {
    /// Account allowed to make privileged calls (block hooks, evidence,
    /// parameter changes).
    #[serde(default)]
    pub authority: Address,

    /// Token supply at genesis, in atto.
    #[serde(default, with = "serde_amount")]
    pub initial_supply: Amount,

    #[serde(default)]
    pub params: Params,

    #[serde(default)]
    pub minter: MinterParams,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            authority: Address::ZERO,
            initial_supply: 0,
            params: Params::default(),
            minter: MinterParams::default(),
        }
    }
}

impl StakingConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// # Errors
    /// Returns `StakingError::Config` if the file cannot be read or parsed,
    /// and `StakingError::InvalidParams` if the parameters are inconsistent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StakingError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, StakingError> {
        let config: StakingConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StakingError> {
        self.params.validate()?;
        self.minter.validate()
    }
}
