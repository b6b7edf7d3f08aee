// crates/bulwark-staking/src/community_pool.rs
//
// Community pool.
//
// Receives the community tax, proposer bonuses with no eligible proposer,
// delegator pools of validators without shares, and fixed-point truncation
// leftovers from distribution. Nothing is paid out of it by this crate.

use serde::{Deserialize, Serialize};

use crate::token::{serde_amount, Amount};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityPool {
    #[serde(with = "serde_amount")]
    balance: Amount,
}

impl CommunityPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&mut self, amount: Amount) {
        self.balance = self.balance.saturating_add(amount);
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::bwk;

    #[test]
    fn test_deposit_accumulates() {
        let mut pool = CommunityPool::new();
        pool.deposit(bwk(2));
        pool.deposit(3);
        assert_eq!(pool.balance(), bwk(2) + 3);
    }

    #[test]
    fn test_serializes_balance_as_string() {
        let mut pool = CommunityPool::new();
        pool.deposit(7);
        let json = serde_json::to_string(&pool).unwrap();
        assert_eq!(json, r#"{"balance":"7"}"#);
    }
}
