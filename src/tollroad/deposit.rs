//! Minimum deposit per unit of vehicle multiplier

use crate::tollroad::errors::{TollRoadError, TollRoadResult};
use crate::tollroad::types::Amount;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositPolicy {
    deposit: Amount,
}

impl DepositPolicy {
    pub fn new(deposit: Amount) -> TollRoadResult<Self> {
        if deposit == 0 {
            return Err(TollRoadError::invalid("deposit cannot be zero"));
        }
        Ok(Self { deposit })
    }

    pub fn deposit(&self) -> Amount {
        self.deposit
    }

    /// Zero and unchanged values are rejected rather than ignored.
    pub fn set(&mut self, deposit: Amount) -> TollRoadResult<()> {
        if deposit == 0 {
            return Err(TollRoadError::invalid("deposit cannot be zero"));
        }
        if deposit == self.deposit {
            return Err(TollRoadError::invalid(format!(
                "deposit is already {}",
                deposit
            )));
        }
        self.deposit = deposit;
        Ok(())
    }

    /// Smallest payment accepted at entry for a vehicle with `multiplier`
    pub fn required_for(&self, multiplier: u64) -> u128 {
        u128::from(self.deposit) * u128::from(multiplier)
    }
}
