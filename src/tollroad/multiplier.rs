//! Vehicle type to price multiplier table

use crate::tollroad::errors::{TollRoadError, TollRoadResult};
use crate::tollroad::types::VehicleType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiplierTable {
    multipliers: HashMap<VehicleType, u64>,
}

impl MultiplierTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while the type has no multiplier; entry is refused in that state
    pub fn get(&self, vehicle_type: VehicleType) -> Option<u64> {
        self.multipliers.get(&vehicle_type).copied()
    }

    /// Setting a multiplier of zero removes the type from the table.
    pub fn set(&mut self, vehicle_type: VehicleType, multiplier: u64) -> TollRoadResult<()> {
        if vehicle_type == 0 {
            return Err(TollRoadError::invalid("vehicle type 0 is reserved"));
        }
        if self.get(vehicle_type).unwrap_or(0) == multiplier {
            return Err(TollRoadError::invalid(format!(
                "multiplier for type {} is already {}",
                vehicle_type, multiplier
            )));
        }

        if multiplier == 0 {
            self.multipliers.remove(&vehicle_type);
        } else {
            self.multipliers.insert(vehicle_type, multiplier);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.multipliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.multipliers.is_empty()
    }
}
