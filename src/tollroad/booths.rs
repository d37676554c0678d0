//! Append-only registry of toll booths

use crate::tollroad::errors::{TollRoadError, TollRoadResult};
use crate::tollroad::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoothRegistry {
    booths: BTreeSet<Address>,
}

impl BoothRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, booth: Address) -> TollRoadResult<()> {
        if booth.is_zero() {
            return Err(TollRoadError::invalid("booth cannot be the zero address"));
        }
        if !self.booths.insert(booth) {
            return Err(TollRoadError::invalid(format!(
                "{} is already a toll booth",
                booth
            )));
        }
        Ok(())
    }

    pub fn contains(&self, booth: &Address) -> bool {
        self.booths.contains(booth)
    }

    pub fn require(&self, booth: Address) -> TollRoadResult<()> {
        if !self.contains(&booth) {
            return Err(TollRoadError::UnknownBooth(booth));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.booths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.booths.is_empty()
    }
}
