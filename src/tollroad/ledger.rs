//! Trip ledger: one record per commitment
//!
//! A record is open while it holds escrow. Settling zeroes it in place, so the
//! commitment stays known to the ledger and can never open a second trip.

use crate::tollroad::errors::{TollRoadError, TollRoadResult};
use crate::tollroad::types::{Address, Amount, SecretHash};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Vehicle, entry booth and escrow of a trip
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripRecord {
    pub vehicle: Address,
    pub entry_booth: Address,
    pub escrowed: Amount,
}

impl TripRecord {
    pub fn is_open(&self) -> bool {
        self.escrowed > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripLedger {
    trips: HashMap<SecretHash, TripRecord>,
}

impl TripLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `secret_hash`, zeroed when unknown or settled
    pub fn entry(&self, secret_hash: &SecretHash) -> TripRecord {
        self.trips.get(secret_hash).copied().unwrap_or_default()
    }

    pub fn open_trip(&self, secret_hash: &SecretHash) -> Option<&TripRecord> {
        self.trips.get(secret_hash).filter(|record| record.is_open())
    }

    /// True once the commitment has been accepted, whether or not it settled
    pub fn is_known(&self, secret_hash: &SecretHash) -> bool {
        self.trips.contains_key(secret_hash)
    }

    pub fn insert(&mut self, secret_hash: SecretHash, record: TripRecord) -> TollRoadResult<()> {
        if record.escrowed == 0 {
            return Err(TollRoadError::invalid("a trip must escrow a positive amount"));
        }
        if self.is_known(&secret_hash) {
            return Err(TollRoadError::DuplicateCommitment);
        }
        self.trips.insert(secret_hash, record);
        Ok(())
    }

    /// Close an open trip and hand back what it held
    pub fn close(&mut self, secret_hash: &SecretHash) -> TollRoadResult<TripRecord> {
        let slot = self
            .trips
            .get_mut(secret_hash)
            .filter(|record| record.is_open())
            .ok_or(TollRoadError::UnknownTrip)?;
        Ok(std::mem::take(slot))
    }

    pub fn open_count(&self) -> usize {
        self.trips.values().filter(|record| record.is_open()).count()
    }

    /// Sum of escrow held by open trips
    pub fn open_escrow(&self) -> u128 {
        self.trips
            .values()
            .map(|record| u128::from(record.escrowed))
            .sum()
    }
}
