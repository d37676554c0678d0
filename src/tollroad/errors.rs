//! Error types for toll road operations

use crate::tollroad::types::{Address, Amount};
use thiserror::Error;

pub type TollRoadResult<T> = Result<T, TollRoadError>;

#[derive(Error, Debug)]
pub enum TollRoadError {
    #[error("Caller {caller} is not authorized for this operation")]
    Unauthorized { caller: Address },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Unknown toll booth: {0}")]
    UnknownBooth(Address),

    #[error("No open trip matches the revealed secret")]
    UnknownTrip,

    #[error("Secret hash has already been used on this operator")]
    DuplicateCommitment,

    #[error("Insufficient deposit: need {required}, paid {paid}")]
    InsufficientDeposit { required: u128, paid: Amount },

    #[error("Vehicle {0} has no vehicle type with a multiplier")]
    UnclassifiedVehicle(Address),

    #[error("State is already {0}")]
    NoOpTransition(String),

    #[error("Route price from {entry} to {exit} is not set")]
    PriceStillUnset { entry: Address, exit: Address },

    #[error("Operator is paused")]
    Paused,

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Operator balance would overflow")]
    BalanceOverflow,

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TollRoadError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }

    pub fn unauthorized(caller: Address) -> Self {
        Self::Unauthorized { caller }
    }
}
