//! Toll road ledger
//!
//! This module holds the regulator, the toll booth operator ledger with its
//! pending settlement queues, and the async service that fronts an operator.

pub mod access;
pub mod booths;
pub mod deposit;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod multiplier;
pub mod operator;
pub mod pending;
pub mod regulator;
pub mod routes;
pub mod service;
pub mod types;

pub use service::{OperatorStatus, TollRoadService};
pub use errors::{TollRoadError, TollRoadResult};
pub use events::{Receipt, TollRoadEvent, Transfer};
pub use ledger::TripRecord;
pub use operator::{ExitStatus, OperatorSnapshot, TollBoothOperator};
pub use regulator::{Regulator, VehicleRegistry, VehicleTypeLookup};
pub use types::{hash_secret, Address, Amount, RouteKey, Secret, SecretHash, VehicleType};
