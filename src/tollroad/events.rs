//! Notifications emitted by committed operations
//!
//! Every successful call returns a [`Receipt`] carrying its output, the
//! notifications it produced in emission order, and the refunds the host owes
//! to vehicles. A rejected call produces nothing.

use crate::tollroad::types::{Address, Amount, SecretHash, VehicleType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable fact recorded by the regulator or an operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TollRoadEvent {
    PausedSet {
        sender: Address,
        paused: bool,
    },
    OwnerSet {
        previous_owner: Address,
        new_owner: Address,
    },
    DepositSet {
        sender: Address,
        deposit: Amount,
    },
    TollBoothAdded {
        sender: Address,
        booth: Address,
    },
    MultiplierSet {
        sender: Address,
        vehicle_type: VehicleType,
        multiplier: u64,
    },
    RoutePriceSet {
        sender: Address,
        entry_booth: Address,
        exit_booth: Address,
        price: Amount,
    },
    RoadEntered {
        vehicle: Address,
        entry_booth: Address,
        secret_hash: SecretHash,
        deposited: Amount,
    },
    RoadExited {
        exit_booth: Address,
        secret_hash: SecretHash,
        final_fee: Amount,
        refund: Amount,
    },
    PendingPayment {
        secret_hash: SecretHash,
        entry_booth: Address,
        exit_booth: Address,
    },
    VehicleTypeSet {
        sender: Address,
        vehicle: Address,
        vehicle_type: VehicleType,
    },
    OperatorCreated {
        sender: Address,
        operator: Uuid,
        owner: Address,
        deposit: Amount,
    },
    OperatorRemoved {
        sender: Address,
        operator: Uuid,
    },
}

impl TollRoadEvent {
    /// Short name used as the stored event kind
    pub fn kind(&self) -> &'static str {
        match self {
            TollRoadEvent::PausedSet { .. } => "paused_set",
            TollRoadEvent::OwnerSet { .. } => "owner_set",
            TollRoadEvent::DepositSet { .. } => "deposit_set",
            TollRoadEvent::TollBoothAdded { .. } => "toll_booth_added",
            TollRoadEvent::MultiplierSet { .. } => "multiplier_set",
            TollRoadEvent::RoutePriceSet { .. } => "route_price_set",
            TollRoadEvent::RoadEntered { .. } => "road_entered",
            TollRoadEvent::RoadExited { .. } => "road_exited",
            TollRoadEvent::PendingPayment { .. } => "pending_payment",
            TollRoadEvent::VehicleTypeSet { .. } => "vehicle_type_set",
            TollRoadEvent::OperatorCreated { .. } => "operator_created",
            TollRoadEvent::OperatorRemoved { .. } => "operator_removed",
        }
    }
}

/// Funds the operator releases to a vehicle when a trip settles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub to: Address,
    pub amount: Amount,
}

/// Result of a committed operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt<T> {
    pub output: T,
    pub events: Vec<TollRoadEvent>,
    pub transfers: Vec<Transfer>,
}

impl<T> Receipt<T> {
    pub(crate) fn new(output: T) -> Self {
        Self {
            output,
            events: Vec::new(),
            transfers: Vec::new(),
        }
    }

    pub(crate) fn with_event(output: T, event: TollRoadEvent) -> Self {
        Self {
            output,
            events: vec![event],
            transfers: Vec::new(),
        }
    }

    /// Total refunded to vehicles by this operation
    pub fn refunded(&self) -> Amount {
        self.transfers.iter().map(|t| t.amount).sum()
    }
}
