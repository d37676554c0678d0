//! Regulator: vehicle classification and operator provisioning
//!
//! The regulator owns the vehicle type table. Operators it provisions get a
//! read-only handle to that table through [`VehicleTypeLookup`].
//! Committed notifications are broadcast to subscribers and, when an event
//! store is attached, appended under [`REGULATOR_STREAM`].

use crate::config::TollRoadConfig;
use crate::event_store::{EventStore, REGULATOR_STREAM};
use crate::tollroad::errors::{TollRoadError, TollRoadResult};
use crate::tollroad::events::{Receipt, TollRoadEvent};
use crate::tollroad::operator::TollBoothOperator;
use crate::tollroad::service::TollRoadService;
use crate::tollroad::types::{Address, Amount, VehicleType};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Read-only view of vehicle classifications
pub trait VehicleTypeLookup: Send + Sync {
    /// `None` for vehicles the regulator never classified
    fn vehicle_type(&self, vehicle: &Address) -> Option<VehicleType>;
}

/// Shared vehicle type table; clones see the same data
#[derive(Debug, Clone, Default)]
pub struct VehicleRegistry {
    types: Arc<RwLock<HashMap<Address, VehicleType>>>,
}

impl VehicleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a classification; type 0 clears it
    pub fn assign(&self, vehicle: Address, vehicle_type: VehicleType) {
        // A writer that panicked cannot leave a half-written map entry.
        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        if vehicle_type == 0 {
            types.remove(&vehicle);
        } else {
            types.insert(vehicle, vehicle_type);
        }
    }

    pub fn len(&self) -> usize {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl VehicleTypeLookup for VehicleRegistry {
    fn vehicle_type(&self, vehicle: &Address) -> Option<VehicleType> {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(vehicle)
            .copied()
    }
}

pub struct Regulator {
    owner: Address,
    vehicles: VehicleRegistry,
    /// Provisioned operators and the owner each was handed to
    operators: HashMap<Uuid, Address>,
    events_tx: broadcast::Sender<TollRoadEvent>,
    store: Option<Arc<EventStore>>,
}

impl Regulator {
    /// Regulator with in-memory notifications only
    pub fn new(owner: Address) -> TollRoadResult<Self> {
        Self::with_config(owner, &TollRoadConfig::default())
    }

    /// Regulator whose notifications also go to the configured event store
    pub fn with_config(owner: Address, config: &TollRoadConfig) -> TollRoadResult<Self> {
        if owner.is_zero() {
            return Err(TollRoadError::invalid("owner cannot be the zero address"));
        }
        config
            .validate()
            .map_err(|e| TollRoadError::invalid(e.to_string()))?;

        let store = match &config.database_path {
            Some(path) => Some(Arc::new(EventStore::open(path)?)),
            None => None,
        };
        let (events_tx, _) = broadcast::channel(config.event_channel_capacity);

        Ok(Self {
            owner,
            vehicles: VehicleRegistry::new(),
            operators: HashMap::new(),
            events_tx,
            store,
        })
    }

    /// Live notifications committed after this call
    pub fn subscribe(&self) -> broadcast::Receiver<TollRoadEvent> {
        self.events_tx.subscribe()
    }

    pub fn event_store(&self) -> Option<&EventStore> {
        self.store.as_deref()
    }

    fn publish<T>(&self, receipt: Receipt<T>) -> Receipt<T> {
        TollRoadService::publish(
            &self.events_tx,
            self.store.as_deref(),
            REGULATOR_STREAM,
            &receipt.events,
        );
        receipt
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Handle operators use to read vehicle types
    pub fn vehicles(&self) -> VehicleRegistry {
        self.vehicles.clone()
    }

    pub fn vehicle_type(&self, vehicle: &Address) -> Option<VehicleType> {
        self.vehicles.vehicle_type(vehicle)
    }

    fn require_owner(&self, caller: Address) -> TollRoadResult<()> {
        if caller != self.owner {
            return Err(TollRoadError::unauthorized(caller));
        }
        Ok(())
    }

    pub fn set_vehicle_type(
        &mut self,
        caller: Address,
        vehicle: Address,
        vehicle_type: VehicleType,
    ) -> TollRoadResult<Receipt<()>> {
        self.require_owner(caller)?;
        if vehicle.is_zero() {
            return Err(TollRoadError::invalid("vehicle cannot be the zero address"));
        }
        if self.vehicle_type(&vehicle).unwrap_or(0) == vehicle_type {
            return Err(TollRoadError::invalid(format!(
                "vehicle {} already has type {}",
                vehicle, vehicle_type
            )));
        }

        self.vehicles.assign(vehicle, vehicle_type);
        log::info!("Vehicle {} type set to {}", vehicle, vehicle_type);
        Ok(self.publish(Receipt::with_event(
            (),
            TollRoadEvent::VehicleTypeSet {
                sender: caller,
                vehicle,
                vehicle_type,
            },
        )))
    }

    /// Build a paused operator owned by `owner` that reads this regulator's
    /// vehicle types.
    pub fn provision_operator(
        &mut self,
        caller: Address,
        owner: Address,
        deposit: Amount,
    ) -> TollRoadResult<Receipt<TollBoothOperator>> {
        self.require_owner(caller)?;
        if owner == self.owner {
            return Err(TollRoadError::invalid(
                "operator owner must differ from the regulator owner",
            ));
        }

        let operator = TollBoothOperator::new(owner, deposit, true, Arc::new(self.vehicles()))?;
        let id = operator.id();
        self.operators.insert(id, owner);

        log::info!(
            "Toll booth operator {} created for {} with deposit {}",
            id,
            owner,
            deposit
        );
        Ok(self.publish(Receipt::with_event(
            operator,
            TollRoadEvent::OperatorCreated {
                sender: caller,
                operator: id,
                owner,
                deposit,
            },
        )))
    }

    pub fn remove_operator(&mut self, caller: Address, operator: Uuid) -> TollRoadResult<Receipt<()>> {
        self.require_owner(caller)?;
        if self.operators.remove(&operator).is_none() {
            return Err(TollRoadError::UnknownOperator(operator.to_string()));
        }

        log::info!("Toll booth operator {} removed", operator);
        Ok(self.publish(Receipt::with_event(
            (),
            TollRoadEvent::OperatorRemoved {
                sender: caller,
                operator,
            },
        )))
    }

    pub fn is_operator(&self, operator: &Uuid) -> bool {
        self.operators.contains_key(operator)
    }

    pub fn operator_count(&self) -> usize {
        self.operators.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address {
        Address::repeat_byte(0x01)
    }

    fn operator_owner() -> Address {
        Address::repeat_byte(0x02)
    }

    fn vehicle() -> Address {
        Address::repeat_byte(0x20)
    }

    #[test]
    fn test_set_vehicle_type() {
        let mut regulator = Regulator::new(owner()).unwrap();
        let receipt = regulator.set_vehicle_type(owner(), vehicle(), 4).unwrap();
        assert_eq!(
            receipt.events,
            vec![TollRoadEvent::VehicleTypeSet {
                sender: owner(),
                vehicle: vehicle(),
                vehicle_type: 4
            }]
        );
        assert_eq!(regulator.vehicle_type(&vehicle()), Some(4));

        regulator.set_vehicle_type(owner(), vehicle(), 0).unwrap();
        assert_eq!(regulator.vehicle_type(&vehicle()), None);
    }

    #[test]
    fn test_set_vehicle_type_rejections() {
        let mut regulator = Regulator::new(owner()).unwrap();
        assert!(matches!(
            regulator.set_vehicle_type(vehicle(), vehicle(), 4),
            Err(TollRoadError::Unauthorized { .. })
        ));
        assert!(regulator.set_vehicle_type(owner(), Address::ZERO, 4).is_err());
        assert!(regulator.set_vehicle_type(owner(), vehicle(), 0).is_err());

        regulator.set_vehicle_type(owner(), vehicle(), 4).unwrap();
        assert!(regulator.set_vehicle_type(owner(), vehicle(), 4).is_err());
    }

    #[test]
    fn test_provisioned_operator_is_paused_and_shares_registry() {
        let mut regulator = Regulator::new(owner()).unwrap();
        let receipt = regulator
            .provision_operator(owner(), operator_owner(), 105)
            .unwrap();
        let operator = receipt.output;

        assert_eq!(
            receipt.events,
            vec![TollRoadEvent::OperatorCreated {
                sender: owner(),
                operator: operator.id(),
                owner: operator_owner(),
                deposit: 105,
            }]
        );
        assert!(operator.is_paused());
        assert_eq!(operator.owner(), operator_owner());
        assert_eq!(operator.deposit(), 105);
        assert!(regulator.is_operator(&operator.id()));

        // Types assigned after provisioning are visible to the operator.
        regulator.set_vehicle_type(owner(), vehicle(), 4).unwrap();
        assert_eq!(regulator.vehicles().vehicle_type(&vehicle()), Some(4));
    }

    #[test]
    fn test_provision_rejections() {
        let mut regulator = Regulator::new(owner()).unwrap();
        assert!(regulator
            .provision_operator(operator_owner(), operator_owner(), 105)
            .is_err());
        assert!(regulator.provision_operator(owner(), owner(), 105).is_err());
        assert!(regulator
            .provision_operator(owner(), operator_owner(), 0)
            .is_err());
        assert!(regulator
            .provision_operator(owner(), Address::ZERO, 105)
            .is_err());
        assert_eq!(regulator.operator_count(), 0);
    }

    #[test]
    fn test_remove_operator() {
        let mut regulator = Regulator::new(owner()).unwrap();
        let id = regulator
            .provision_operator(owner(), operator_owner(), 105)
            .unwrap()
            .output
            .id();

        assert!(regulator.remove_operator(operator_owner(), id).is_err());
        regulator.remove_operator(owner(), id).unwrap();
        assert!(!regulator.is_operator(&id));
        assert!(matches!(
            regulator.remove_operator(owner(), id),
            Err(TollRoadError::UnknownOperator(_))
        ));
    }

    #[test]
    fn test_notifications_are_broadcast() {
        let mut regulator = Regulator::new(owner()).unwrap();
        let mut rx = regulator.subscribe();

        regulator.set_vehicle_type(owner(), vehicle(), 4).unwrap();
        assert!(regulator.set_vehicle_type(owner(), vehicle(), 4).is_err());
        regulator
            .provision_operator(owner(), operator_owner(), 105)
            .unwrap();

        assert_eq!(rx.try_recv().unwrap().kind(), "vehicle_type_set");
        assert_eq!(rx.try_recv().unwrap().kind(), "operator_created");
        assert!(rx.try_recv().is_err());
        assert!(regulator.event_store().is_none());
    }

    #[test]
    fn test_notifications_are_persisted_under_regulator_stream() {
        let dir = tempfile::tempdir().unwrap();
        let config = TollRoadConfig {
            database_path: Some(dir.path().join("events.sqlite")),
            ..TollRoadConfig::default()
        };
        let mut regulator = Regulator::with_config(owner(), &config).unwrap();

        let id = regulator
            .provision_operator(owner(), operator_owner(), 105)
            .unwrap()
            .output
            .id();
        regulator.remove_operator(owner(), id).unwrap();

        let store = EventStore::open(dir.path().join("events.sqlite")).unwrap();
        let stored = store.load_events(REGULATOR_STREAM).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(
            stored[0].event,
            TollRoadEvent::OperatorCreated {
                sender: owner(),
                operator: id,
                owner: operator_owner(),
                deposit: 105,
            }
        );
        assert_eq!(stored[1].event.kind(), "operator_removed");
    }
}
