//! Async front for one toll booth operator
//!
//! The ledger itself is single-threaded. This service puts it behind exactly
//! one mutex, so concurrent callers are serialized per operator and every
//! operation still sees the whole ledger move at once. On top of that it:
//! - fans committed notifications out to subscribers
//! - appends them to the event store when one is configured
//! - runs a periodic bounded drain of priced pending queues

use crate::config::TollRoadConfig;
use crate::event_store::EventStore;
use crate::tollroad::errors::{TollRoadError, TollRoadResult};
use crate::tollroad::events::{Receipt, TollRoadEvent};
use crate::tollroad::ledger::TripRecord;
use crate::tollroad::operator::{ExitStatus, OperatorSnapshot, TollBoothOperator};
use crate::tollroad::types::{Address, Amount, Secret, SecretHash, VehicleType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::interval;
use uuid::Uuid;

/// Ledger totals for display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperatorStatus {
    pub id: Uuid,
    pub owner: Address,
    pub paused: bool,
    pub deposit: Amount,
    pub collected_fees: Amount,
    pub balance: Amount,
    pub open_escrow: u128,
    pub open_trips: usize,
    pub pending_trips: usize,
    pub drainable_routes: usize,
}

pub struct TollRoadService {
    id: Uuid,
    operator: Arc<Mutex<TollBoothOperator>>,
    events_tx: broadcast::Sender<TollRoadEvent>,
    store: Option<Arc<EventStore>>,
    config: TollRoadConfig,
    background_task: Option<tokio::task::JoinHandle<()>>,
}

impl TollRoadService {
    pub fn new(mut operator: TollBoothOperator, config: TollRoadConfig) -> TollRoadResult<Self> {
        config
            .validate()
            .map_err(|e| TollRoadError::invalid(e.to_string()))?;

        let store = match &config.database_path {
            Some(path) => Some(Arc::new(EventStore::open(path)?)),
            None => None,
        };

        operator.set_route_price_drain_limit(config.route_price_drain_limit);
        let (events_tx, _) = broadcast::channel(config.event_channel_capacity);

        Ok(Self {
            id: operator.id(),
            operator: Arc::new(Mutex::new(operator)),
            events_tx,
            store,
            config,
            background_task: None,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Live notifications committed after this call
    pub fn subscribe(&self) -> broadcast::Receiver<TollRoadEvent> {
        self.events_tx.subscribe()
    }

    pub fn event_store(&self) -> Option<&EventStore> {
        self.store.as_deref()
    }

    // ----- operations -----

    pub async fn set_paused(&self, caller: Address, paused: bool) -> TollRoadResult<Receipt<()>> {
        self.apply(|operator| operator.set_paused(caller, paused)).await
    }

    pub async fn set_owner(&self, caller: Address, new_owner: Address) -> TollRoadResult<Receipt<()>> {
        self.apply(|operator| operator.set_owner(caller, new_owner)).await
    }

    pub async fn set_deposit(&self, caller: Address, deposit: Amount) -> TollRoadResult<Receipt<()>> {
        self.apply(|operator| operator.set_deposit(caller, deposit)).await
    }

    pub async fn add_toll_booth(&self, caller: Address, booth: Address) -> TollRoadResult<Receipt<()>> {
        self.apply(|operator| operator.add_toll_booth(caller, booth)).await
    }

    pub async fn set_multiplier(
        &self,
        caller: Address,
        vehicle_type: VehicleType,
        multiplier: u64,
    ) -> TollRoadResult<Receipt<()>> {
        self.apply(|operator| operator.set_multiplier(caller, vehicle_type, multiplier))
            .await
    }

    pub async fn set_route_price(
        &self,
        caller: Address,
        entry_booth: Address,
        exit_booth: Address,
        price: Amount,
    ) -> TollRoadResult<Receipt<usize>> {
        self.apply(|operator| operator.set_route_price(caller, entry_booth, exit_booth, price))
            .await
    }

    pub async fn enter_road(
        &self,
        caller: Address,
        entry_booth: Address,
        secret_hash: SecretHash,
        paid: Amount,
    ) -> TollRoadResult<Receipt<()>> {
        self.apply(|operator| operator.enter_road(caller, entry_booth, secret_hash, paid))
            .await
    }

    pub async fn report_exit_road(
        &self,
        caller: Address,
        secret: &Secret,
    ) -> TollRoadResult<Receipt<ExitStatus>> {
        self.apply(|operator| operator.report_exit_road(caller, secret))
            .await
    }

    pub async fn simulate_exit_road(&self, caller: Address, secret: &Secret) -> TollRoadResult<ExitStatus> {
        self.operator.lock().await.simulate_exit_road(caller, secret)
    }

    pub async fn clear_some_pending_payments(
        &self,
        caller: Address,
        entry_booth: Address,
        exit_booth: Address,
        max_count: usize,
    ) -> TollRoadResult<Receipt<usize>> {
        self.apply(|operator| {
            operator.clear_some_pending_payments(caller, entry_booth, exit_booth, max_count)
        })
        .await
    }

    // ----- queries -----

    pub async fn vehicle_entry(&self, secret_hash: &SecretHash) -> TripRecord {
        self.operator.lock().await.vehicle_entry(secret_hash)
    }

    pub async fn pending_payment_count(&self, entry_booth: Address, exit_booth: Address) -> usize {
        self.operator
            .lock()
            .await
            .pending_payment_count(entry_booth, exit_booth)
    }

    pub async fn get_status(&self) -> OperatorStatus {
        let operator = self.operator.lock().await;
        OperatorStatus {
            id: operator.id(),
            owner: operator.owner(),
            paused: operator.is_paused(),
            deposit: operator.deposit(),
            collected_fees: operator.collected_fees(),
            balance: operator.balance(),
            open_escrow: operator.open_escrow(),
            open_trips: operator.open_trip_count(),
            pending_trips: operator.total_pending(),
            drainable_routes: operator.drainable_routes().len(),
        }
    }

    pub async fn snapshot(&self) -> OperatorSnapshot {
        self.operator.lock().await.snapshot()
    }

    // ----- background drain -----

    /// Run one bounded drain pass over every priced route with a backlog
    pub async fn drain_pending(&self) -> usize {
        Self::drain_pass(
            &self.operator,
            &self.events_tx,
            self.store.as_deref(),
            self.id,
            self.config.drain_batch_size,
        )
        .await
    }

    pub fn start_background_drain(&mut self) {
        if self.background_task.is_some() {
            return; // Already running
        }

        let operator = self.operator.clone();
        let events_tx = self.events_tx.clone();
        let store = self.store.clone();
        let id = self.id;
        let batch_size = self.config.drain_batch_size;
        let period = Duration::from_secs(self.config.drain_interval_secs);

        let task = tokio::spawn(async move {
            let mut interval = interval(period);

            loop {
                interval.tick().await;

                let settled =
                    Self::drain_pass(&operator, &events_tx, store.as_deref(), id, batch_size)
                        .await;
                if settled > 0 {
                    log::info!("Background drain settled {} trips on {}", settled, id);
                }
            }
        });

        self.background_task = Some(task);
        log::info!("Background drain started for operator {}", self.id);
    }

    pub fn stop_background_drain(&mut self) {
        if let Some(task) = self.background_task.take() {
            task.abort();
            log::info!("Background drain stopped for operator {}", self.id);
        }
    }

    pub fn is_draining(&self) -> bool {
        self.background_task.is_some()
    }

    async fn drain_pass(
        operator: &Mutex<TollBoothOperator>,
        events_tx: &broadcast::Sender<TollRoadEvent>,
        store: Option<&EventStore>,
        id: Uuid,
        batch_size: usize,
    ) -> usize {
        let mut operator = operator.lock().await;
        let caller = operator.owner();
        let mut settled = 0;

        for route in operator.drainable_routes() {
            match operator.clear_some_pending_payments(caller, route.entry, route.exit, batch_size) {
                Ok(receipt) => {
                    settled += receipt.output;
                    Self::publish(events_tx, store, id, &receipt.events);
                }
                Err(e) => {
                    log::warn!("Could not drain pending payments on {}: {}", route, e);
                }
            }
        }

        settled
    }

    // ----- internals -----

    async fn apply<T>(
        &self,
        op: impl FnOnce(&mut TollBoothOperator) -> TollRoadResult<Receipt<T>>,
    ) -> TollRoadResult<Receipt<T>> {
        let mut operator = self.operator.lock().await;
        let receipt = op(&mut *operator)?;
        // Published under the lock so stored and broadcast order match commit order.
        Self::publish(&self.events_tx, self.store.as_deref(), self.id, &receipt.events);
        Ok(receipt)
    }

    /// Persist then broadcast one operation's events under stream `id`
    pub(crate) fn publish(
        events_tx: &broadcast::Sender<TollRoadEvent>,
        store: Option<&EventStore>,
        id: Uuid,
        events: &[TollRoadEvent],
    ) {
        if let Some(store) = store {
            if let Err(e) = store.append(id, events) {
                log::error!("Error persisting events for stream {}: {}", id, e);
            }
        }

        for event in events {
            // No subscribers is fine
            let _ = events_tx.send(event.clone());
        }
    }
}

impl Drop for TollRoadService {
    fn drop(&mut self) {
        self.stop_background_drain();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tollroad::regulator::VehicleRegistry;

    const OWNER: u8 = 0x01;
    const BOOTH0: u8 = 0x10;
    const BOOTH1: u8 = 0x11;
    const VEHICLE: u8 = 0x20;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    async fn service_with(config: TollRoadConfig) -> TollRoadService {
        let registry = VehicleRegistry::new();
        registry.assign(addr(VEHICLE), 1);
        let operator = TollBoothOperator::new(addr(OWNER), 10, false, Arc::new(registry)).unwrap();

        let service = TollRoadService::new(operator, config).unwrap();
        service.add_toll_booth(addr(OWNER), addr(BOOTH0)).await.unwrap();
        service.add_toll_booth(addr(OWNER), addr(BOOTH1)).await.unwrap();
        service.set_multiplier(addr(OWNER), 1, 2).await.unwrap();
        service
    }

    async fn queue_trips(service: &TollRoadService, count: u8) {
        for byte in 1..=count {
            let secret = Secret::repeat_byte(byte);
            service
                .enter_road(addr(VEHICLE), addr(BOOTH0), secret.hash(), 20)
                .await
                .unwrap();
            let receipt = service.report_exit_road(addr(BOOTH1), &secret).await.unwrap();
            assert_eq!(receipt.output, ExitStatus::Pending);
        }
    }

    #[tokio::test]
    async fn test_subscribers_see_committed_events_in_order() {
        let service = service_with(TollRoadConfig::default()).await;
        let mut rx = service.subscribe();

        let secret = Secret::repeat_byte(1);
        service
            .enter_road(addr(VEHICLE), addr(BOOTH0), secret.hash(), 20)
            .await
            .unwrap();
        service.report_exit_road(addr(BOOTH1), &secret).await.unwrap();
        service
            .set_route_price(addr(OWNER), addr(BOOTH0), addr(BOOTH1), 5)
            .await
            .unwrap();

        let kinds: Vec<&str> = (0..4).map(|_| rx.try_recv().unwrap().kind()).collect();
        assert_eq!(
            kinds,
            vec!["road_entered", "pending_payment", "route_price_set", "road_exited"]
        );
    }

    #[tokio::test]
    async fn test_rejected_operation_publishes_nothing() {
        let service = service_with(TollRoadConfig::default()).await;
        let mut rx = service.subscribe();

        let result = service.set_deposit(addr(VEHICLE), 99).await;
        assert!(matches!(result, Err(TollRoadError::Unauthorized { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_drain_pending_respects_batch_size() {
        let config = TollRoadConfig {
            route_price_drain_limit: Some(1),
            drain_batch_size: 2,
            ..TollRoadConfig::default()
        };
        let service = service_with(config).await;
        queue_trips(&service, 4).await;

        let receipt = service
            .set_route_price(addr(OWNER), addr(BOOTH0), addr(BOOTH1), 5)
            .await
            .unwrap();
        assert_eq!(receipt.output, 1);
        assert_eq!(service.pending_payment_count(addr(BOOTH0), addr(BOOTH1)).await, 3);
        let status = service.get_status().await;
        assert_eq!(status.open_trips, 3);
        assert_eq!(status.pending_trips, 3);
        assert_eq!(status.drainable_routes, 1);

        assert_eq!(service.drain_pending().await, 2);
        assert_eq!(service.pending_payment_count(addr(BOOTH0), addr(BOOTH1)).await, 1);
        assert_eq!(service.drain_pending().await, 1);
        assert_eq!(service.drain_pending().await, 0);

        let status = service.get_status().await;
        assert_eq!(status.collected_fees, 40);
        assert_eq!(status.balance, 40);
        assert_eq!(status.open_escrow, 0);
        assert_eq!(status.open_trips, 0);
        assert_eq!(status.pending_trips, 0);
        assert_eq!(status.drainable_routes, 0);
    }

    #[tokio::test]
    async fn test_background_drain_clears_backlog() {
        let config = TollRoadConfig {
            route_price_drain_limit: Some(1),
            drain_interval_secs: 1,
            ..TollRoadConfig::default()
        };
        let mut service = service_with(config).await;
        queue_trips(&service, 3).await;
        service
            .set_route_price(addr(OWNER), addr(BOOTH0), addr(BOOTH1), 5)
            .await
            .unwrap();

        service.start_background_drain();
        service.start_background_drain();
        assert!(service.is_draining());

        let mut remaining = usize::MAX;
        for _ in 0..50 {
            remaining = service.pending_payment_count(addr(BOOTH0), addr(BOOTH1)).await;
            if remaining == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(remaining, 0);

        service.stop_background_drain();
        assert!(!service.is_draining());
    }

    #[tokio::test]
    async fn test_events_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let config = TollRoadConfig {
            database_path: Some(dir.path().join("events.sqlite")),
            ..TollRoadConfig::default()
        };
        let service = service_with(config).await;
        service.set_paused(addr(OWNER), true).await.unwrap();

        let store = service.event_store().unwrap();
        let stored = store.load_events(service.id()).unwrap();
        let kinds: Vec<&str> = stored.iter().map(|e| e.event.kind()).collect();
        assert_eq!(
            kinds,
            vec!["toll_booth_added", "toll_booth_added", "multiplier_set", "paused_set"]
        );
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let registry = VehicleRegistry::new();
        let operator = TollBoothOperator::new(addr(OWNER), 10, false, Arc::new(registry)).unwrap();
        let config = TollRoadConfig {
            drain_batch_size: 0,
            ..TollRoadConfig::default()
        };
        assert!(matches!(
            TollRoadService::new(operator, config),
            Err(TollRoadError::InvalidValue(_))
        ));
    }
}
