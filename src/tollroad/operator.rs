//! Toll booth operator: the road usage ledger
//!
//! Vehicles enter with a deposit escrowed against a secret hash. The exit booth
//! reveals the secret; if the route price is known the trip settles at once,
//! otherwise it waits in the pending queue of its route until the owner sets
//! the price or someone drains the queue.
//!
//! Every operation checks all of its preconditions before the first write, so
//! a rejected call leaves the ledger untouched.

use crate::tollroad::access::AccessGuard;
use crate::tollroad::booths::BoothRegistry;
use crate::tollroad::deposit::DepositPolicy;
use crate::tollroad::errors::{TollRoadError, TollRoadResult};
use crate::tollroad::events::{Receipt, TollRoadEvent, Transfer};
use crate::tollroad::ledger::{TripLedger, TripRecord};
use crate::tollroad::multiplier::MultiplierTable;
use crate::tollroad::pending::{PendingPayment, PendingQueues};
use crate::tollroad::regulator::VehicleTypeLookup;
use crate::tollroad::routes::{final_fee, RoutePriceTable};
use crate::tollroad::types::{hash_secret, Address, Amount, RouteKey, Secret, SecretHash, VehicleType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// How an exit report was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitStatus {
    /// Price known, trip settled
    Settled,
    /// Price unknown, trip queued
    Pending,
}

impl ExitStatus {
    /// Numeric status reported to booths: 1 settled, 2 pending
    pub fn code(&self) -> u8 {
        match self {
            ExitStatus::Settled => 1,
            ExitStatus::Pending => 2,
        }
    }
}

/// Everything an operator owns, serializable as a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorState {
    pub access: AccessGuard,
    pub deposit: DepositPolicy,
    pub multipliers: MultiplierTable,
    pub booths: BoothRegistry,
    pub routes: RoutePriceTable,
    pub trips: TripLedger,
    pub pending: PendingQueues,
    /// Fees retained by the operator
    pub collected_fees: Amount,
    /// Funds in custody: collected fees plus open escrow
    pub balance: Amount,
}

/// Persisted form of an operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorSnapshot {
    pub id: Uuid,
    pub state: OperatorState,
}

impl OperatorSnapshot {
    pub fn to_json(&self) -> TollRoadResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(data: &str) -> TollRoadResult<Self> {
        Ok(serde_json::from_str(data)?)
    }
}

pub struct TollBoothOperator {
    id: Uuid,
    state: OperatorState,
    vehicles: Arc<dyn VehicleTypeLookup>,
    /// Cap on trips settled by a single `set_route_price`; `None` drains all
    route_price_drain_limit: Option<usize>,
}

impl std::fmt::Debug for TollBoothOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TollBoothOperator")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("route_price_drain_limit", &self.route_price_drain_limit)
            .finish()
    }
}

impl TollBoothOperator {
    /// Create an operator with a fresh id
    pub fn new(
        owner: Address,
        deposit: Amount,
        paused: bool,
        vehicles: Arc<dyn VehicleTypeLookup>,
    ) -> TollRoadResult<Self> {
        Self::with_id(Uuid::new_v4(), owner, deposit, paused, vehicles)
    }

    pub fn with_id(
        id: Uuid,
        owner: Address,
        deposit: Amount,
        paused: bool,
        vehicles: Arc<dyn VehicleTypeLookup>,
    ) -> TollRoadResult<Self> {
        let state = OperatorState {
            access: AccessGuard::new(owner, paused)?,
            deposit: DepositPolicy::new(deposit)?,
            multipliers: MultiplierTable::new(),
            booths: BoothRegistry::new(),
            routes: RoutePriceTable::new(),
            trips: TripLedger::new(),
            pending: PendingQueues::new(),
            collected_fees: 0,
            balance: 0,
        };

        Ok(Self {
            id,
            state,
            vehicles,
            route_price_drain_limit: None,
        })
    }

    pub fn from_snapshot(snapshot: OperatorSnapshot, vehicles: Arc<dyn VehicleTypeLookup>) -> Self {
        Self {
            id: snapshot.id,
            state: snapshot.state,
            vehicles,
            route_price_drain_limit: None,
        }
    }

    pub fn snapshot(&self) -> OperatorSnapshot {
        OperatorSnapshot {
            id: self.id,
            state: self.state.clone(),
        }
    }

    pub fn set_route_price_drain_limit(&mut self, limit: Option<usize>) {
        self.route_price_drain_limit = limit;
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    // ----- administration -----

    pub fn set_paused(&mut self, caller: Address, paused: bool) -> TollRoadResult<Receipt<()>> {
        let event = self.state.access.set_paused(caller, paused)?;
        log::info!("Operator {} paused state set to {}", self.id, paused);
        Ok(Receipt::with_event((), event))
    }

    pub fn set_owner(&mut self, caller: Address, new_owner: Address) -> TollRoadResult<Receipt<()>> {
        let event = self.state.access.set_owner(caller, new_owner)?;
        log::info!("Operator {} ownership moved to {}", self.id, new_owner);
        Ok(Receipt::with_event((), event))
    }

    pub fn set_deposit(&mut self, caller: Address, deposit: Amount) -> TollRoadResult<Receipt<()>> {
        self.state.access.require_owner(caller)?;
        self.state.deposit.set(deposit)?;
        log::info!("Operator {} deposit set to {}", self.id, deposit);
        Ok(Receipt::with_event(
            (),
            TollRoadEvent::DepositSet {
                sender: caller,
                deposit,
            },
        ))
    }

    pub fn add_toll_booth(&mut self, caller: Address, booth: Address) -> TollRoadResult<Receipt<()>> {
        self.state.access.require_owner(caller)?;
        self.state.booths.add(booth)?;
        log::info!("Operator {} added toll booth {}", self.id, booth);
        Ok(Receipt::with_event(
            (),
            TollRoadEvent::TollBoothAdded {
                sender: caller,
                booth,
            },
        ))
    }

    pub fn set_multiplier(
        &mut self,
        caller: Address,
        vehicle_type: VehicleType,
        multiplier: u64,
    ) -> TollRoadResult<Receipt<()>> {
        self.state.access.require_owner(caller)?;
        self.state.multipliers.set(vehicle_type, multiplier)?;
        log::debug!(
            "Operator {} multiplier for type {} set to {}",
            self.id,
            vehicle_type,
            multiplier
        );
        Ok(Receipt::with_event(
            (),
            TollRoadEvent::MultiplierSet {
                sender: caller,
                vehicle_type,
                multiplier,
            },
        ))
    }

    /// Publish a route price and settle the trips queued on that exact route.
    ///
    /// Returns the number of trips settled. Without a drain limit the whole
    /// queue is settled in this call.
    pub fn set_route_price(
        &mut self,
        caller: Address,
        entry_booth: Address,
        exit_booth: Address,
        price: Amount,
    ) -> TollRoadResult<Receipt<usize>> {
        self.state.access.require_owner(caller)?;
        self.state.booths.require(entry_booth)?;
        self.state.booths.require(exit_booth)?;

        let route = RouteKey::new(entry_booth, exit_booth);
        let limit = self.route_price_drain_limit.unwrap_or(usize::MAX);
        let batch = self.pending_batch(&route, limit)?;
        self.state.routes.set(route, price)?;

        let mut receipt = Receipt::with_event(
            0,
            TollRoadEvent::RoutePriceSet {
                sender: caller,
                entry_booth,
                exit_booth,
                price,
            },
        );
        let settled = self.settle_batch(&route, price, &batch, &mut receipt);
        receipt.output = settled;

        log::info!(
            "Operator {} route {} priced at {}, settled {} pending trips",
            self.id,
            route,
            price,
            receipt.output
        );
        Ok(receipt)
    }

    // ----- trips -----

    /// Open a trip for the calling vehicle, escrowing all of `paid`.
    pub fn enter_road(
        &mut self,
        caller: Address,
        entry_booth: Address,
        secret_hash: SecretHash,
        paid: Amount,
    ) -> TollRoadResult<Receipt<()>> {
        self.state.access.require_not_paused()?;
        self.state.booths.require(entry_booth)?;
        let multiplier = self
            .multiplier_for(&caller)
            .ok_or(TollRoadError::UnclassifiedVehicle(caller))?;
        if self.state.trips.is_known(&secret_hash) {
            return Err(TollRoadError::DuplicateCommitment);
        }

        let required = self.state.deposit.required_for(multiplier);
        if u128::from(paid) < required {
            return Err(TollRoadError::InsufficientDeposit { required, paid });
        }
        let balance = self
            .state
            .balance
            .checked_add(paid)
            .ok_or(TollRoadError::BalanceOverflow)?;

        self.state.trips.insert(
            secret_hash,
            TripRecord {
                vehicle: caller,
                entry_booth,
                escrowed: paid,
            },
        )?;
        self.state.balance = balance;

        log::info!(
            "Vehicle {} entered at {} escrowing {}",
            caller,
            entry_booth,
            paid
        );
        Ok(Receipt::with_event(
            (),
            TollRoadEvent::RoadEntered {
                vehicle: caller,
                entry_booth,
                secret_hash,
                deposited: paid,
            },
        ))
    }

    /// Report that the vehicle holding `secret` left the road at the calling booth.
    pub fn report_exit_road(&mut self, caller: Address, secret: &Secret) -> TollRoadResult<Receipt<ExitStatus>> {
        let (secret_hash, record, price) = self.resolve_exit(caller, secret)?;
        let route = RouteKey::new(record.entry_booth, caller);

        match price {
            Some(price) => {
                let mut receipt = Receipt::new(ExitStatus::Settled);
                let record = self.state.trips.close(&secret_hash)?;
                self.settle(secret_hash, record, caller, price, &mut receipt);
                Ok(receipt)
            }
            None => {
                self.state.pending.push(
                    route,
                    PendingPayment {
                        secret_hash,
                        exit_booth: caller,
                    },
                )?;
                log::info!(
                    "Exit of {} on {} queued until the route is priced",
                    secret_hash,
                    route
                );
                Ok(Receipt::with_event(
                    ExitStatus::Pending,
                    TollRoadEvent::PendingPayment {
                        secret_hash,
                        entry_booth: record.entry_booth,
                        exit_booth: caller,
                    },
                ))
            }
        }
    }

    /// Predict the outcome of [`Self::report_exit_road`] without changing anything.
    pub fn simulate_exit_road(&self, caller: Address, secret: &Secret) -> TollRoadResult<ExitStatus> {
        let (_, _, price) = self.resolve_exit(caller, secret)?;
        Ok(match price {
            Some(_) => ExitStatus::Settled,
            None => ExitStatus::Pending,
        })
    }

    /// Settle at most `max_count` queued trips of a priced route, oldest first.
    ///
    /// Returns how many trips were settled; fewer than `max_count` queued is
    /// not an error.
    pub fn clear_some_pending_payments(
        &mut self,
        caller: Address,
        entry_booth: Address,
        exit_booth: Address,
        max_count: usize,
    ) -> TollRoadResult<Receipt<usize>> {
        self.state.booths.require(entry_booth)?;
        self.state.booths.require(exit_booth)?;
        if max_count == 0 {
            return Err(TollRoadError::invalid("max count must be positive"));
        }

        let route = RouteKey::new(entry_booth, exit_booth);
        let price = self
            .state
            .routes
            .get(&route)
            .ok_or(TollRoadError::PriceStillUnset {
                entry: entry_booth,
                exit: exit_booth,
            })?;
        let batch = self.pending_batch(&route, max_count)?;

        let mut receipt = Receipt::new(0);
        let settled = self.settle_batch(&route, price, &batch, &mut receipt);
        receipt.output = settled;
        log::debug!(
            "{} cleared {} pending payments on {}",
            caller,
            receipt.output,
            route
        );
        Ok(receipt)
    }

    // ----- queries -----

    pub fn owner(&self) -> Address {
        self.state.access.owner()
    }

    pub fn is_paused(&self) -> bool {
        self.state.access.is_paused()
    }

    pub fn deposit(&self) -> Amount {
        self.state.deposit.deposit()
    }

    pub fn multiplier(&self, vehicle_type: VehicleType) -> Option<u64> {
        self.state.multipliers.get(vehicle_type)
    }

    pub fn is_booth(&self, booth: &Address) -> bool {
        self.state.booths.contains(booth)
    }

    pub fn route_price(&self, entry_booth: Address, exit_booth: Address) -> Option<Amount> {
        self.state.routes.get(&RouteKey::new(entry_booth, exit_booth))
    }

    /// Trip opened under `secret_hash`; zeroed once settled or if never seen
    pub fn vehicle_entry(&self, secret_hash: &SecretHash) -> TripRecord {
        self.state.trips.entry(secret_hash)
    }

    pub fn pending_payment_count(&self, entry_booth: Address, exit_booth: Address) -> usize {
        self.state.pending.count(&RouteKey::new(entry_booth, exit_booth))
    }

    /// Routes with queued trips whose price has since been set
    pub fn drainable_routes(&self) -> Vec<RouteKey> {
        self.state
            .pending
            .routes()
            .into_iter()
            .filter(|route| self.state.routes.is_set(route))
            .collect()
    }

    pub fn collected_fees(&self) -> Amount {
        self.state.collected_fees
    }

    pub fn balance(&self) -> Amount {
        self.state.balance
    }

    pub fn open_escrow(&self) -> u128 {
        self.state.trips.open_escrow()
    }

    pub fn open_trip_count(&self) -> usize {
        self.state.trips.open_count()
    }

    /// Trips parked across every route
    pub fn total_pending(&self) -> usize {
        self.state.pending.total()
    }

    pub fn hash_secret(&self, secret: &Secret) -> SecretHash {
        hash_secret(secret)
    }

    // ----- internals -----

    fn multiplier_for(&self, vehicle: &Address) -> Option<u64> {
        self.vehicles
            .vehicle_type(vehicle)
            .and_then(|vehicle_type| self.state.multipliers.get(vehicle_type))
    }

    /// Lookups shared by the exit report and its simulation
    fn resolve_exit(
        &self,
        caller: Address,
        secret: &Secret,
    ) -> TollRoadResult<(SecretHash, TripRecord, Option<Amount>)> {
        self.state.booths.require(caller)?;
        let secret_hash = hash_secret(secret);
        let record = *self
            .state
            .trips
            .open_trip(&secret_hash)
            .ok_or(TollRoadError::UnknownTrip)?;
        if self.state.pending.is_parked(&secret_hash) {
            return Err(TollRoadError::DuplicateCommitment);
        }
        if record.entry_booth == caller {
            return Err(TollRoadError::invalid("exit booth must differ from entry booth"));
        }

        let price = self.state.routes.get(&RouteKey::new(record.entry_booth, caller));
        Ok((secret_hash, record, price))
    }

    /// Head of the route's queue, checked to still reference open trips
    fn pending_batch(&self, route: &RouteKey, limit: usize) -> TollRoadResult<Vec<PendingPayment>> {
        let batch = self.state.pending.peek(route, limit);
        if batch
            .iter()
            .any(|payment| self.state.trips.open_trip(&payment.secret_hash).is_none())
        {
            return Err(TollRoadError::UnknownTrip);
        }
        Ok(batch)
    }

    fn settle_batch(
        &mut self,
        route: &RouteKey,
        price: Amount,
        batch: &[PendingPayment],
        receipt: &mut Receipt<usize>,
    ) -> usize {
        let mut settled = 0;
        for _ in batch {
            let Some(payment) = self.state.pending.pop_front(route) else {
                break;
            };
            if let Ok(record) = self.state.trips.close(&payment.secret_hash) {
                self.settle(payment.secret_hash, record, payment.exit_booth, price, receipt);
                settled += 1;
            }
        }
        settled
    }

    /// Book the fee, release the refund and record the exit of a closed trip
    fn settle<T>(
        &mut self,
        secret_hash: SecretHash,
        record: TripRecord,
        exit_booth: Address,
        price: Amount,
        receipt: &mut Receipt<T>,
    ) {
        // A type or multiplier cleared since entry settles at no charge.
        let multiplier = self.multiplier_for(&record.vehicle).unwrap_or(0);
        let fee = final_fee(price, multiplier, record.escrowed);
        let refund = record.escrowed - fee;

        // balance == collected_fees + open escrow, so neither side can wrap.
        self.state.collected_fees = self.state.collected_fees.saturating_add(fee);
        self.state.balance = self.state.balance.saturating_sub(refund);
        if refund > 0 {
            receipt.transfers.push(Transfer {
                to: record.vehicle,
                amount: refund,
            });
        }
        receipt.events.push(TollRoadEvent::RoadExited {
            exit_booth,
            secret_hash,
            final_fee: fee,
            refund,
        });

        log::info!(
            "Trip {} settled at {}: fee {}, refund {}",
            secret_hash,
            exit_booth,
            fee,
            refund
        );
    }
}
