//! Base price per (entry, exit) route

use crate::tollroad::errors::{TollRoadError, TollRoadResult};
use crate::tollroad::types::{Amount, RouteKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A missing key means the price is unknown; zero is a real price.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePriceTable {
    prices: HashMap<RouteKey, Amount>,
}

impl RoutePriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, route: &RouteKey) -> Option<Amount> {
        self.prices.get(route).copied()
    }

    pub fn is_set(&self, route: &RouteKey) -> bool {
        self.prices.contains_key(route)
    }

    /// Rejects loops and writes that would not change the stored price.
    pub fn set(&mut self, route: RouteKey, price: Amount) -> TollRoadResult<()> {
        if route.entry == route.exit {
            return Err(TollRoadError::invalid(
                "entry and exit booth must differ",
            ));
        }
        if self.get(&route) == Some(price) {
            return Err(TollRoadError::invalid(format!(
                "price for {} is already {}",
                route, price
            )));
        }
        self.prices.insert(route, price);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Fee owed for a settled trip: price scaled by the multiplier, never above the escrow
pub fn final_fee(price: Amount, multiplier: u64, escrowed: Amount) -> Amount {
    let full = u128::from(price) * u128::from(multiplier);
    // Bounded by `escrowed`, which fits in an Amount.
    full.min(u128::from(escrowed)) as Amount
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tollroad::types::Address;

    fn route() -> RouteKey {
        RouteKey::new(Address::repeat_byte(1), Address::repeat_byte(2))
    }

    #[test]
    fn test_unset_differs_from_zero() {
        let mut table = RoutePriceTable::new();
        assert_eq!(table.get(&route()), None);
        assert!(!table.is_set(&route()));

        table.set(route(), 0).unwrap();
        assert_eq!(table.get(&route()), Some(0));
        assert!(table.is_set(&route()));
    }

    #[test]
    fn test_routes_are_directed() {
        let mut table = RoutePriceTable::new();
        table.set(route(), 10).unwrap();
        let reverse = RouteKey::new(route().exit, route().entry);
        assert_eq!(table.get(&reverse), None);
    }

    #[test]
    fn test_rejects_loop_and_same_price() {
        let mut table = RoutePriceTable::new();
        let booth = Address::repeat_byte(1);
        assert!(table.set(RouteKey::new(booth, booth), 1).is_err());

        table.set(route(), 10).unwrap();
        assert!(table.set(route(), 10).is_err());
        table.set(route(), 11).unwrap();
        assert_eq!(table.get(&route()), Some(11));
    }

    #[test]
    fn test_final_fee_is_capped_by_escrow() {
        assert_eq!(final_fee(50, 3, 150), 150);
        assert_eq!(final_fee(50, 3, 200), 150);
        assert_eq!(final_fee(70, 3, 150), 150);
        assert_eq!(final_fee(0, 3, 150), 0);
        assert_eq!(final_fee(u64::MAX, u64::MAX, 9), 9);
    }
}
