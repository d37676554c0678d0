//! FIFO queues of exits reported before their route price was known

use crate::tollroad::errors::{TollRoadError, TollRoadResult};
use crate::tollroad::types::{Address, RouteKey, SecretHash};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Trip waiting for a price on its route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayment {
    pub secret_hash: SecretHash,
    pub exit_booth: Address,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingQueues {
    queues: HashMap<RouteKey, VecDeque<PendingPayment>>,
    /// Every commitment currently sitting in some queue
    parked: HashSet<SecretHash>,
}

impl PendingQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, route: &RouteKey) -> usize {
        self.queues.get(route).map_or(0, VecDeque::len)
    }

    pub fn total(&self) -> usize {
        self.parked.len()
    }

    pub fn is_parked(&self, secret_hash: &SecretHash) -> bool {
        self.parked.contains(secret_hash)
    }

    pub fn push(&mut self, route: RouteKey, payment: PendingPayment) -> TollRoadResult<()> {
        if !self.parked.insert(payment.secret_hash) {
            return Err(TollRoadError::DuplicateCommitment);
        }
        self.queues.entry(route).or_default().push_back(payment);
        Ok(())
    }

    /// Oldest queued payments for `route`, at most `limit` of them
    pub fn peek(&self, route: &RouteKey, limit: usize) -> Vec<PendingPayment> {
        self.queues
            .get(route)
            .map(|queue| queue.iter().take(limit).copied().collect())
            .unwrap_or_default()
    }

    pub fn pop_front(&mut self, route: &RouteKey) -> Option<PendingPayment> {
        let queue = self.queues.get_mut(route)?;
        let payment = queue.pop_front()?;
        if queue.is_empty() {
            self.queues.remove(route);
        }
        self.parked.remove(&payment.secret_hash);
        Some(payment)
    }

    /// Routes that currently hold a backlog, in a stable order
    pub fn routes(&self) -> Vec<RouteKey> {
        let mut routes: Vec<RouteKey> = self.queues.keys().copied().collect();
        routes.sort();
        routes
    }
}
