use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::DeliveryOrder;

/// All orders, each behind its own lock.
///
/// Holding the guard returned by [`OrderBook::lock`] is the exclusive scope
/// for that order: status, courier and offer-log mutations for the order only
/// happen while it is held. Different orders never share a lock.
///
/// Orders that have not reached a terminal status are also tracked as live,
/// which is all the reconciler has to look at.
#[derive(Default)]
pub struct OrderBook {
    orders: DashMap<Uuid, Arc<Mutex<DeliveryOrder>>>,
    live: DashSet<Uuid>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: DeliveryOrder) {
        if !order.status.is_terminal() {
            self.live.insert(order.id);
        }
        self.orders.insert(order.id, Arc::new(Mutex::new(order)));
    }

    pub async fn lock(&self, order_id: Uuid) -> Result<OwnedMutexGuard<DeliveryOrder>, AppError> {
        // Clone the slot out so the map shard is released before awaiting.
        let slot = self
            .orders
            .get(&order_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        Ok(slot.lock_owned().await)
    }

    pub async fn get(&self, order_id: Uuid) -> Result<DeliveryOrder, AppError> {
        Ok(self.lock(order_id).await?.clone())
    }

    /// Orders not yet known to be terminal.
    pub fn live_ids(&self) -> Vec<Uuid> {
        self.live.iter().map(|id| *id.key()).collect()
    }

    /// Drops a terminal order from the live set. The order itself stays readable.
    pub fn retire(&self, order_id: Uuid) {
        self.live.remove(&order_id);
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
