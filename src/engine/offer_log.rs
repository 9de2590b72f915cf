use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::offer::{OfferEntry, OfferOutcome};

/// Append-only history of offers, grouped by order. Entries change outcome but
/// are never removed.
///
/// Callers hold the order's lock from [`crate::engine::order_book::OrderBook`]
/// around every mutation, which is what keeps a single pending entry per order.
/// That pending entry is mirrored in `in_flight`, so per-courier and global
/// lookups scan open offers only.
#[derive(Default)]
pub struct OfferLog {
    by_order: DashMap<Uuid, Vec<OfferEntry>>,
    in_flight: DashMap<Uuid, OfferEntry>,
}

impl OfferLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, entry: OfferEntry) {
        if entry.is_pending() {
            self.in_flight.insert(entry.order_id, entry.clone());
        }
        self.by_order.entry(entry.order_id).or_default().push(entry);
    }

    /// Full offer history of an order, oldest first.
    pub fn history(&self, order_id: Uuid) -> Vec<OfferEntry> {
        self.by_order
            .get(&order_id)
            .map(|entries| entries.value().clone())
            .unwrap_or_default()
    }

    pub fn pending(&self, order_id: Uuid) -> Option<OfferEntry> {
        self.in_flight.get(&order_id).map(|entry| entry.value().clone())
    }

    pub fn pending_for(&self, order_id: Uuid, courier_id: Uuid) -> Option<OfferEntry> {
        self.pending(order_id)
            .filter(|entry| entry.courier_id == courier_id)
    }

    /// Couriers that must not be offered this order in `round`: everyone tried
    /// in the round, plus anyone whose assignment was released in an earlier one.
    pub fn excluded_couriers(&self, order_id: Uuid, round: u32) -> HashSet<Uuid> {
        self.by_order
            .get(&order_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.round == round || e.outcome == OfferOutcome::Released)
                    .map(|e| e.courier_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Closes a pending offer. Fails with `Conflict` if it was already resolved.
    pub fn resolve(
        &self,
        order_id: Uuid,
        offer_id: Uuid,
        outcome: OfferOutcome,
        at: DateTime<Utc>,
    ) -> Result<OfferEntry, AppError> {
        let resolved = {
            let mut entries = self
                .by_order
                .get_mut(&order_id)
                .ok_or_else(|| AppError::NotFound(format!("no offers for order {order_id}")))?;

            let entry = entries
                .iter_mut()
                .find(|e| e.id == offer_id)
                .ok_or_else(|| AppError::NotFound(format!("offer {offer_id} not found")))?;

            if !entry.is_pending() {
                return Err(AppError::Conflict(format!(
                    "offer {offer_id} already {}",
                    entry.outcome.as_str()
                )));
            }

            entry.outcome = outcome;
            entry.responded_at = Some(at);
            entry.clone()
        };

        self.in_flight
            .remove_if(&order_id, |_, open| open.id == offer_id);
        Ok(resolved)
    }

    /// Turns the order's accepted offer into `released`.
    pub fn release_accepted(&self, order_id: Uuid, at: DateTime<Utc>) -> Option<OfferEntry> {
        let mut entries = self.by_order.get_mut(&order_id)?;
        let entry = entries
            .iter_mut()
            .find(|e| e.outcome == OfferOutcome::Accepted)?;

        entry.outcome = OfferOutcome::Released;
        entry.responded_at = Some(at);
        Some(entry.clone())
    }

    /// In-flight offers addressed to one courier.
    pub fn pending_for_courier(&self, courier_id: Uuid) -> Vec<OfferEntry> {
        let mut offers: Vec<OfferEntry> = self
            .in_flight
            .iter()
            .filter(|open| open.courier_id == courier_id)
            .map(|open| open.value().clone())
            .collect();

        offers.sort_by_key(|e| e.offered_at);
        offers
    }

    pub fn pending_count(&self) -> usize {
        self.in_flight.len()
    }
}
