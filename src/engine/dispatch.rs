//! Sequential-offer dispatch.
//!
//! An order is offered to one courier at a time, nearest first. Each offer
//! gets a response window; a rejection or an expired window moves on to the
//! next courier not yet tried in the current round. When nobody is left the
//! order stays `pending` without an offer until something re-triggers it.
//!
//! The dispatch decision and every response path (accept, reject, timeout)
//! run while holding the order's lock, so at most one offer per order is ever
//! in flight.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::accept;
use crate::error::AppError;
use crate::models::event::DispatchEvent;
use crate::models::offer::{OfferEntry, OfferOutcome};
use crate::models::order::{DeliveryOrder, OrderStatus};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// A new offer is out and its response window is running.
    Offered { courier_id: Uuid, offer_id: Uuid },
    /// Every nearby online courier has been tried in this round.
    Exhausted,
    /// An earlier offer is still waiting for an answer.
    InFlight,
    /// The order is not dispatchable (not pending, or no pickup location).
    Skipped,
}

impl DispatchOutcome {
    fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Offered { .. } => "offered",
            DispatchOutcome::Exhausted => "exhausted",
            DispatchOutcome::InFlight | DispatchOutcome::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Reject,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RespondOutcome {
    Assigned { order: DeliveryOrder },
    Rejected { next: DispatchOutcome },
    /// The courier had no pending offer left to reject.
    Ignored,
}

/// Consumes newly created orders and starts a dispatch task for each. Orders
/// are independent, so every one gets its own task.
pub async fn run_dispatch_worker(state: Arc<AppState>, mut order_rx: mpsc::Receiver<Uuid>) {
    info!("dispatch worker started");

    while let Some(order_id) = order_rx.recv().await {
        state.metrics.orders_in_queue.dec();

        let task_state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(err) = dispatch(&task_state, order_id).await {
                error!(order_id = %order_id, error = %err, "dispatch failed");
            }
        });
    }

    warn!("dispatch worker stopped: queue channel closed");
}

/// Offers the order to the nearest online courier not yet tried.
pub async fn dispatch(state: &Arc<AppState>, order_id: Uuid) -> Result<DispatchOutcome, AppError> {
    let mut order = state.orders.lock(order_id).await?;
    Ok(dispatch_locked(state, &mut order))
}

/// One dispatch step. The caller holds the order's lock.
pub(crate) fn dispatch_locked(state: &Arc<AppState>, order: &mut DeliveryOrder) -> DispatchOutcome {
    let outcome = next_offer(state, order);
    state
        .metrics
        .dispatch_rounds_total
        .with_label_values(&[outcome.label()])
        .inc();
    outcome
}

fn next_offer(state: &Arc<AppState>, order: &mut DeliveryOrder) -> DispatchOutcome {
    if order.status != OrderStatus::Pending || order.courier_id.is_some() {
        debug!(order_id = %order.id, status = %order.status, "order not dispatchable");
        return DispatchOutcome::Skipped;
    }

    if let Some(in_flight) = state.offers.pending(order.id) {
        debug!(
            order_id = %order.id,
            courier_id = %in_flight.courier_id,
            "offer already in flight"
        );
        return DispatchOutcome::InFlight;
    }

    let Some(origin) = state.stores.get(&order.store_id).map(|store| store.location) else {
        error!(
            order_id = %order.id,
            store_id = %order.store_id,
            "store has no pickup location; leaving order pending"
        );
        return DispatchOutcome::Skipped;
    };

    let excluded = state.offers.excluded_couriers(order.id, order.dispatch_round);
    let candidate = state
        .geo
        .nearby_online(&origin, state.settings.radius_km)
        .into_iter()
        .find(|nearby| !excluded.contains(&nearby.courier_id));

    let Some(candidate) = candidate else {
        info!(
            order_id = %order.id,
            round = order.dispatch_round,
            tried = excluded.len(),
            "no more couriers to try; order stays pending"
        );
        return DispatchOutcome::Exhausted;
    };

    let offer = OfferEntry {
        id: Uuid::new_v4(),
        order_id: order.id,
        courier_id: candidate.courier_id,
        round: order.dispatch_round,
        outcome: OfferOutcome::Pending,
        offered_at: state.now(),
        responded_at: None,
    };
    state.offers.append(offer.clone());
    state
        .metrics
        .offers_total
        .with_label_values(&["created"])
        .inc();

    state.publish(DispatchEvent::OfferCreated {
        order_id: order.id,
        courier_id: offer.courier_id,
        offer_id: offer.id,
        expires_in_secs: state.settings.offer_window.as_secs(),
    });
    schedule_timeout(state, order.id, offer.id);

    info!(
        order_id = %order.id,
        courier_id = %offer.courier_id,
        distance_km = candidate.distance_km,
        round = order.dispatch_round,
        "offer sent"
    );

    DispatchOutcome::Offered {
        courier_id: offer.courier_id,
        offer_id: offer.id,
    }
}

fn schedule_timeout(state: &Arc<AppState>, order_id: Uuid, offer_id: Uuid) {
    let window = state.settings.offer_window;
    let task_state = Arc::clone(state);

    let handle = tokio::spawn(async move {
        tokio::time::sleep(window).await;
        if let Err(err) = handle_offer_timeout(&task_state, order_id, offer_id).await {
            warn!(
                order_id = %order_id,
                offer_id = %offer_id,
                error = %err,
                "offer timeout handling failed"
            );
        }
    });

    state.timers.schedule(offer_id, handle.abort_handle());
}

/// Expires an offer whose window closed and moves on to the next courier.
/// Returns `None` when the offer had already been answered.
pub async fn handle_offer_timeout(
    state: &Arc<AppState>,
    order_id: Uuid,
    offer_id: Uuid,
) -> Result<Option<DispatchOutcome>, AppError> {
    state.timers.complete(&offer_id);

    let mut order = state.orders.lock(order_id).await?;
    let expired = match state
        .offers
        .resolve(order_id, offer_id, OfferOutcome::Timeout, state.now())
    {
        Ok(entry) => entry,
        Err(AppError::Conflict(_)) => return Ok(None),
        Err(err) => return Err(err),
    };

    state
        .metrics
        .offers_total
        .with_label_values(&["timeout"])
        .inc();
    info!(
        order_id = %order_id,
        courier_id = %expired.courier_id,
        "offer timed out; failing over"
    );

    Ok(Some(dispatch_locked(state, &mut order)))
}

/// Records a rejection and immediately offers the order to the next courier.
/// Returns `None` if the courier has no pending offer for the order, which
/// makes repeated rejections harmless.
pub async fn respond_reject(
    state: &Arc<AppState>,
    order_id: Uuid,
    courier_id: Uuid,
) -> Result<Option<DispatchOutcome>, AppError> {
    let mut order = state.orders.lock(order_id).await?;

    let Some(offer) = state.offers.pending_for(order_id, courier_id) else {
        debug!(order_id = %order_id, courier_id = %courier_id, "no pending offer to reject");
        return Ok(None);
    };

    state
        .offers
        .resolve(order_id, offer.id, OfferOutcome::Rejected, state.now())?;
    state.timers.cancel(&offer.id);
    state
        .metrics
        .offers_total
        .with_label_values(&["rejected"])
        .inc();
    info!(order_id = %order_id, courier_id = %courier_id, "offer rejected; failing over");

    Ok(Some(dispatch_locked(state, &mut order)))
}

/// Routes a courier's answer to the accept guard or the reject path.
pub async fn courier_respond(
    state: &Arc<AppState>,
    order_id: Uuid,
    courier_id: Uuid,
    decision: Decision,
) -> Result<RespondOutcome, AppError> {
    match decision {
        Decision::Accept => {
            let order = accept::accept(state, order_id, courier_id).await?;
            Ok(RespondOutcome::Assigned { order })
        }
        Decision::Reject => Ok(match respond_reject(state, order_id, courier_id).await? {
            Some(next) => RespondOutcome::Rejected { next },
            None => RespondOutcome::Ignored,
        }),
    }
}

/// External re-trigger for an order whose last round ran out of couriers.
pub async fn redispatch(
    state: &Arc<AppState>,
    order_id: Uuid,
) -> Result<DispatchOutcome, AppError> {
    let mut order = state.orders.lock(order_id).await?;

    if order.status != OrderStatus::Pending {
        return Err(AppError::InvalidState(format!(
            "order {order_id} is {} and cannot be dispatched",
            order.status
        )));
    }

    Ok(dispatch_locked(state, &mut order))
}
