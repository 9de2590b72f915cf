use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::event::DispatchEvent;
use crate::models::offer::OfferOutcome;
use crate::models::order::{DeliveryOrder, OrderStatus};
use crate::state::AppState;

/// Assigns the order to `courier_id` if that courier holds its pending offer.
///
/// Runs entirely under the order's lock: every check happens before the first
/// write, and the offer, courier and status writes land together. Of any
/// number of concurrent callers at most one succeeds; the rest see `Conflict`
/// (order already taken) or `NotFound` (no pending offer for them).
pub async fn accept(
    state: &Arc<AppState>,
    order_id: Uuid,
    courier_id: Uuid,
) -> Result<DeliveryOrder, AppError> {
    let mut order = state.orders.lock(order_id).await?;

    if order.status != OrderStatus::Pending {
        return Err(AppError::Conflict(format!(
            "order {order_id} is no longer pending ({})",
            order.status
        )));
    }

    if order.courier_id.is_some() {
        return Err(AppError::Conflict(format!(
            "order {order_id} already accepted by another courier"
        )));
    }

    let offer = state.offers.pending_for(order_id, courier_id).ok_or_else(|| {
        AppError::NotFound(format!(
            "courier {courier_id} has no pending offer for order {order_id}"
        ))
    })?;

    let now = state.now();
    state
        .offers
        .resolve(order_id, offer.id, OfferOutcome::Accepted, now)?;
    order.transition(OrderStatus::Assigned, now)?;
    order.courier_id = Some(courier_id);
    state.courier_orders.attach(courier_id, order_id);

    state.timers.cancel(&offer.id);
    state
        .metrics
        .offers_total
        .with_label_values(&["accepted"])
        .inc();
    state.publish(DispatchEvent::OrderAssigned {
        order_id,
        courier_id,
    });

    info!(order_id = %order_id, courier_id = %courier_id, "order assigned");

    Ok(order.clone())
}
