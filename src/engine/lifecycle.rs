//! Order creation and the caller-driven transitions of the order state machine.
//!
//! Every transition re-reads the order under its lock, checks who is asking,
//! checks legality and only then writes.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::engine::queue::enqueue_order;
use crate::error::AppError;
use crate::geo::fee;
use crate::models::actor::Actor;
use crate::models::courier::GeoPoint;
use crate::models::event::DispatchEvent;
use crate::models::order::{CancelReason, DeliveryOrder, OrderItem, OrderStatus};
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub store_id: Uuid,
    pub customer_id: Uuid,
    pub items: Vec<OrderItem>,
    pub dropoff: Option<GeoPoint>,
}

/// Stores a new `pending` order and queues it for dispatch.
pub async fn create_order(state: &AppState, new: NewOrder) -> Result<DeliveryOrder, AppError> {
    if new.items.is_empty() {
        return Err(AppError::BadRequest("order must contain items".to_string()));
    }
    if new.items.iter().any(|item| item.quantity == 0) {
        return Err(AppError::BadRequest(
            "item quantity must be > 0".to_string(),
        ));
    }
    if let Some(dropoff) = &new.dropoff {
        dropoff.validate()?;
    }

    let pickup = state
        .stores
        .get(&new.store_id)
        .map(|store| store.location)
        .ok_or_else(|| AppError::NotFound(format!("store {} not found", new.store_id)))?;

    let now = state.now();
    let order = DeliveryOrder {
        id: Uuid::new_v4(),
        store_id: new.store_id,
        customer_id: new.customer_id,
        delivery: fee::quote(&state.settings, &pickup, new.dropoff.as_ref()),
        items: new.items,
        dropoff: new.dropoff,
        status: OrderStatus::Pending,
        courier_id: None,
        dispatch_round: 0,
        cancel_reason: None,
        created_at: now,
        status_updated_at: now,
    };

    enqueue_order(state, order.clone()).await?;

    info!(
        order_id = %order.id,
        store_id = %order.store_id,
        fee = order.delivery.fee,
        "order created"
    );

    Ok(order)
}

/// `pending -> cancelled`, by the customer who placed the order.
pub async fn customer_cancel(
    state: &Arc<AppState>,
    order_id: Uuid,
    customer_id: Uuid,
) -> Result<DeliveryOrder, AppError> {
    let actor = Actor::Customer(customer_id);
    apply(state, order_id, actor, OrderStatus::Cancelled, |order| {
        require(order.customer_id == customer_id, actor, order)?;
        order.cancel_reason = Some(CancelReason::Customer);
        Ok(())
    })
    .await
}

/// `assigned -> preparing`.
pub async fn store_accept(
    state: &Arc<AppState>,
    order_id: Uuid,
    store_id: Uuid,
) -> Result<DeliveryOrder, AppError> {
    let actor = Actor::Store(store_id);
    apply(state, order_id, actor, OrderStatus::Preparing, |order| {
        require(order.store_id == store_id, actor, order)
    })
    .await
}

/// `preparing -> cancelled`.
pub async fn store_reject(
    state: &Arc<AppState>,
    order_id: Uuid,
    store_id: Uuid,
) -> Result<DeliveryOrder, AppError> {
    let actor = Actor::Store(store_id);
    apply(state, order_id, actor, OrderStatus::Cancelled, |order| {
        require(order.store_id == store_id, actor, order)?;
        order.cancel_reason = Some(CancelReason::Store);
        Ok(())
    })
    .await
}

/// `preparing -> on_the_way`, marked by the store.
pub async fn store_ready(
    state: &Arc<AppState>,
    order_id: Uuid,
    store_id: Uuid,
) -> Result<DeliveryOrder, AppError> {
    let actor = Actor::Store(store_id);
    apply(state, order_id, actor, OrderStatus::OnTheWay, |order| {
        require(order.store_id == store_id, actor, order)
    })
    .await
}

/// `preparing -> on_the_way`, marked by the assigned courier.
pub async fn courier_pickup(
    state: &Arc<AppState>,
    order_id: Uuid,
    courier_id: Uuid,
) -> Result<DeliveryOrder, AppError> {
    let actor = Actor::Courier(courier_id);
    apply(state, order_id, actor, OrderStatus::OnTheWay, |order| {
        require(order.courier_id == Some(courier_id), actor, order)
    })
    .await
}

/// `on_the_way -> delivered`, by the assigned courier or the customer.
pub async fn confirm_delivery(
    state: &Arc<AppState>,
    order_id: Uuid,
    actor: Actor,
) -> Result<DeliveryOrder, AppError> {
    apply(state, order_id, actor, OrderStatus::Delivered, |order| {
        let allowed = match actor {
            Actor::Courier(id) => order.courier_id == Some(id),
            Actor::Customer(id) => order.customer_id == id,
            Actor::Store(_) | Actor::System => false,
        };
        require(allowed, actor, order)
    })
    .await
}

fn require(allowed: bool, actor: Actor, order: &DeliveryOrder) -> Result<(), AppError> {
    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "{actor} may not act on order {}",
            order.id
        )))
    }
}

async fn apply<F>(
    state: &Arc<AppState>,
    order_id: Uuid,
    actor: Actor,
    target: OrderStatus,
    authorize: F,
) -> Result<DeliveryOrder, AppError>
where
    F: FnOnce(&mut DeliveryOrder) -> Result<(), AppError>,
{
    let mut order = state.orders.lock(order_id).await?;

    // Work on a copy so a failed check cannot leave half-applied fields behind.
    let mut next = order.clone();
    authorize(&mut next)?;
    let from = next.status;
    next.transition(target, state.now())?;
    *order = next;

    if target.is_terminal() {
        if let Some(courier_id) = order.courier_id {
            state.courier_orders.detach(courier_id, order_id);
        }
        state.orders.retire(order_id);
    }

    state.publish(DispatchEvent::OrderStatusChanged {
        order_id,
        from,
        to: target,
    });
    info!(
        order_id = %order_id,
        actor = %actor,
        from = %from,
        to = %target,
        "order status changed"
    );

    Ok(order.clone())
}
