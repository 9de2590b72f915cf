use crate::error::AppError;
use crate::models::order::DeliveryOrder;
use crate::state::AppState;

/// Stores a freshly created order and hands it to the dispatch worker.
///
/// The queue slot is reserved before the order is written, so a closed queue
/// leaves the order book untouched.
pub async fn enqueue_order(state: &AppState, order: DeliveryOrder) -> Result<(), AppError> {
    let permit = state
        .order_tx
        .reserve()
        .await
        .map_err(|err| AppError::Internal(format!("order queue unavailable: {err}")))?;

    let order_id = order.id;
    state.orders.insert(order);
    permit.send(order_id);

    state.metrics.orders_in_queue.inc();
    Ok(())
}
