use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::dispatch::{self, Decision, DispatchOutcome, RespondOutcome};
use crate::engine::lifecycle::{self, NewOrder};
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::courier::GeoPoint;
use crate::models::offer::OfferEntry;
use crate::models::order::{DeliveryOrder, OrderItem};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/offers", get(offer_history))
        .route("/orders/:id/respond", post(courier_respond))
        .route("/orders/:id/cancel", post(customer_cancel))
        .route("/orders/:id/store/accept", post(store_accept))
        .route("/orders/:id/store/reject", post(store_reject))
        .route("/orders/:id/store/ready", post(store_ready))
        .route("/orders/:id/pickup", post(courier_pickup))
        .route("/orders/:id/confirm-delivery", post(confirm_delivery))
        .route("/orders/:id/dispatch", post(redispatch))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub store_id: Uuid,
    pub customer_id: Uuid,
    pub items: Vec<OrderItem>,
    pub dropoff: Option<GeoPoint>,
}

#[derive(Deserialize)]
pub struct RespondRequest {
    pub courier_id: Uuid,
    pub decision: Decision,
}

#[derive(Deserialize)]
pub struct CustomerRequest {
    pub customer_id: Uuid,
}

#[derive(Deserialize)]
pub struct StoreRequest {
    pub store_id: Uuid,
}

#[derive(Deserialize)]
pub struct CourierRequest {
    pub courier_id: Uuid,
}

#[derive(Deserialize)]
pub struct ConfirmDeliveryRequest {
    pub actor: Actor,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let order = lifecycle::create_order(
        &state,
        NewOrder {
            store_id: payload.store_id,
            customer_id: payload.customer_id,
            items: payload.items,
            dropoff: payload.dropoff,
        },
    )
    .await?;

    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOrder>, AppError> {
    Ok(Json(state.orders.get(id).await?))
}

async fn offer_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<OfferEntry>>, AppError> {
    // Existence check so unknown orders 404 instead of returning [].
    state.orders.get(id).await?;
    Ok(Json(state.offers.history(id)))
}

async fn courier_respond(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RespondRequest>,
) -> Result<Json<RespondOutcome>, AppError> {
    let outcome =
        dispatch::courier_respond(&state, id, payload.courier_id, payload.decision).await?;
    Ok(Json(outcome))
}

async fn customer_cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CustomerRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    Ok(Json(
        lifecycle::customer_cancel(&state, id, payload.customer_id).await?,
    ))
}

async fn store_accept(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StoreRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    Ok(Json(
        lifecycle::store_accept(&state, id, payload.store_id).await?,
    ))
}

async fn store_reject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StoreRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    Ok(Json(
        lifecycle::store_reject(&state, id, payload.store_id).await?,
    ))
}

async fn store_ready(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StoreRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    Ok(Json(
        lifecycle::store_ready(&state, id, payload.store_id).await?,
    ))
}

async fn courier_pickup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CourierRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    Ok(Json(
        lifecycle::courier_pickup(&state, id, payload.courier_id).await?,
    ))
}

async fn confirm_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConfirmDeliveryRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    Ok(Json(
        lifecycle::confirm_delivery(&state, id, payload.actor).await?,
    ))
}

async fn redispatch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DispatchOutcome>, AppError> {
    Ok(Json(dispatch::redispatch(&state, id).await?))
}
