use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::presence::courier_location_update;
use crate::error::AppError;
use crate::models::courier::{CourierPresence, GeoPoint, NearbyCourier};
use crate::models::offer::OfferEntry;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/couriers/nearby", get(nearby_couriers))
        .route(
            "/couriers/:id/presence",
            get(get_presence).put(update_presence),
        )
        .route("/couriers/:id/offers", get(pending_offers))
}

#[derive(Deserialize)]
pub struct PresenceRequest {
    pub lat: f64,
    pub lng: f64,
    pub online: bool,
}

#[derive(Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: Option<f64>,
}

async fn update_presence(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PresenceRequest>,
) -> Result<Json<CourierPresence>, AppError> {
    let presence =
        courier_location_update(&state, id, payload.lat, payload.lng, payload.online)?;
    Ok(Json(presence))
}

async fn get_presence(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CourierPresence>, AppError> {
    let presence = state
        .geo
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("courier {} not found", id)))?;

    Ok(Json(presence))
}

async fn pending_offers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<Vec<OfferEntry>> {
    Json(state.offers.pending_for_courier(id))
}

async fn nearby_couriers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<Vec<NearbyCourier>>, AppError> {
    let origin = GeoPoint::new(query.lat, query.lng);
    origin.validate()?;

    let radius_km = query.radius_km.unwrap_or(state.settings.radius_km);
    if !radius_km.is_finite() || radius_km < 0.0 {
        return Err(AppError::BadRequest(
            "radius_km must be a non-negative number".to_string(),
        ));
    }

    Ok(Json(state.geo.nearby_online(&origin, radius_km)))
}
