use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::courier::GeoPoint;
use crate::models::store::Store;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stores", post(register_store))
        .route("/stores/:id", get(get_store))
}

#[derive(Deserialize)]
pub struct RegisterStoreRequest {
    pub name: String,
    pub location: GeoPoint,
}

async fn register_store(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterStoreRequest>,
) -> Result<Json<Store>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    payload.location.validate()?;

    let store = Store {
        id: Uuid::new_v4(),
        name: payload.name,
        location: payload.location,
        created_at: state.now(),
    };

    state.stores.insert(store.id, store.clone());
    Ok(Json(store))
}

async fn get_store(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Store>, AppError> {
    let store = state
        .stores
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("store {} not found", id)))?;

    Ok(Json(store.value().clone()))
}
