pub mod couriers;
pub mod orders;
pub mod stores;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::engine::reconciler::{self, SweepReport};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(couriers::router())
        .merge(orders::router())
        .merge(stores::router())
        .route("/reconciler/sweep", post(run_sweep))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    stores: usize,
    orders: usize,
    couriers: usize,
    couriers_online: usize,
    pending_offers: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        stores: state.stores.len(),
        orders: state.orders.len(),
        couriers: state.geo.len(),
        couriers_online: state.geo.online_count(),
        pending_offers: state.offers.pending_count(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}

async fn run_sweep(State(state): State<Arc<AppState>>) -> Json<SweepReport> {
    Json(reconciler::sweep(&state).await)
}
