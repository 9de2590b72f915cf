use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::event::DispatchEvent;
use crate::state::AppState;

#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct EventFilter {
    pub courier_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
}

impl EventFilter {
    pub fn matches(&self, event: &DispatchEvent) -> bool {
        let courier_ok = self
            .courier_id
            .is_none_or(|id| event.courier_id() == Some(id));
        let order_ok = self.order_id.is_none_or(|id| event.order_id() == id);
        courier_ok && order_ok
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<EventFilter>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, filter))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, filter: EventFilter) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = BroadcastStream::new(state.events_tx.subscribe());

    info!(?filter, "websocket client connected");

    let send_task = tokio::spawn(async move {
        while let Some(next) = events.next().await {
            let event = match next {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "websocket subscriber lagged; events dropped");
                    continue;
                }
            };
            if !filter.matches(&event) {
                continue;
            }

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("websocket client disconnected");
}
