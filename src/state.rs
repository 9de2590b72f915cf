use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, DispatchSettings};
use crate::engine::courier_orders::CourierOrders;
use crate::engine::offer_log::OfferLog;
use crate::engine::order_book::OrderBook;
use crate::engine::timers::OfferTimers;
use crate::geo::GeoIndex;
use crate::models::event::DispatchEvent;
use crate::models::store::Store;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub settings: DispatchSettings,
    pub clock: Arc<dyn Clock>,
    pub stores: DashMap<Uuid, Store>,
    pub orders: OrderBook,
    pub offers: OfferLog,
    pub geo: GeoIndex,
    pub courier_orders: CourierOrders,
    pub timers: OfferTimers,
    pub order_tx: mpsc::Sender<Uuid>,
    pub events_tx: broadcast::Sender<DispatchEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config) -> (Self, mpsc::Receiver<Uuid>) {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> (Self, mpsc::Receiver<Uuid>) {
        let (order_tx, order_rx) = mpsc::channel(config.order_queue_size);
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        (
            Self {
                settings: config.dispatch.clone(),
                clock,
                stores: DashMap::new(),
                orders: OrderBook::new(),
                offers: OfferLog::new(),
                geo: GeoIndex::new(),
                courier_orders: CourierOrders::new(),
                timers: OfferTimers::new(),
                order_tx,
                events_tx,
                metrics: Metrics::new(),
            },
            order_rx,
        )
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Fire-and-forget: having no subscribers is not an error.
    pub fn publish(&self, event: DispatchEvent) {
        let _ = self.events_tx.send(event);
    }
}
