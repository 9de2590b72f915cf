use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::courier::GeoPoint;
use crate::models::order::OrderStatus;

/// Everything the core tells the outside world. Delivery (push, socket, SMS)
/// is up to whoever subscribes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    OfferCreated {
        order_id: Uuid,
        courier_id: Uuid,
        offer_id: Uuid,
        expires_in_secs: u64,
    },
    OrderAssigned {
        order_id: Uuid,
        courier_id: Uuid,
    },
    OrderAutoCancelled {
        order_id: Uuid,
    },
    OrderReleased {
        order_id: Uuid,
        courier_id: Uuid,
    },
    OrderStatusChanged {
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },
    /// Live tracking: the carrying courier moved.
    CourierLocationUpdated {
        order_id: Uuid,
        courier_id: Uuid,
        location: GeoPoint,
    },
}

impl DispatchEvent {
    pub fn order_id(&self) -> Uuid {
        match self {
            DispatchEvent::OfferCreated { order_id, .. }
            | DispatchEvent::OrderAssigned { order_id, .. }
            | DispatchEvent::OrderAutoCancelled { order_id }
            | DispatchEvent::OrderReleased { order_id, .. }
            | DispatchEvent::OrderStatusChanged { order_id, .. }
            | DispatchEvent::CourierLocationUpdated { order_id, .. } => *order_id,
        }
    }

    /// Courier the event concerns, if any.
    pub fn courier_id(&self) -> Option<Uuid> {
        match self {
            DispatchEvent::OfferCreated { courier_id, .. }
            | DispatchEvent::OrderAssigned { courier_id, .. }
            | DispatchEvent::OrderReleased { courier_id, .. }
            | DispatchEvent::CourierLocationUpdated { courier_id, .. } => Some(*courier_id),
            _ => None,
        }
    }
}
