use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::courier::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Assigned,
    Preparing,
    OnTheWay,
    Delivered,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Assigned => "assigned",
            OrderStatus::Preparing => "preparing",
            OrderStatus::OnTheWay => "on_the_way",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    /// The complete transition table. Anything not listed here is illegal.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        matches!(
            (self, next),
            (Pending, Assigned)
                | (Pending, Cancelled)
                | (Assigned, Preparing)
                | (Assigned, Pending)
                | (Preparing, OnTheWay)
                | (Preparing, Cancelled)
                | (OnTheWay, Delivered)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    Customer,
    Store,
    NoCourier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DeliveryQuote {
    pub distance_km: f64,
    pub fee: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOrder {
    pub id: Uuid,
    pub store_id: Uuid,
    pub customer_id: Uuid,
    pub items: Vec<OrderItem>,
    pub dropoff: Option<GeoPoint>,
    pub delivery: DeliveryQuote,
    pub status: OrderStatus,
    pub courier_id: Option<Uuid>,
    /// Incremented each time a stalled assignment is released.
    pub dispatch_round: u32,
    pub cancel_reason: Option<CancelReason>,
    pub created_at: DateTime<Utc>,
    pub status_updated_at: DateTime<Utc>,
}

impl DeliveryOrder {
    /// Moves the order to `next`, leaving it untouched if the move is illegal.
    pub fn transition(&mut self, next: OrderStatus, now: DateTime<Utc>) -> Result<(), AppError> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidState(format!(
                "order {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }

        self.status = next;
        self.status_updated_at = now;
        Ok(())
    }
}
