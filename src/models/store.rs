use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::courier::GeoPoint;

/// Pickup point of an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub id: Uuid,
    pub name: String,
    pub location: GeoPoint,
    pub created_at: DateTime<Utc>,
}
