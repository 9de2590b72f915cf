use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Rejects coordinates outside the WGS84 range.
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(AppError::BadRequest(format!(
                "lat must be between -90 and 90, got {}",
                self.lat
            )));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(AppError::BadRequest(format!(
                "lng must be between -180 and 180, got {}",
                self.lng
            )));
        }
        Ok(())
    }
}

/// Last reported position of a courier. Written only by location pings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierPresence {
    pub courier_id: Uuid,
    pub location: GeoPoint,
    pub online: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NearbyCourier {
    pub courier_id: Uuid,
    pub distance_km: f64,
}
