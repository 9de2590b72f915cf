use crate::config::DispatchSettings;
use crate::geo::haversine_km;
use crate::models::courier::GeoPoint;
use crate::models::order::DeliveryQuote;

/// Distance-based delivery fee with a floor. Without a drop-off point the flat
/// default applies.
pub fn quote(
    settings: &DispatchSettings,
    pickup: &GeoPoint,
    dropoff: Option<&GeoPoint>,
) -> DeliveryQuote {
    let Some(dropoff) = dropoff else {
        return DeliveryQuote {
            distance_km: 0.0,
            fee: settings.default_delivery_fee,
        };
    };

    let distance_km = haversine_km(pickup, dropoff);
    let fee = round2(distance_km * settings.cost_per_km).max(settings.min_delivery_fee);

    DeliveryQuote {
        distance_km: round2(distance_km),
        fee,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
