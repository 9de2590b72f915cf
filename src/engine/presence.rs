use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::courier::{CourierPresence, GeoPoint};
use crate::models::event::DispatchEvent;
use crate::state::AppState;

/// Applies a courier location ping and forwards it to the tracking stream of
/// every order the courier is carrying. No order lock is taken, and going
/// online does not re-trigger dispatch for waiting orders.
pub fn courier_location_update(
    state: &AppState,
    courier_id: Uuid,
    lat: f64,
    lng: f64,
    online: bool,
) -> Result<CourierPresence, AppError> {
    let location = GeoPoint::new(lat, lng);
    location.validate()?;

    let now = state.now();
    let previous = state.geo.update(courier_id, location, online, now);

    match (previous, online) {
        (Some(true), false) => {
            state.metrics.couriers_online.dec();
            info!(courier_id = %courier_id, "courier went offline");
        }
        (Some(false) | None, true) => {
            state.metrics.couriers_online.inc();
            info!(courier_id = %courier_id, "courier came online");
        }
        _ => debug!(courier_id = %courier_id, lat, lng, "courier location updated"),
    }

    for order_id in state.courier_orders.orders_of(courier_id) {
        state.publish(DispatchEvent::CourierLocationUpdated {
            order_id,
            courier_id,
            location,
        });
    }

    Ok(CourierPresence {
        courier_id,
        location,
        online,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::courier_location_update;
    use crate::config::Config;
    use crate::error::AppError;
    use crate::models::courier::GeoPoint;
    use crate::models::event::DispatchEvent;
    use crate::state::AppState;

    #[test]
    fn online_gauge_follows_flag_changes() {
        let (state, _rx) = AppState::new(&Config::default());
        let courier = Uuid::new_v4();

        courier_location_update(&state, courier, 1.0, 1.0, true).unwrap();
        courier_location_update(&state, courier, 1.1, 1.0, true).unwrap();
        assert_eq!(state.metrics.couriers_online.get(), 1);

        courier_location_update(&state, courier, 1.1, 1.0, false).unwrap();
        assert_eq!(state.metrics.couriers_online.get(), 0);
        assert_eq!(state.geo.online_count(), 0);
    }

    #[test]
    fn ping_is_forwarded_to_carried_orders_only() {
        let (state, _rx) = AppState::new(&Config::default());
        let carrying = Uuid::new_v4();
        let idle = Uuid::new_v4();
        let order_id = Uuid::new_v4();
        state.courier_orders.attach(carrying, order_id);
        let mut events = state.events_tx.subscribe();

        courier_location_update(&state, idle, 1.0, 1.0, true).unwrap();
        assert!(events.try_recv().is_err());

        courier_location_update(&state, carrying, 1.5, 2.5, true).unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            DispatchEvent::CourierLocationUpdated {
                order_id,
                courier_id: carrying,
                location: GeoPoint::new(1.5, 2.5),
            }
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn invalid_coordinates_are_rejected_without_update() {
        let (state, _rx) = AppState::new(&Config::default());
        let courier = Uuid::new_v4();

        let result = courier_location_update(&state, courier, 95.0, 0.0, true);

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert!(state.geo.get(&courier).is_none());
    }
}
