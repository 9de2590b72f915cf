use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::geo::haversine_km;
use crate::models::courier::{CourierPresence, GeoPoint, NearbyCourier};

/// Current position and online flag of every courier that has ever pinged.
///
/// Backed by a sharded map so that high-frequency pings only contend on the
/// shard holding that courier, and dispatch reads never wait on a global lock.
#[derive(Default)]
pub struct GeoIndex {
    couriers: DashMap<Uuid, CourierPresence>,
}

impl GeoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a location ping. Returns the previous online flag, `None` for a
    /// courier seen for the first time.
    pub fn update(
        &self,
        courier_id: Uuid,
        location: GeoPoint,
        online: bool,
        now: DateTime<Utc>,
    ) -> Option<bool> {
        let presence = CourierPresence {
            courier_id,
            location,
            online,
            updated_at: now,
        };

        self.couriers
            .insert(courier_id, presence)
            .map(|previous| previous.online)
    }

    pub fn get(&self, courier_id: &Uuid) -> Option<CourierPresence> {
        self.couriers.get(courier_id).map(|entry| entry.value().clone())
    }

    pub fn online_count(&self) -> usize {
        self.couriers.iter().filter(|entry| entry.online).count()
    }

    pub fn len(&self) -> usize {
        self.couriers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.couriers.is_empty()
    }

    /// Online couriers within `radius_km` of `origin`, nearest first. Equal
    /// distances are ordered by courier id.
    pub fn nearby_online(&self, origin: &GeoPoint, radius_km: f64) -> Vec<NearbyCourier> {
        let mut nearby: Vec<NearbyCourier> = self
            .couriers
            .iter()
            .filter(|entry| entry.online)
            .filter_map(|entry| {
                let distance_km = haversine_km(origin, &entry.location);
                (distance_km <= radius_km).then(|| NearbyCourier {
                    courier_id: entry.courier_id,
                    distance_km,
                })
            })
            .collect();

        nearby.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.courier_id.cmp(&b.courier_id))
        });

        nearby
    }
}
