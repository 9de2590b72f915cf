use std::collections::HashSet;

use dashmap::DashMap;
use uuid::Uuid;

/// Orders each courier is currently carrying, from acceptance until the order
/// is delivered, cancelled or released.
///
/// Location pings read this without touching any order lock.
#[derive(Default)]
pub struct CourierOrders {
    by_courier: DashMap<Uuid, HashSet<Uuid>>,
}

impl CourierOrders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, courier_id: Uuid, order_id: Uuid) {
        self.by_courier
            .entry(courier_id)
            .or_default()
            .insert(order_id);
    }

    pub fn detach(&self, courier_id: Uuid, order_id: Uuid) {
        if let Some(mut orders) = self.by_courier.get_mut(&courier_id) {
            orders.remove(&order_id);
        }
        self.by_courier
            .remove_if(&courier_id, |_, orders| orders.is_empty());
    }

    pub fn orders_of(&self, courier_id: Uuid) -> Vec<Uuid> {
        self.by_courier
            .get(&courier_id)
            .map(|orders| orders.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::CourierOrders;

    #[test]
    fn detach_drops_empty_couriers() {
        let index = CourierOrders::new();
        let courier = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        index.attach(courier, first);
        index.attach(courier, second);
        index.detach(courier, first);
        assert_eq!(index.orders_of(courier), vec![second]);

        index.detach(courier, second);
        assert!(index.orders_of(courier).is_empty());
        assert!(index.by_courier.is_empty());
    }

    #[test]
    fn detach_of_unknown_pair_is_harmless() {
        let index = CourierOrders::new();
        index.detach(Uuid::new_v4(), Uuid::new_v4());
        assert!(index.by_courier.is_empty());
    }
}
