use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub offers_total: IntCounterVec,
    pub dispatch_rounds_total: IntCounterVec,
    pub reconciler_actions_total: IntCounterVec,
    pub orders_in_queue: IntGauge,
    pub couriers_online: IntGauge,
    pub sweep_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let offers_total = IntCounterVec::new(
            Opts::new("offers_total", "Offers created and resolved, by outcome"),
            &["outcome"],
        )
        .expect("valid offers_total metric");

        let dispatch_rounds_total = IntCounterVec::new(
            Opts::new("dispatch_rounds_total", "Dispatch attempts by result"),
            &["result"],
        )
        .expect("valid dispatch_rounds_total metric");

        let reconciler_actions_total = IntCounterVec::new(
            Opts::new(
                "reconciler_actions_total",
                "Orders repaired by the reconciliation sweep, by action",
            ),
            &["action"],
        )
        .expect("valid reconciler_actions_total metric");

        let orders_in_queue = IntGauge::new(
            "orders_in_queue",
            "Orders waiting for their first dispatch attempt",
        )
        .expect("valid orders_in_queue metric");

        let couriers_online = IntGauge::new("couriers_online", "Couriers currently online")
            .expect("valid couriers_online metric");

        let sweep_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "sweep_duration_seconds",
            "Duration of a reconciliation sweep in seconds",
        ))
        .expect("valid sweep_duration_seconds metric");

        registry
            .register(Box::new(offers_total.clone()))
            .expect("register offers_total");
        registry
            .register(Box::new(dispatch_rounds_total.clone()))
            .expect("register dispatch_rounds_total");
        registry
            .register(Box::new(reconciler_actions_total.clone()))
            .expect("register reconciler_actions_total");
        registry
            .register(Box::new(orders_in_queue.clone()))
            .expect("register orders_in_queue");
        registry
            .register(Box::new(couriers_online.clone()))
            .expect("register couriers_online");
        registry
            .register(Box::new(sweep_duration_seconds.clone()))
            .expect("register sweep_duration_seconds");

        Self {
            registry,
            offers_total,
            dispatch_rounds_total,
            reconciler_actions_total,
            orders_in_queue,
            couriers_online,
            sweep_duration_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
