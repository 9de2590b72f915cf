//! Periodic repair of orders stuck past their SLA.
//!
//! - `pending` longer than the pending TTL: auto-cancelled.
//! - `assigned` longer than the pickup TTL: courier released, order back to
//!   `pending`, new dispatch round started.
//!
//! Each order is handled on its own; a failure is logged and the sweep moves on.
//! Only live orders are visited; terminal ones drop out of the live set.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::dispatch::{DispatchOutcome, dispatch_locked};
use crate::error::AppError;
use crate::models::event::DispatchEvent;
use crate::models::order::{CancelReason, OrderStatus};
use crate::state::AppState;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub auto_cancelled: usize,
    pub released: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SweepAction {
    AutoCancelled,
    Released(DispatchOutcome),
}

/// Runs [`sweep`] every `sweep_interval` until `shutdown` fires.
pub async fn run_reconciler(state: Arc<AppState>, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(state.settings.sweep_interval);
    // The first tick completes immediately; skip it so a fresh start does not sweep.
    ticker.tick().await;

    info!(
        interval_secs = state.settings.sweep_interval.as_secs(),
        "reconciler started"
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                sweep(&state).await;
            }
        }
    }

    info!("reconciler stopped");
}

/// One pass over every live order.
pub async fn sweep(state: &Arc<AppState>) -> SweepReport {
    let started = Instant::now();
    let now = state.now();
    let mut report = SweepReport::default();

    for order_id in state.orders.live_ids() {
        report.scanned += 1;

        match reconcile_order(state, order_id, now).await {
            Ok(Some(SweepAction::AutoCancelled)) => {
                report.auto_cancelled += 1;
                record(state, "auto_cancelled");
            }
            Ok(Some(SweepAction::Released(next))) => {
                report.released += 1;
                record(state, "released");
                debug!(order_id = %order_id, next = ?next, "released order redispatched");
            }
            Ok(None) => {}
            Err(err) => {
                report.failed += 1;
                record(state, "failed");
                error!(order_id = %order_id, error = %err, "reconcile failed; skipping order");
            }
        }
    }

    state
        .metrics
        .sweep_duration_seconds
        .observe(started.elapsed().as_secs_f64());

    if report.auto_cancelled > 0 || report.released > 0 || report.failed > 0 {
        info!(
            scanned = report.scanned,
            auto_cancelled = report.auto_cancelled,
            released = report.released,
            failed = report.failed,
            "sweep finished"
        );
    }

    report
}

fn record(state: &AppState, action: &str) {
    state
        .metrics
        .reconciler_actions_total
        .with_label_values(&[action])
        .inc();
}

async fn reconcile_order(
    state: &Arc<AppState>,
    order_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<SweepAction>, AppError> {
    let mut order = state.orders.lock(order_id).await?;
    let age = now - order.status_updated_at;

    match order.status {
        status if status.is_terminal() => {
            state.orders.retire(order_id);
            Ok(None)
        }
        OrderStatus::Pending if age > state.settings.pending_ttl => {
            order.transition(OrderStatus::Cancelled, now)?;
            order.cancel_reason = Some(CancelReason::NoCourier);
            state.orders.retire(order_id);
            state.publish(DispatchEvent::OrderAutoCancelled { order_id });

            info!(
                order_id = %order_id,
                pending_minutes = age.num_minutes(),
                "order auto-cancelled: no courier in time"
            );
            Ok(Some(SweepAction::AutoCancelled))
        }
        OrderStatus::Assigned if age > state.settings.pickup_ttl => {
            let Some(courier_id) = order.courier_id else {
                return Err(AppError::Internal(format!(
                    "assigned order {order_id} has no courier"
                )));
            };

            order.transition(OrderStatus::Pending, now)?;
            order.courier_id = None;
            order.dispatch_round += 1;
            state.courier_orders.detach(courier_id, order_id);
            if state.offers.release_accepted(order_id, now).is_none() {
                warn!(order_id = %order_id, "assigned order had no accepted offer to release");
            }
            state
                .metrics
                .offers_total
                .with_label_values(&["released"])
                .inc();
            state.publish(DispatchEvent::OrderReleased {
                order_id,
                courier_id,
            });

            info!(
                order_id = %order_id,
                courier_id = %courier_id,
                round = order.dispatch_round,
                "courier released: no pickup in time"
            );

            let next = dispatch_locked(state, &mut order);
            Ok(Some(SweepAction::Released(next)))
        }
        _ => Ok(None),
    }
}
