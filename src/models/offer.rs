use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OfferOutcome {
    Pending,
    Accepted,
    Rejected,
    Timeout,
    /// Accepted earlier, then taken back by the reconciler after a pickup SLA breach.
    Released,
}

impl OfferOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferOutcome::Pending => "pending",
            OfferOutcome::Accepted => "accepted",
            OfferOutcome::Rejected => "rejected",
            OfferOutcome::Timeout => "timeout",
            OfferOutcome::Released => "released",
        }
    }
}

/// One proposal of one order to one courier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferEntry {
    pub id: Uuid,
    pub order_id: Uuid,
    pub courier_id: Uuid,
    pub round: u32,
    pub outcome: OfferOutcome,
    pub offered_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl OfferEntry {
    pub fn is_pending(&self) -> bool {
        self.outcome == OfferOutcome::Pending
    }
}
