use dashmap::DashMap;
use tokio::task::AbortHandle;
use uuid::Uuid;

/// Response-window timers, keyed by offer id.
#[derive(Default)]
pub struct OfferTimers {
    handles: DashMap<Uuid, AbortHandle>,
}

impl OfferTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&self, offer_id: Uuid, handle: AbortHandle) {
        if let Some(previous) = self.handles.insert(offer_id, handle) {
            previous.abort();
        }
    }

    /// Stops the timer of an offer that was answered before its window closed.
    pub fn cancel(&self, offer_id: &Uuid) -> bool {
        match self.handles.remove(offer_id) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Called by the timer task itself once it fires.
    pub fn complete(&self, offer_id: &Uuid) {
        self.handles.remove(offer_id);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
