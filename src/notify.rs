use std::sync::Arc;

use tokio::sync::broadcast;

use crate::model::Booking;

/// Full booking collection as pushed to subscribers.
pub type BookingSet = Arc<Vec<Booking>>;

pub(crate) const CHANNEL_CAPACITY: usize = 64;

/// Broadcast hub for "booking set changed" events. Every message carries the
/// complete collection, so a subscriber that lags can skip straight to the
/// newest one.
pub struct ChangeHub {
    sender: broadcast::Sender<BookingSet>,
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeHub {
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookingSet> {
        self.sender.subscribe()
    }

    /// Push a new full set. No-op if nobody is listening.
    pub fn publish(&self, set: BookingSet) {
        let _ = self.sender.send(set);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
