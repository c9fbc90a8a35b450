use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};
use ulid::Ulid;

use crate::model::*;
use crate::notify::{BookingSet, ChangeHub};

use super::{BookingStore, StoreError};

#[derive(Debug, Default, Clone)]
struct Faults {
    reject_with: Option<String>,
    delay: Option<Duration>,
}

/// In-process document collection. Accepts every create (there is no
/// uniqueness or overlap constraint) unless a fault is configured.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<Vec<Booking>>,
    hub: ChangeHub,
    faults: Mutex<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing collection, e.g. records written by another client.
    pub fn with_bookings(bookings: Vec<Booking>) -> Self {
        Self {
            docs: Mutex::new(bookings),
            ..Self::default()
        }
    }

    /// Make every following `create` fail with `reason` (`None` clears it).
    pub async fn reject_creates(&self, reason: Option<String>) {
        self.faults.lock().await.reject_with = reason;
    }

    /// Hold every following `create` for `delay` before it takes effect.
    pub async fn delay_creates(&self, delay: Option<Duration>) {
        self.faults.lock().await.delay = delay;
    }

    /// Insert a record with a caller-chosen id, bypassing id assignment.
    /// Stands in for a write made by another client.
    pub async fn insert_external(&self, booking: Booking) {
        let mut docs = self.docs.lock().await;
        docs.push(booking);
        self.hub.publish(Arc::new(docs.clone()));
    }

    pub async fn len(&self) -> usize {
        self.docs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.lock().await.is_empty()
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn create(&self, booking: NewBooking) -> Result<BookingId, StoreError> {
        let faults = self.faults.lock().await.clone();
        if let Some(delay) = faults.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = faults.reject_with {
            return Err(StoreError::Rejected(reason));
        }

        let id = BookingId::new(Ulid::new().to_string());
        let mut docs = self.docs.lock().await;
        docs.push(booking.with_id(id.clone()));
        // Publish under the lock so pushes reach subscribers in write order.
        self.hub.publish(Arc::new(docs.clone()));
        Ok(id)
    }

    async fn fetch_all(&self) -> Result<Vec<Booking>, StoreError> {
        Ok(self.docs.lock().await.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<BookingSet> {
        self.hub.subscribe()
    }
}
